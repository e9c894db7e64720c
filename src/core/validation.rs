//! Boundary validation for inbound action requests.
//!
//! Pure functions; a failure here never touches storage.

use chrono::NaiveDate;
use uuid::Uuid;

use super::error::WorkflowError;
use super::settings::ValidationSettings;
use crate::domain::{ActionPayload, ActionRequest, WorkflowAction};

/// Idempotency keys are client-generated UUIDv4 strings
pub fn validate_idempotency_key(key: &str) -> Result<Uuid, WorkflowError> {
    let parsed = Uuid::parse_str(key.trim()).map_err(|_| {
        WorkflowError::validation("idempotency_key", format!("not a UUID: {:?}", key))
    })?;

    if parsed.get_version_num() != 4 {
        return Err(WorkflowError::validation(
            "idempotency_key",
            format!("expected a version 4 UUID, got version {}", parsed.get_version_num()),
        ));
    }

    Ok(parsed)
}

/// Reason text required by RETURN / REJECT / WITHDRAW / PAUSE
pub fn validate_reason(
    action: WorkflowAction,
    payload: &ActionPayload,
    settings: &ValidationSettings,
) -> Result<(), WorkflowError> {
    if !action.requires_reason() {
        return Ok(());
    }

    let length = payload
        .reason
        .as_deref()
        .map(|r| r.trim().chars().count())
        .unwrap_or(0);

    if length < settings.min_reason_chars {
        return Err(WorkflowError::validation(
            "reason",
            format!(
                "{} requires a reason of at least {} characters",
                action, settings.min_reason_chars
            ),
        ));
    }

    Ok(())
}

/// Expected resume date on PAUSE must lie after `today`
pub fn validate_expected_resume(payload: &ActionPayload, today: NaiveDate) -> Result<(), WorkflowError> {
    match payload.expected_resume_at {
        Some(date) if date <= today => Err(WorkflowError::validation(
            "expected_resume_at",
            format!("{} is not after {}", date, today),
        )),
        _ => Ok(()),
    }
}

/// Council actions must name a council and a secretary
pub fn validate_council_payload(action: WorkflowAction, payload: &ActionPayload) -> Result<(), WorkflowError> {
    if !action.is_council_action() {
        return Ok(());
    }

    let selection = payload
        .council
        .as_ref()
        .ok_or_else(|| WorkflowError::validation("council", format!("{} requires a council", action)))?;

    if selection.council_id.trim().is_empty() {
        return Err(WorkflowError::validation("council.council_id", "must not be empty"));
    }
    if selection.secretary_id.trim().is_empty() {
        return Err(WorkflowError::validation("council.secretary_id", "must not be empty"));
    }

    Ok(())
}

/// Payload checks only: reason, resume date and council selection
pub fn validate_payload(
    request: &ActionRequest,
    today: NaiveDate,
    settings: &ValidationSettings,
) -> Result<(), WorkflowError> {
    validate_reason(request.action, &request.payload, settings)?;
    if request.action == WorkflowAction::Pause {
        validate_expected_resume(&request.payload, today)?;
    }
    validate_council_payload(request.action, &request.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CouncilSelection;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_idempotency_key_must_be_v4() {
        assert!(validate_idempotency_key(&Uuid::new_v4().to_string()).is_ok());
        assert!(validate_idempotency_key("not-a-uuid").is_err());
        // version 1 layout
        assert!(validate_idempotency_key("6ba7b810-9dad-11d1-80b4-00c04fd430c8").is_err());
    }

    #[test]
    fn test_reason_length_counts_characters() {
        let settings = ValidationSettings::default();

        let short = ActionPayload::with_reason("  no ");
        assert!(validate_reason(WorkflowAction::Reject, &short, &settings).is_err());

        // five multi-byte characters
        let accented = ActionPayload::with_reason("thiếu");
        assert!(validate_reason(WorkflowAction::Reject, &accented, &settings).is_ok());

        assert!(validate_reason(WorkflowAction::Approve, &ActionPayload::default(), &settings).is_ok());
    }

    #[test]
    fn test_expected_resume_must_be_future() {
        let mut payload = ActionPayload::with_reason("equipment delay");
        payload.expected_resume_at = Some(today());
        assert!(validate_expected_resume(&payload, today()).is_err());

        payload.expected_resume_at = today().succ_opt();
        assert!(validate_expected_resume(&payload, today()).is_ok());
    }

    #[test]
    fn test_council_payload_required() {
        assert!(validate_council_payload(WorkflowAction::AssignCouncil, &ActionPayload::default()).is_err());

        let payload = ActionPayload::with_council(CouncilSelection {
            council_id: "c-1".into(),
            secretary_id: "s-1".into(),
            member_ids: vec![],
        });
        assert!(validate_council_payload(WorkflowAction::AssignCouncil, &payload).is_ok());
    }

    #[test]
    fn test_validate_payload_ignores_the_key() {
        let request = ActionRequest::new(Uuid::new_v4(), WorkflowAction::Reject, "bad");
        let err = validate_payload(&request, today(), &ValidationSettings::default()).unwrap_err();
        match err {
            WorkflowError::Validation { field, .. } => assert_eq!(field, "reason"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
