// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::install::{CreateServerRequest, InstallerError};

#[test]
fn request_deserializes_permissively() {
    let request: CreateServerRequest = serde_json::from_str("{}").unwrap();
    assert!(request.uuid.is_nil());
    assert!(!request.start_on_completion);
}

#[test]
fn valid_request_passes_validation() {
    let request: CreateServerRequest = serde_json::from_value(serde_json::json!({
        "uuid": uuid::Uuid::new_v4(),
        "service": { "egg": uuid::Uuid::new_v4() },
        "start_on_completion": true,
    }))
    .unwrap();
    request.validate().unwrap();
    assert!(request.start_on_completion);
}

#[test]
fn nil_server_uuid_fails_validation() {
    let request: CreateServerRequest = serde_json::from_value(serde_json::json!({
        "service": { "egg": uuid::Uuid::new_v4() },
    }))
    .unwrap();
    assert!(matches!(
        request.validate(),
        Err(InstallerError::Validation(_))
    ));
}

#[test]
fn non_v4_egg_uuid_fails_validation() {
    // uuid v5 is deterministic, not random
    let egg = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_DNS, b"egg");
    let request: CreateServerRequest = serde_json::from_value(serde_json::json!({
        "uuid": uuid::Uuid::new_v4(),
        "service": { "egg": egg },
    }))
    .unwrap();
    let err = request.validate().unwrap_err();
    assert!(err.to_string().contains("egg"));
}

#[test]
fn malformed_uuid_is_a_validation_error_at_parse_time() {
    let result: Result<CreateServerRequest, _> =
        serde_json::from_str(r#"{"uuid": "not-a-uuid"}"#);
    assert!(result.is_err());
}
