use std::sync::Arc;

use secure_card::session::EventStream;
use secure_card::{
    AuthorizationValidator, CloseReason, ManualClock, OperationError, SecureCardService,
    SessionConfig, SessionEvent, SessionState, Settings, SigningKey, ValidationErrorKind,
    ValidationOutcome,
};
use tokio::runtime::Handle;

const NOW: i64 = 1_700_000_000_000;

fn service(key: &[u8]) -> (SecureCardService, EventStream, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let validator = AuthorizationValidator::new(SigningKey::from_bytes(key).unwrap());
    let (service, events) = SecureCardService::new(validator, clock.clone(), Handle::current());
    (service, events, clock)
}

fn open_params(card_id: &str, token: &str, signature: &str) -> String {
    serde_json::json!({
        "cardId": card_id,
        "token": token,
        "signature": signature,
        "cardData": {
            "pan": "4111111111111111",
            "cvv": "123",
            "expiry": "12/29",
            "holder": "Ada Lovelace"
        },
        "config": {
            "timeout": 30000,
            "blockScreenshots": true,
            "requireBiometric": false,
            "blurOnBackground": false,
            "theme": "dark"
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_open_secure_view_from_host_json() {
    let (service, mut events, _clock) = service(b"k");
    let issued = service.issuer().issue("card_1", NOW - 1_000).unwrap();

    let handle = service
        .open_secure_view(&open_params("card_1", &issued.token, &issued.signature))
        .unwrap();

    let active = service.registry().active().unwrap();
    assert_eq!(active.session_id, handle.id());
    assert_eq!(active.config.timeout_millis, 30_000);
    assert!(!active.config.obscure_on_background);
    assert_eq!(
        service
            .registry()
            .with_disclosed_fields(handle.id(), |c| c.holder().to_string()),
        Some("Ada Lovelace".to_string())
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Shown { timestamp_millis: NOW, .. }
    ));

    // Background closes immediately because blurOnBackground is off.
    service.notify_visibility_lost().unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Closed {
            reason: CloseReason::Background,
            ..
        }
    ));
}

#[tokio::test]
async fn test_tampered_request_emits_validation_error() {
    let (service, mut events, _clock) = service(b"k");
    let issued = service.issuer().issue("card_1", NOW).unwrap();
    let mut signature = issued.signature.clone();
    signature.replace_range(0..1, if signature.starts_with('0') { "1" } else { "0" });

    let result = service.open_secure_view(&open_params("card_1", &issued.token, &signature));

    assert!(matches!(
        result,
        Err(OperationError::ValidationFailed(ValidationErrorKind::SignatureMismatch))
    ));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::ValidationError {
            code: ValidationErrorKind::SignatureMismatch,
            message: "Invalid token signature".to_string(),
            recoverable: false,
        }
    );
    assert!(service.registry().active().is_none());
}

#[tokio::test]
async fn test_expired_token_is_recoverable() {
    let (service, mut events, clock) = service(b"k");
    let issued = service.issuer().issue("card_1", NOW).unwrap();

    clock.advance(3_600_001);
    let outcome = service
        .validate_authorization("card_1", &issued.token, &issued.signature)
        .unwrap();
    assert_eq!(
        outcome,
        ValidationOutcome::Rejected {
            kind: ValidationErrorKind::TokenExpired,
            recoverable: true,
        }
    );

    assert!(service.open_session(outcome, "card_1", None).is_err());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::ValidationError { recoverable: true, .. }
    ));

    // Retry with a fresh token.
    let now = NOW + 3_600_001;
    let fresh = service.issuer().issue("card_1", now).unwrap();
    let outcome = service
        .validate_authorization("card_1", &fresh.token, &fresh.signature)
        .unwrap();
    assert!(service.open_session(outcome, "card_1", None).is_ok());
}

#[tokio::test]
async fn test_invalid_params_are_config_errors() {
    let (service, mut events, _clock) = service(b"k");
    assert!(matches!(
        service.open_secure_view("{\"cardId\":\"card_1\"}"),
        Err(OperationError::Config(_))
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_key_rotation() {
    let (service, _events, _clock) = service(b"old");
    let issued = service.issuer().issue("card_1", NOW).unwrap();

    service.set_secret_key(SigningKey::from_bytes(b"new").unwrap());

    assert_eq!(
        service
            .validate_authorization("card_1", &issued.token, &issued.signature)
            .unwrap()
            .rejection(),
        Some(ValidationErrorKind::SignatureMismatch)
    );
    let reissued = service.issuer().issue("card_1", NOW).unwrap();
    assert!(service
        .validate_authorization("card_1", &reissued.token, &reissued.signature)
        .unwrap()
        .is_accepted());
}

#[tokio::test]
async fn test_host_signals_through_service() {
    let (service, mut events, _clock) = service(b"k");

    // Signals before any session are absorbed.
    service.notify_visibility_lost().unwrap();
    service.notify_screen_capture_detected().unwrap();
    service.request_close(CloseReason::UserDismiss).unwrap();
    assert!(events.try_recv().is_err());

    let issued = service.issuer().issue("card_1", NOW).unwrap();
    let outcome = service
        .validate_authorization("card_1", &issued.token, &issued.signature)
        .unwrap();
    service.open_session(outcome, "card_1", None).unwrap();

    service.notify_visibility_lost().unwrap();
    assert_eq!(
        service.registry().active().unwrap().state,
        SessionState::Obscured
    );
    service.notify_visibility_regained().unwrap();
    service.request_close(CloseReason::UserDismiss).unwrap();
    service.request_close(CloseReason::UserDismiss).unwrap();

    let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["shown", "obscured", "resumed", "closed"]);
}

#[tokio::test]
async fn test_from_settings_applies_defaults() {
    let settings = Settings::from_lookup(|name| match name {
        "SECURE_CARD_SECRET_KEY" => Some("k".to_string()),
        "SECURE_CARD_TIMEOUT_MS" => Some("1234".to_string()),
        "SECURE_CARD_MAX_TOKEN_AGE_MS" => Some("10".to_string()),
        _ => None,
    })
    .unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    let (service, _events) = SecureCardService::from_settings(settings, clock, Handle::current());

    let issued = service.issuer().issue("card_1", NOW - 11).unwrap();
    assert_eq!(issued.expires_at_millis, NOW - 1);
    assert_eq!(
        service
            .validate_authorization("card_1", &issued.token, &issued.signature)
            .unwrap()
            .rejection(),
        Some(ValidationErrorKind::TokenExpired)
    );

    let issued = service.issuer().issue("card_1", NOW).unwrap();
    let outcome = service
        .validate_authorization("card_1", &issued.token, &issued.signature)
        .unwrap();
    service.open_session(outcome, "card_1", None).unwrap();
    assert_eq!(
        service.registry().active().unwrap().config,
        SessionConfig {
            timeout_millis: 1234,
            obscure_on_background: true,
        }
    );
}

#[tokio::test]
async fn test_capabilities() {
    let (service, _events, _clock) = service(b"k");
    let json = serde_json::to_value(service.capabilities()).unwrap();
    assert_eq!(json["supportsScreenshotBlocking"], true);
    assert_eq!(json["supportsBiometric"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_request_close_refuses_session_raised_reasons() {
    let (service, mut events, _clock) = service(b"k");
    let issued = service.issuer().issue("card_1", NOW).unwrap();
    let outcome = service
        .validate_authorization("card_1", &issued.token, &issued.signature)
        .unwrap();
    service.open_session(outcome, "card_1", None).unwrap();

    assert!(matches!(
        service.request_close(CloseReason::Timeout),
        Err(OperationError::InvalidCloseReason(CloseReason::Timeout))
    ));
    assert!(service.registry().active().is_some());

    service.request_close(CloseReason::HostError).unwrap();
    let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["shown", "closed"]);
}
