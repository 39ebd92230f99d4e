//! Boundary surface consumed by platform front ends.
//!
//! One validator and one registry per service, so every front end shares
//! the same token parsing, signature check and lifecycle rules.

use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::authorization::{
    AuthorizationRequest, AuthorizationValidator, SigningKey, TokenIssuer, ValidationOutcome,
};
use crate::clock::Clock;
use crate::error::{ConfigError, OperationError};
use crate::session::{
    CloseReason, EventStream, ProtectedCardData, SessionConfig, SessionHandle, SessionRegistry,
};
use crate::settings::Settings;

/// Parameters of a combined authorize-and-open request, as sent by the host.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenParams {
    #[serde(flatten)]
    pub request: AuthorizationRequest,
    #[serde(default)]
    pub card_data: Option<ProtectedCardData>,
    #[serde(default)]
    pub config: Option<SessionConfig>,
}

/// What this build can do, reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub version: &'static str,
    pub supports_screenshot_blocking: bool,
    pub supports_biometric: bool,
}

pub struct SecureCardService {
    validator: AuthorizationValidator,
    registry: SessionRegistry,
    clock: Arc<dyn Clock>,
    default_config: SessionConfig,
}

impl SecureCardService {
    pub fn new(
        validator: AuthorizationValidator,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> (Self, EventStream) {
        let (registry, events) = SessionRegistry::new(clock.clone(), runtime);
        let service = Self {
            validator,
            registry,
            clock,
            default_config: SessionConfig::default(),
        };
        (service, events)
    }

    pub fn from_settings(
        settings: Settings,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> (Self, EventStream) {
        let validator = AuthorizationValidator::new(settings.signing_key)
            .with_max_token_age(settings.max_token_age_millis);
        let (service, events) = Self::new(validator, clock, runtime);
        (service.with_default_config(settings.session), events)
    }

    /// Config used when a request does not carry one.
    pub fn with_default_config(mut self, config: SessionConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Rotate the signing key used for all later validations.
    pub fn set_secret_key(&self, key: SigningKey) {
        self.validator.rotate_key(key);
    }

    pub fn issuer(&self) -> TokenIssuer {
        self.validator.issuer()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn validate_authorization(
        &self,
        card_id: &str,
        token: &str,
        signature: &str,
    ) -> Result<ValidationOutcome, OperationError> {
        let now = self.clock.now_millis()?;
        Ok(self
            .validator
            .validate(&AuthorizationRequest::new(card_id, token, signature), now))
    }

    /// Open a session for an outcome obtained from
    /// [`validate_authorization`](Self::validate_authorization).
    pub fn open_session(
        &self,
        outcome: ValidationOutcome,
        card_id: &str,
        config: Option<SessionConfig>,
    ) -> Result<SessionHandle, OperationError> {
        self.registry
            .open(outcome, card_id, config.unwrap_or(self.default_config))
    }

    /// Parse host JSON, validate, and open with the supplied card fields.
    pub fn open_secure_view(&self, params_json: &str) -> Result<SessionHandle, OperationError> {
        let params: OpenParams = serde_json::from_str(params_json).map_err(ConfigError::from)?;
        self.authorize_and_open(params)
    }

    pub fn authorize_and_open(&self, params: OpenParams) -> Result<SessionHandle, OperationError> {
        let now = self.clock.now_millis()?;
        let outcome = self.validator.validate(&params.request, now);
        let handle = self.registry.open_with_fields(
            outcome,
            &params.request.card_id,
            params.config.unwrap_or(self.default_config),
            params.card_data,
        )?;
        info!(
            "Secure view opened for card {} as session {}",
            handle.card_id(),
            handle.id()
        );
        Ok(handle)
    }

    pub fn notify_visibility_lost(&self) -> Result<(), OperationError> {
        self.registry.dispatch_visibility(true)?;
        Ok(())
    }

    pub fn notify_visibility_regained(&self) -> Result<(), OperationError> {
        self.registry.dispatch_visibility(false)?;
        Ok(())
    }

    pub fn notify_screen_capture_detected(&self) -> Result<(), OperationError> {
        self.registry.dispatch_capture()?;
        Ok(())
    }

    /// Close the active session on behalf of the host. Reasons the session
    /// raises itself, such as `Timeout`, are refused.
    pub fn request_close(&self, reason: CloseReason) -> Result<(), OperationError> {
        self.registry.close_active(reason)?;
        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            version: env!("CARGO_PKG_VERSION"),
            supports_screenshot_blocking: true,
            supports_biometric: false,
        }
    }
}
