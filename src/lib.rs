//! Authorization and lifecycle core for briefly revealing payment-card
//! fields in a protected view.
//!
//! The crate never draws anything. A host front end asks it whether a signed
//! token entitles disclosure of a card, opens a session on acceptance, feeds
//! it platform signals (visibility, screen capture, user close) and renders
//! according to the lifecycle events it receives.
//!
//! ```text
//! token + signature ──▶ AuthorizationValidator ──▶ ValidationOutcome
//!                                                         │
//!                                                         ▼
//!     host signals ─────────────────────────────▶ SessionRegistry ──▶ events
//! ```

pub mod authorization;
pub mod clock;
pub mod error;
pub mod service;
pub mod session;
pub mod settings;

pub use authorization::{
    AuthorizationRequest, AuthorizationValidator, SigningKey, TokenIssuer, ValidationErrorKind,
    ValidationOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, OperationError};
pub use service::{Capabilities, OpenParams, SecureCardService};
pub use session::{
    CloseReason, EventStream, ProtectedCardData, SessionConfig, SessionEvent, SessionHandle,
    SessionRegistry, SessionState,
};
pub use settings::Settings;
