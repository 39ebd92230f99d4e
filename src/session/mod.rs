//! Disclosure session lifecycle.
//!
//! ```text
//! ┌──────────────────┐  open   ┌─────────────────┐  events  ┌──────┐
//! │ ValidationOutcome│───────▶│ SessionRegistry │─────────▶│ host │
//! └──────────────────┘         │  (one session)  │          └──────┘
//!                              └─────────────────┘
//!          visibility / capture / close ──▲    ▲── timeout task
//! ```

pub mod card_data;
pub mod config;
pub mod events;
pub mod registry;
pub mod state;

pub use card_data::ProtectedCardData;
pub use config::{SessionConfig, DEFAULT_TIMEOUT_MILLIS};
pub use events::{EventSink, EventStream, SessionEvent, SessionId};
pub use registry::{SessionHandle, SessionRegistry, SessionSnapshot};
pub use state::{CloseReason, SecureSession, SessionState};
