//! Session lifecycle events delivered to the host.
//!
//! Events are JSON objects tagged by `type` with camelCase fields, e.g.
//! `{"type":"closed","sessionId":"…","cardId":"card_1","reason":"TIMEOUT","durationMillis":60000}`.
//! Delivery is fire-and-forget over an unbounded channel; per-session order is
//! emission order.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::state::CloseReason;
use crate::authorization::ValidationErrorKind;

/// Opaque identifier, unique per opened session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Fields became visible. Fires once per session, before anything else.
    #[serde(rename_all = "camelCase")]
    Shown {
        session_id: SessionId,
        card_id: String,
        timestamp_millis: i64,
    },

    /// Fields were covered after the app lost visibility.
    #[serde(rename_all = "camelCase")]
    Obscured {
        session_id: SessionId,
        card_id: String,
        timestamp_millis: i64,
    },

    /// Cover removed after visibility returned.
    #[serde(rename_all = "camelCase")]
    Resumed {
        session_id: SessionId,
        card_id: String,
        timestamp_millis: i64,
    },

    /// Authorization was rejected; no session was opened.
    #[serde(rename_all = "camelCase")]
    ValidationError {
        code: ValidationErrorKind,
        message: String,
        recoverable: bool,
    },

    /// Session ended. Fires exactly once per session.
    #[serde(rename_all = "camelCase")]
    Closed {
        session_id: SessionId,
        card_id: String,
        reason: CloseReason,
        duration_millis: i64,
    },
}

impl SessionEvent {
    pub fn validation_error(kind: ValidationErrorKind) -> Self {
        SessionEvent::ValidationError {
            code: kind,
            message: kind.message().to_string(),
            recoverable: kind.is_recoverable(),
        }
    }

    /// Event name as seen by the host.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Shown { .. } => "shown",
            SessionEvent::Obscured { .. } => "obscured",
            SessionEvent::Resumed { .. } => "resumed",
            SessionEvent::ValidationError { .. } => "validationError",
            SessionEvent::Closed { .. } => "closed",
        }
    }

    /// Session this event belongs to, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionEvent::Shown { session_id, .. }
            | SessionEvent::Obscured { session_id, .. }
            | SessionEvent::Resumed { session_id, .. }
            | SessionEvent::Closed { session_id, .. } => Some(*session_id),
            SessionEvent::ValidationError { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receiving half handed to the host.
pub type EventStream = mpsc::UnboundedReceiver<SessionEvent>;

/// Sending half held by the registry.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn emit(&self, event: SessionEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped, discarding {} event", name);
        }
    }
}

/// Create a connected sink/stream pair.
pub fn channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}
