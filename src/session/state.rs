//! Disclosure session state machine.
//!
//! ```text
//!            lost (obscure)          regained
//! Displayed ───────────────▶ Obscured ───────▶ Displayed
//!     │                         │
//!     │ lost (no obscure), capture, timeout, close
//!     ▼                         ▼
//!  Closed(reason) ◀─────────────┘
//! ```
//!
//! `Closed` is terminal. Every transition method returns the event to emit,
//! or `None` when the signal does not apply to the current state.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::task::AbortHandle;

use super::card_data::ProtectedCardData;
use super::config::SessionConfig;
use super::events::{SessionEvent, SessionId};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    UserDismiss,
    Timeout,
    /// Visibility lost while `obscure_on_background` is off.
    Background,
    ScreenCaptureDetected,
    /// Another session was authorized while this one was active.
    Superseded,
    HostError,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseReason::UserDismiss => "USER_DISMISS",
            CloseReason::Timeout => "TIMEOUT",
            CloseReason::Background => "BACKGROUND",
            CloseReason::ScreenCaptureDetected => "SCREEN_CAPTURE_DETECTED",
            CloseReason::Superseded => "SUPERSEDED",
            CloseReason::HostError => "HOST_ERROR",
        };
        f.write_str(name)
    }
}

impl CloseReason {
    /// Reasons a caller may request directly. The rest are raised only by
    /// the session's own signals and timer.
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            CloseReason::UserDismiss | CloseReason::Superseded | CloseReason::HostError
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum SessionState {
    Displayed,
    Obscured,
    Closed(CloseReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed(_))
    }
}

/// One disclosure lifecycle, from acceptance to close.
pub struct SecureSession {
    id: SessionId,
    card_id: String,
    state: SessionState,
    opened_at_millis: i64,
    config: SessionConfig,
    card_data: Option<ProtectedCardData>,
    timeout: Option<AbortHandle>,
}

impl SecureSession {
    /// Open in `Displayed` and produce the `shown` event.
    ///
    /// Only the registry calls this, and only after an accepted outcome.
    pub(crate) fn open(
        card_id: impl Into<String>,
        config: SessionConfig,
        card_data: Option<ProtectedCardData>,
        now_millis: i64,
    ) -> (Self, SessionEvent) {
        let session = Self {
            id: SessionId::generate(),
            card_id: card_id.into(),
            state: SessionState::Displayed,
            opened_at_millis: now_millis,
            config,
            card_data,
            timeout: None,
        };
        info!(
            "Session {} opened for card {} (timeout {}ms)",
            session.id, session.card_id, config.timeout_millis
        );
        let shown = SessionEvent::Shown {
            session_id: session.id,
            card_id: session.card_id.clone(),
            timestamp_millis: now_millis,
        };
        (session, shown)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn opened_at_millis(&self) -> i64 {
        self.opened_at_millis
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Card fields, only while they are actually on screen.
    pub fn disclosed_fields(&self) -> Option<&ProtectedCardData> {
        match self.state {
            SessionState::Displayed => self.card_data.as_ref(),
            _ => None,
        }
    }

    /// Attach the scheduled timeout so closing can cancel it.
    pub(crate) fn arm_timeout(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.timeout.replace(handle) {
            previous.abort();
        }
    }

    pub fn on_visibility_lost(&mut self, now_millis: i64) -> Option<SessionEvent> {
        match self.state {
            SessionState::Displayed if self.config.obscure_on_background => {
                self.state = SessionState::Obscured;
                info!("Session {} obscured", self.id);
                Some(SessionEvent::Obscured {
                    session_id: self.id,
                    card_id: self.card_id.clone(),
                    timestamp_millis: now_millis,
                })
            }
            SessionState::Displayed => self.close_with(CloseReason::Background, now_millis),
            _ => {
                debug!("Session {} ignoring visibility loss in {:?}", self.id, self.state);
                None
            }
        }
    }

    pub fn on_visibility_regained(&mut self, now_millis: i64) -> Option<SessionEvent> {
        if self.state != SessionState::Obscured {
            debug!("Session {} ignoring visibility regain in {:?}", self.id, self.state);
            return None;
        }
        self.state = SessionState::Displayed;
        info!("Session {} resumed", self.id);
        Some(SessionEvent::Resumed {
            session_id: self.id,
            card_id: self.card_id.clone(),
            timestamp_millis: now_millis,
        })
    }

    /// Capture always ends the session, whatever the obscure policy.
    pub fn on_screen_capture_detected(&mut self, now_millis: i64) -> Option<SessionEvent> {
        self.close_with(CloseReason::ScreenCaptureDetected, now_millis)
    }

    pub fn on_timeout_fired(&mut self, now_millis: i64) -> Option<SessionEvent> {
        self.close_with(CloseReason::Timeout, now_millis)
    }

    /// Explicit close. Idempotent.
    pub fn close(&mut self, reason: CloseReason, now_millis: i64) -> Option<SessionEvent> {
        self.close_with(reason, now_millis)
    }

    fn close_with(&mut self, reason: CloseReason, now_millis: i64) -> Option<SessionEvent> {
        if let SessionState::Closed(existing) = self.state {
            debug!(
                "Session {} already closed ({}), ignoring {}",
                self.id, existing, reason
            );
            return None;
        }

        if let Some(timeout) = self.timeout.take() {
            timeout.abort();
        }
        self.card_data = None;
        self.state = SessionState::Closed(reason);

        let duration_millis = now_millis.saturating_sub(self.opened_at_millis).max(0);
        info!(
            "Session {} for card {} closed: {} after {}ms",
            self.id, self.card_id, reason, duration_millis
        );
        Some(SessionEvent::Closed {
            session_id: self.id,
            card_id: self.card_id.clone(),
            reason,
            duration_millis,
        })
    }
}

impl Drop for SecureSession {
    fn drop(&mut self) {
        if let Some(timeout) = self.timeout.take() {
            timeout.abort();
        }
    }
}

impl fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("id", &self.id)
            .field("card_id", &self.card_id)
            .field("state", &self.state)
            .field("opened_at_millis", &self.opened_at_millis)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
