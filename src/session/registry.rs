//! Holder of the single active disclosure session.
//!
//! All transitions happen under one lock, so signals from the UI thread,
//! platform callbacks, the timeout task and explicit closes are serialized.
//! Events are emitted while the lock is held, which keeps per-session order
//! equal to transition order.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::card_data::ProtectedCardData;
use super::config::SessionConfig;
use super::events::{self, EventSink, EventStream, SessionEvent, SessionId};
use super::state::{CloseReason, SecureSession, SessionState};
use crate::authorization::ValidationOutcome;
use crate::clock::Clock;
use crate::error::OperationError;

/// Point-in-time view of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub card_id: String,
    pub state: SessionState,
    pub opened_at_millis: i64,
    pub config: SessionConfig,
}

/// Owns at most one [`SecureSession`] and routes host signals to it.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    slot: Mutex<Option<SecureSession>>,
    clock: Arc<dyn Clock>,
    events: EventSink,
    runtime: Handle,
}

impl SessionRegistry {
    /// Create a registry whose timeouts run on `runtime`.
    ///
    /// Returns the stream on which lifecycle events are delivered.
    pub fn new(clock: Arc<dyn Clock>, runtime: Handle) -> (Self, EventStream) {
        let (events, stream) = events::channel();
        let registry = Self {
            inner: Arc::new(RegistryInner {
                slot: Mutex::new(None),
                clock,
                events,
                runtime,
            }),
        };
        (registry, stream)
    }

    /// Open a session for `card_id` after an accepted validation.
    ///
    /// A rejected outcome emits `validationError` and leaves any active
    /// session untouched. An accepted outcome first closes the active session
    /// with `Superseded`, then opens the new one.
    pub fn open(
        &self,
        outcome: ValidationOutcome,
        card_id: &str,
        config: SessionConfig,
    ) -> Result<SessionHandle, OperationError> {
        self.open_with_fields(outcome, card_id, config, None)
    }

    /// Like [`open`](Self::open), carrying the card fields to disclose.
    pub fn open_with_fields(
        &self,
        outcome: ValidationOutcome,
        card_id: &str,
        config: SessionConfig,
        card_data: Option<ProtectedCardData>,
    ) -> Result<SessionHandle, OperationError> {
        if let ValidationOutcome::Rejected { kind, .. } = outcome {
            warn!("Refusing to open session for card {}: {}", card_id, kind);
            self.inner.events.emit(SessionEvent::validation_error(kind));
            return Err(OperationError::ValidationFailed(kind));
        }
        config.validate()?;

        let mut slot = self.inner.lock_slot();
        let now = self.inner.clock.now_millis()?;

        let superseded = slot.as_mut().and_then(|previous| {
            info!("Session {} superseded by new session for card {}", previous.id(), card_id);
            previous.close(CloseReason::Superseded, now)
        });
        self.inner.commit(&mut slot, superseded);

        let (mut session, shown) = SecureSession::open(card_id, config, card_data, now);
        let session_id = session.id();
        self.inner.events.emit(shown);
        session.arm_timeout(self.inner.schedule_timeout(session_id, config.timeout()));
        *slot = Some(session);

        Ok(SessionHandle {
            session_id,
            card_id: card_id.to_string(),
            opened_at_millis: now,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Close the active session, if any.
    ///
    /// Only [explicit](CloseReason::is_explicit) reasons are accepted.
    pub fn close_active(&self, reason: CloseReason) -> Result<bool, OperationError> {
        check_explicit(reason)?;
        self.inner
            .route(None, "close", |session, now| session.close(reason, now))
    }

    /// Close `session_id` only if it is still the active session.
    pub fn close_session(
        &self,
        session_id: SessionId,
        reason: CloseReason,
    ) -> Result<bool, OperationError> {
        check_explicit(reason)?;
        self.inner.close_session(session_id, reason)
    }

    /// Route a visibility change to the active session.
    pub fn dispatch_visibility(&self, lost: bool) -> Result<bool, OperationError> {
        if lost {
            self.inner.route(None, "visibility loss", |session, now| {
                session.on_visibility_lost(now)
            })
        } else {
            self.inner.route(None, "visibility regain", |session, now| {
                session.on_visibility_regained(now)
            })
        }
    }

    /// Route a screen capture notification to the active session.
    pub fn dispatch_capture(&self) -> Result<bool, OperationError> {
        self.inner.route(None, "screen capture", |session, now| {
            session.on_screen_capture_detected(now)
        })
    }

    pub fn active(&self) -> Option<SessionSnapshot> {
        self.inner.lock_slot().as_ref().map(|session| SessionSnapshot {
            session_id: session.id(),
            card_id: session.card_id().to_string(),
            state: session.state(),
            opened_at_millis: session.opened_at_millis(),
            config: session.config(),
        })
    }

    /// Run `f` on the card fields of `session_id` while they are displayed.
    ///
    /// Returns `None` if the session is obscured, closed, superseded, or
    /// carries no fields.
    pub fn with_disclosed_fields<R>(
        &self,
        session_id: SessionId,
        f: impl FnOnce(&ProtectedCardData) -> R,
    ) -> Option<R> {
        let slot = self.inner.lock_slot();
        slot.as_ref()
            .filter(|session| session.id() == session_id)
            .and_then(SecureSession::disclosed_fields)
            .map(f)
    }
}

impl RegistryInner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<SecureSession>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close_session(
        &self,
        session_id: SessionId,
        reason: CloseReason,
    ) -> Result<bool, OperationError> {
        self.route(Some(session_id), "close", |session, now| {
            session.close(reason, now)
        })
    }

    /// Apply `transition` to the active session, optionally only if it is
    /// `target`. Absent or stale targets are a silent no-op.
    fn route<F>(
        &self,
        target: Option<SessionId>,
        signal: &str,
        transition: F,
    ) -> Result<bool, OperationError>
    where
        F: FnOnce(&mut SecureSession, i64) -> Option<SessionEvent>,
    {
        let mut slot = self.lock_slot();
        let Some(session) = slot.as_mut() else {
            debug!("No active session, ignoring {}", signal);
            return Ok(false);
        };
        if let Some(target) = target {
            if target != session.id() {
                debug!("Session {} is no longer active, ignoring {}", target, signal);
                return Ok(false);
            }
        }

        let now = self.clock.now_millis()?;
        let event = transition(session, now);
        Ok(self.commit(&mut slot, event))
    }

    /// Emit `event` and release the session once it is closed.
    fn commit(&self, slot: &mut Option<SecureSession>, event: Option<SessionEvent>) -> bool {
        let Some(event) = event else {
            return false;
        };
        self.events.emit(event);
        if slot
            .as_ref()
            .is_some_and(|session| session.state().is_terminal())
        {
            *slot = None;
        }
        true
    }

    fn schedule_timeout(self: &Arc<Self>, session_id: SessionId, delay: Duration) -> AbortHandle {
        let registry = Arc::downgrade(self);
        self.runtime
            .spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(registry) = registry.upgrade() {
                    registry.fire_timeout(session_id);
                }
            })
            .abort_handle()
    }

    /// Timer callback. A session that already closed, or was replaced,
    /// makes this a no-op.
    fn fire_timeout(&self, session_id: SessionId) {
        let mut slot = self.lock_slot();
        let Some(session) = slot.as_mut().filter(|session| session.id() == session_id) else {
            debug!("Timeout for session {} fired after it ended", session_id);
            return;
        };

        let now = self.clock.now_millis().unwrap_or_else(|e| {
            let timeout = i64::try_from(session.config().timeout_millis).unwrap_or(i64::MAX);
            warn!(
                "Clock unavailable when session {} timed out ({}), using scheduled deadline",
                session_id, e
            );
            session.opened_at_millis().saturating_add(timeout)
        });
        let event = session.on_timeout_fired(now);
        self.commit(&mut slot, event);
    }
}

fn check_explicit(reason: CloseReason) -> Result<(), OperationError> {
    if reason.is_explicit() {
        Ok(())
    } else {
        warn!("Rejecting explicit close with reason {}", reason);
        Err(OperationError::InvalidCloseReason(reason))
    }
}

/// Caller's reference to an opened session.
///
/// Does not keep the session or registry alive. Operations on a handle whose
/// session has ended are no-ops.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    card_id: String,
    opened_at_millis: i64,
    registry: Weak<RegistryInner>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn opened_at_millis(&self) -> i64 {
        self.opened_at_millis
    }

    /// Close this session if it is still active. Returns whether it closed.
    pub fn close(&self, reason: CloseReason) -> Result<bool, OperationError> {
        check_explicit(reason)?;
        match self.registry.upgrade() {
            Some(registry) => registry.close_session(self.session_id, reason),
            None => Ok(false),
        }
    }

    pub fn is_active(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let slot = registry.lock_slot();
        slot.as_ref()
            .is_some_and(|session| session.id() == self.session_id)
    }
}
