//! Session lifecycle management.
//!
//! One session per context: `Uninitialized -> Active -> Ended`, with no way
//! back. The session ends either on an explicit call or when the one-shot
//! timeout task fires, whichever comes first.

use crate::recorder::{Recorder, append_bounded};
use siteline_core::capability::CapabilityProvider;
use siteline_core::clock::Clock;
use siteline_core::record::{KnownCategory, Record, RecordData, record_data};
use siteline_core::session::{Session, SessionState};
use siteline_core::storage::keys;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Session id stamped on records when no session is active.
pub const NO_SESSION: &str = "none";

/// Retention cap for `completed_sessions`.
pub const COMPLETED_SESSION_CAP: usize = 100;

struct Slot {
    state: SessionState,
    active: Option<Session>,
}

pub struct SessionManager {
    recorder: Arc<Recorder>,
    clock: Arc<dyn Clock>,
    capabilities: Arc<dyn CapabilityProvider>,
    slot: Mutex<Slot>,
}

impl SessionManager {
    pub fn new(
        recorder: Arc<Recorder>,
        clock: Arc<dyn Clock>,
        capabilities: Arc<dyn CapabilityProvider>,
    ) -> Self {
        Self {
            recorder,
            clock,
            capabilities,
            slot: Mutex::new(Slot {
                state: SessionState::Uninitialized,
                active: None,
            }),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.slot().state
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<Session> {
        self.slot().active.clone()
    }

    /// The active session id, or [`NO_SESSION`].
    pub fn session_id(&self) -> String {
        self.slot()
            .active
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| NO_SESSION.to_string())
    }

    /// Starts the session.
    ///
    /// Snapshots the navigation context, persists the session under
    /// `current_session` and emits `session_start`.
    ///
    /// # Returns
    ///
    /// The new session, or `None` if this manager already started one.
    pub fn start(&self) -> Option<Session> {
        let session = {
            let mut slot = self.slot();
            if slot.state != SessionState::Uninitialized {
                tracing::debug!("[SessionManager] start ignored in state {}", slot.state);
                return None;
            }
            let session = Session::start(self.clock.now(), self.capabilities.environment());
            slot.state = SessionState::Active;
            slot.active = Some(session.clone());
            session
        };

        self.recorder
            .store()
            .put(keys::CURRENT_SESSION, &session);

        let env = &session.environment;
        let data = record_data([
            ("user_agent", env.user_agent.as_str()),
            ("viewport", env.viewport.as_str()),
            ("screen_size", env.screen_size.as_str()),
            ("referrer", env.referrer.as_str()),
            ("language", env.language.as_str()),
            ("timezone", env.timezone.as_str()),
        ]);
        self.emit("session_start", &session, data);

        tracing::info!("[SessionManager] Session {} started", session.id);
        Some(session)
    }

    /// Ends the active session.
    ///
    /// Computes the duration, appends the session to `completed_sessions`,
    /// removes `current_session` and emits `session_end`.
    ///
    /// # Returns
    ///
    /// The ended session, or `None` (no-op) when no session is active.
    pub fn end(&self) -> Option<Session> {
        let ended = {
            let mut slot = self.slot();
            if slot.state != SessionState::Active {
                return None;
            }
            let active = slot.active.take()?;
            slot.state = SessionState::Ended;
            active.ended(self.clock.now())
        };

        let store = self.recorder.store();
        let mut completed: Vec<Session> = store.get_or_default(keys::COMPLETED_SESSIONS);
        append_bounded(&mut completed, ended.clone(), COMPLETED_SESSION_CAP);
        store.put(keys::COMPLETED_SESSIONS, &completed);
        store.remove(keys::CURRENT_SESSION);

        let duration = ended.duration_ms.unwrap_or_default().to_string();
        self.emit("session_end", &ended, record_data([("duration_ms", duration)]));

        tracing::info!(
            "[SessionManager] Session {} ended after {} ms",
            ended.id,
            ended.duration_ms.unwrap_or_default()
        );
        Some(ended)
    }

    /// Sessions that have ended, oldest first.
    pub fn completed_sessions(&self) -> Vec<Session> {
        self.recorder
            .store()
            .get_or_default(keys::COMPLETED_SESSIONS)
    }

    /// Spawns the one-shot timeout that ends the session after `timeout`.
    pub fn spawn_timeout(self: &Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if manager.end().is_some() {
                tracing::info!("[SessionManager] Session timed out after {:?}", timeout);
            }
        })
    }

    fn emit(&self, event_type: &str, session: &Session, data: RecordData) {
        let record = Record::new(
            event_type,
            session.environment.page.clone(),
            session.id.clone(),
            data,
            self.clock.now(),
        );
        self.recorder
            .record_event(KnownCategory::Session.as_ref(), record);
    }
}
