//! Session domain model.

use crate::capability::EnvironmentSnapshot;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Lifecycle state of the process-wide session.
///
/// Transitions are one-way: `Uninitialized -> Active -> Ended`. A new session
/// requires a new context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    Ended,
}

/// A visitor session.
///
/// Persisted under `current_session` while active and appended to
/// `completed_sessions` once ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// `"{epoch_millis}-{9 random base36 chars}"`
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Set together with `ended_at`
    #[serde(default)]
    pub duration_ms: Option<i64>,
    pub environment: EnvironmentSnapshot,
}

impl Session {
    /// Starts a new session at `now`.
    pub fn start(now: DateTime<Utc>, environment: EnvironmentSnapshot) -> Self {
        Self {
            id: generate_session_id(now),
            started_at: now,
            ended_at: None,
            duration_ms: None,
            environment,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes the session at `now`, returning the ended copy.
    ///
    /// Duration is clamped at zero if the clock went backwards.
    pub fn ended(&self, now: DateTime<Utc>) -> Self {
        let duration = (now - self.started_at).num_milliseconds().max(0);
        Self {
            ended_at: Some(now),
            duration_ms: Some(duration),
            ..self.clone()
        }
    }
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a time + random composite session id.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix)
}
