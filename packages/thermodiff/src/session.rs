use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Measuring,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Measuring { id: String, started_at: Instant },
}

/// Measurement lifecycle. The start instant exists only while measuring.
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    duration_secs: u64,
}

impl Session {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            phase: Phase::Idle,
            duration_secs,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Measuring { .. } => SessionState::Measuring,
        }
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self.phase, Phase::Measuring { .. })
    }

    pub fn start_instant(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Measuring { started_at, .. } => Some(*started_at),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Measuring { id, .. } => Some(id),
        }
    }

    /// Duration of the current (or last) session
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Enter (or restart) Measuring. Returns the new session id.
    pub fn start(&mut self, now: Instant, duration_secs: u64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.duration_secs = duration_secs;
        self.phase = Phase::Measuring {
            id: id.clone(),
            started_at: now,
        };
        id
    }

    /// Return to Idle. Returns the id of the session that ended, if any.
    pub fn stop(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => None,
            Phase::Measuring { id, .. } => Some(id),
        }
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.start_instant()
            .map(|started_at| now.saturating_duration_since(started_at))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now)
            .is_some_and(|e| e >= Duration::from_secs(self.duration_secs))
    }
}
