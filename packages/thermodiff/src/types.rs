use serde::{Deserialize, Serialize};

/// Outcome of pushing one raw value into a [`crate::FirFilter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterResult {
    /// Window not yet full; percentage of the taps currently buffered.
    Filling(f64),
    /// Convolution of the full window with the coefficient vector.
    Ready(f64),
}

/// Outcome of feeding one parsed data line through a [`crate::DifferenceEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResult {
    /// Warm-up or filter fill still in progress (minimum across channels).
    Filling(f64),
    Sample(ProcessedSample),
}

/// One filtered, time-stamped output of a measurement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    /// Seconds since the filters first became ready in this session
    pub elapsed_secs: f64,

    pub difference: f64,

    /// Raw channel values that produced this sample
    pub raw: Vec<f64>,

    /// Filtered value per channel
    pub filtered: Vec<f64>,
}

/// Why a line received during a session did not reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Non-numeric or non-finite field, or an unknown keyword
    Malformed,
    /// Fewer fields than the configured columns require
    Short,
}

/// Observable effects of a single controller tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A `"ping"` started (or restarted) a session and `"pong <duration>"` was sent.
    SessionStarted { session_id: String, duration_secs: u64 },
    /// The configured duration elapsed and `"stop"` was sent.
    TimedOut { session_id: String },
    /// The device answered `"pong"` while idle.
    StopAcknowledged,
    Filling(f64),
    Sample(ProcessedSample),
    Discarded(DiscardReason),
}
