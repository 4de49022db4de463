//! Line protocol spoken with the sensor board.
//!
//! Device to host: `ping`, `pong`, or comma-separated decimal readings.
//! Host to device: `pong <duration_secs>` and `stop`. Keywords are
//! case-insensitive and surrounding whitespace is ignored.

use std::fmt;

/// A classified line received from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ping,
    Pong,
    /// Every field parsed as a finite number
    Data(Vec<f64>),
    Empty,
    Malformed,
}

impl Message {
    pub fn parse(line: &str) -> Self {
        let normalized = line.trim().to_lowercase();

        match normalized.as_str() {
            "" => Message::Empty,
            "ping" => Message::Ping,
            "pong" => Message::Pong,
            payload => parse_fields(payload).map_or(Message::Malformed, Message::Data),
        }
    }
}

/// All-or-nothing parse of a comma-separated numeric payload.
fn parse_fields(payload: &str) -> Option<Vec<f64>> {
    payload
        .split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
        })
        .collect()
}

/// Command sent from host to device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Session accepted; carries the measurement duration in seconds
    Pong { duration_secs: u64 },
    Stop,
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCommand::Pong { duration_secs } => write!(f, "pong {}", duration_secs),
            HostCommand::Stop => write!(f, "stop"),
        }
    }
}
