// Line-oriented transport seen by the controller
//
// Implementations own the physical connection. `read_line` must never block:
// "no line yet" is the common case and is reported as `None`.

use crate::error::Result;
use std::collections::VecDeque;

pub trait LineSource {
    /// Next complete line if one is available, without the terminator.
    fn read_line(&mut self) -> Option<String>;

    /// Send one command line; the implementation appends the terminator.
    fn write_line(&mut self, line: &str) -> Result<()>;
}

/// In-memory source for replaying captured traffic and for tests.
#[derive(Debug, Default, Clone)]
pub struct QueueLineSource {
    incoming: VecDeque<String>,
    sent: Vec<String>,
}

impl QueueLineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            incoming: lines.into_iter().map(Into::into).collect(),
            sent: Vec::new(),
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.incoming.push_back(line.into());
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Commands written so far, oldest first
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }
}

impl LineSource for QueueLineSource {
    fn read_line(&mut self) -> Option<String> {
        self.incoming.pop_front()
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.sent.push(line.to_string());
        Ok(())
    }
}
