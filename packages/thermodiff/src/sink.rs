// Output sinks for processed samples
//
// Two collaborators receive the pipeline's output:
// - `RecordSink`: append-only persistence, reopened (truncated) per session
// - `DisplaySink`: live view fed with fill progress and samples
//
// `CsvRecordSink` flushes after every row so a crash loses at most the row
// being written. `TimeWindow` keeps a sliding window of recent points for
// rendering.

use crate::error::Result;
use crate::types::ProcessedSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Persistence target for accepted samples.
pub trait RecordSink {
    /// (Re)create the target and write the header row.
    fn open(&mut self) -> Result<()>;

    /// Append one sample and make it durable before returning.
    fn write(&mut self, sample: &ProcessedSample) -> Result<()>;
}

/// Live view of a session.
pub trait DisplaySink {
    /// Drop everything shown for the previous session.
    fn clear(&mut self);

    fn show_progress(&mut self, percent: f64);

    fn show_sample(&mut self, sample: &ProcessedSample);
}

/// CSV file sink. Each numeric field is written with 3 decimals.
pub struct CsvRecordSink {
    path: PathBuf,
    channels: usize,
    writer: Option<csv::Writer<File>>,
}

impl CsvRecordSink {
    pub fn new(path: impl Into<PathBuf>, channels: usize) -> Self {
        Self {
            path: path.into(),
            channels,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(2 + 2 * self.channels);
        header.push("elapsed_s".to_string());
        header.extend((1..=self.channels).map(|i| format!("raw_{}", i)));
        header.extend((1..=self.channels).map(|i| format!("filtered_{}", i)));
        header.push("difference".to_string());
        header
    }
}

fn fmt3(value: f64) -> String {
    format!("{:.3}", value)
}

impl RecordSink for CsvRecordSink {
    fn open(&mut self) -> Result<()> {
        // File::create truncates an existing file from a previous session
        let file = File::create(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(self.header())?;
        writer.flush()?;

        log::info!("Recording samples to {}", self.path.display());
        self.writer = Some(writer);
        Ok(())
    }

    fn write(&mut self, sample: &ProcessedSample) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "CSV sink is not open")
        })?;

        let mut record = Vec::with_capacity(2 + sample.raw.len() + sample.filtered.len());
        record.push(fmt3(sample.elapsed_secs));
        record.extend(sample.raw.iter().copied().map(fmt3));
        record.extend(sample.filtered.iter().copied().map(fmt3));
        record.push(fmt3(sample.difference));

        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }
}

/// Sink that accepts and drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecordSink;

impl RecordSink for NullRecordSink {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, _sample: &ProcessedSample) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn clear(&mut self) {}

    fn show_progress(&mut self, _percent: f64) {}

    fn show_sample(&mut self, _sample: &ProcessedSample) {}
}

/// One plotted point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub elapsed_secs: f64,
    pub difference: f64,
    pub filtered: Vec<f64>,
}

/// Sliding time window over the current session's samples.
///
/// Points older than `window_secs` behind the newest point are dropped.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    window_secs: f64,
    points: VecDeque<DisplayPoint>,
    progress: Option<f64>,
}

impl TimeWindow {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            points: VecDeque::new(),
            progress: None,
        }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn set_window_secs(&mut self, window_secs: f64) {
        self.window_secs = window_secs;
        self.evict();
    }

    pub fn points(&self) -> impl Iterator<Item = &DisplayPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&DisplayPoint> {
        self.points.back()
    }

    /// Last reported fill progress, cleared once samples arrive.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// (min, max) of the differences currently in the window
    pub fn difference_range(&self) -> Option<(f64, f64)> {
        self.points.iter().map(|p| p.difference).fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }

    fn evict(&mut self) {
        let Some(newest) = self.points.back().map(|p| p.elapsed_secs) else {
            return;
        };
        let cutoff = newest - self.window_secs;

        while let Some(front) = self.points.front() {
            if front.elapsed_secs < cutoff {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }
}

impl DisplaySink for TimeWindow {
    fn clear(&mut self) {
        self.points.clear();
        self.progress = None;
    }

    fn show_progress(&mut self, percent: f64) {
        self.progress = Some(percent);
    }

    fn show_sample(&mut self, sample: &ProcessedSample) {
        self.progress = None;
        self.points.push_back(DisplayPoint {
            elapsed_secs: sample.elapsed_secs,
            difference: sample.difference,
            filtered: sample.filtered.clone(),
        });
        self.evict();
    }
}
