// Difference engine: per-channel FIR filtering plus session timing
//
// One engine lives for exactly one measurement session. It owns a filter per
// channel, an optional warm-up discard counter and the latched start time of
// the filtered series. The controller builds a fresh engine on every "ping".

use crate::config::{AcquisitionConfig, ChannelMode};
use crate::error::Result;
use crate::fir::FirFilter;
use crate::sink::RecordSink;
use crate::types::{EngineResult, FilterResult, ProcessedSample};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct DifferenceEngine {
    mode: ChannelMode,
    filters: Vec<FirFilter>,

    warmup_target: usize,
    warmup_seen: usize,

    /// Instant the filters first became ready
    t0: Option<Instant>,
    previous_filtered: Option<f64>,

    recording: bool,
    write_failures: u64,
}

impl DifferenceEngine {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        let filters = (0..config.mode.channel_count())
            .map(|_| FirFilter::new(config.coefficients.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mode: config.mode,
            filters,
            warmup_target: config.warmup_samples,
            warmup_seen: 0,
            t0: None,
            previous_filtered: None,
            recording: false,
            write_failures: 0,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.filters.len()
    }

    /// True once the first sample of the session has been produced.
    pub fn is_latched(&self) -> bool {
        self.t0.is_some()
    }

    /// Feed one reading per channel.
    ///
    /// `values` must hold exactly [`Self::channel_count`] finite numbers;
    /// the controller selects them from the parsed line. Samples are
    /// forwarded to `sink`; sink failures are logged and do not affect the
    /// returned result.
    pub(crate) fn process(
        &mut self,
        values: &[f64],
        now: Instant,
        sink: &mut dyn RecordSink,
    ) -> EngineResult {
        debug_assert_eq!(values.len(), self.filters.len());

        if self.warmup_seen < self.warmup_target {
            self.warmup_seen += 1;
            log::trace!(
                "Warm-up discard {}/{}",
                self.warmup_seen,
                self.warmup_target
            );
            return EngineResult::Filling(0.0);
        }

        let mut filtered = Vec::with_capacity(self.filters.len());
        let mut min_progress: Option<f64> = None;

        for (filter, &raw) in self.filters.iter_mut().zip(values) {
            match filter.push_and_maybe_filter(raw) {
                FilterResult::Ready(y) => filtered.push(y),
                FilterResult::Filling(p) => {
                    min_progress = Some(min_progress.map_or(p, |m| m.min(p)));
                }
            }
        }

        if let Some(progress) = min_progress {
            return EngineResult::Filling(progress);
        }

        let t0 = match self.t0 {
            Some(t0) => t0,
            None => {
                self.latch(now, sink);
                now
            }
        };

        let difference = match self.mode {
            ChannelMode::Differential => filtered[0] - filtered[1],
            ChannelMode::PreviousDelta => {
                let current = filtered[0];
                let delta = current - self.previous_filtered.unwrap_or(current);
                self.previous_filtered = Some(current);
                delta
            }
        };

        let sample = ProcessedSample {
            elapsed_secs: now.saturating_duration_since(t0).as_secs_f64(),
            difference,
            raw: values.to_vec(),
            filtered,
        };

        self.record(&sample, sink);

        EngineResult::Sample(sample)
    }

    fn latch(&mut self, now: Instant, sink: &mut dyn RecordSink) {
        self.t0 = Some(now);
        log::info!("Filters ready, session clock started");

        match sink.open() {
            Ok(()) => self.recording = true,
            Err(e) => log::warn!("Failed to open record sink, samples will not be saved: {}", e),
        }
    }

    fn record(&mut self, sample: &ProcessedSample, sink: &mut dyn RecordSink) {
        if !self.recording {
            return;
        }

        if let Err(e) = sink.write(sample) {
            self.write_failures += 1;
            if self.write_failures == 1 {
                log::warn!("Failed to record sample: {}", e);
            } else {
                log::debug!("Failed to record sample ({} failures): {}", self.write_failures, e);
            }
        }
    }
}
