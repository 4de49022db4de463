// Session controller - the acquisition state machine
//
// Driven by an external periodic trigger. Each tick:
// 1. pulls at most one line from the LineSource (never blocks)
// 2. ends an expired session by sending "stop"
// 3. dispatches the line: handshake tokens change the session, data lines
//    feed the DifferenceEngine while measuring, anything else is dropped
//
// The controller is the only owner of the Session and the live engine, so a
// tick is the only place either is ever mutated.

use crate::config::{validate_duration, AcquisitionConfig};
use crate::engine::DifferenceEngine;
use crate::error::Result;
use crate::protocol::{HostCommand, Message};
use crate::session::{Session, SessionState};
use crate::sink::{DisplaySink, RecordSink};
use crate::source::LineSource;
use crate::types::{ControllerEvent, DiscardReason, EngineResult};
use std::time::Instant;

pub struct SessionController<S, R, D> {
    config: AcquisitionConfig,
    columns: Vec<usize>,
    required_fields: usize,

    session: Session,
    /// Duration announced by the next "ping"
    pending_duration_secs: u64,

    /// Fresh engine cloned at every session start
    template: DifferenceEngine,
    engine: Option<DifferenceEngine>,

    source: S,
    records: R,
    display: D,
}

impl<S, R, D> SessionController<S, R, D>
where
    S: LineSource,
    R: RecordSink,
    D: DisplaySink,
{
    /// Validate the configuration and build an idle controller.
    pub fn new(config: AcquisitionConfig, source: S, records: R, display: D) -> Result<Self> {
        config.validate()?;
        let template = DifferenceEngine::new(&config)?;

        log::info!(
            "Controller ready: {:?} mode, {} taps, {} warm-up samples, {} s sessions",
            config.mode,
            config.coefficients.len(),
            config.warmup_samples,
            config.duration_secs
        );

        Ok(Self {
            columns: config.resolved_columns(),
            required_fields: config.required_fields(),
            session: Session::new(config.duration_secs),
            pending_duration_secs: config.duration_secs,
            template,
            engine: None,
            config,
            source,
            records,
            display,
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn pending_duration_secs(&self) -> u64 {
        self.pending_duration_secs
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Change the duration used by sessions started from now on.
    pub fn set_duration(&mut self, duration_secs: u64) -> Result<()> {
        validate_duration(duration_secs)?;
        if duration_secs != self.pending_duration_secs {
            log::info!("Measurement duration set to {} s (next session)", duration_secs);
        }
        self.pending_duration_secs = duration_secs;
        Ok(())
    }

    /// The transport went away: abandon any running session.
    pub fn transport_lost(&mut self) {
        if let Some(id) = self.session.stop() {
            log::warn!("Transport lost, session {} abandoned", id);
        }
        self.engine = None;
    }

    pub fn tick(&mut self) -> Vec<ControllerEvent> {
        self.tick_at(Instant::now())
    }

    /// Run one tick as if the current time were `now`.
    pub fn tick_at(&mut self, now: Instant) -> Vec<ControllerEvent> {
        let mut events = Vec::new();

        let line = self.source.read_line();

        if self.session.is_expired(now) {
            self.send(HostCommand::Stop);
            self.engine = None;
            if let Some(session_id) = self.session.stop() {
                log::info!(
                    "Session {} reached {} s, stop sent",
                    session_id,
                    self.session.duration_secs()
                );
                events.push(ControllerEvent::TimedOut { session_id });
            }
        }

        // A line read before the stop still gets dispatched, under the new state
        if let Some(line) = line {
            if let Some(event) = self.dispatch(&line, now) {
                events.push(event);
            }
        }

        events
    }

    fn dispatch(&mut self, line: &str, now: Instant) -> Option<ControllerEvent> {
        match Message::parse(line) {
            Message::Ping => self.start_session(now),
            Message::Pong => {
                if self.session.is_measuring() {
                    log::trace!("Ignoring pong while measuring");
                    None
                } else {
                    log::info!("Device acknowledged stop");
                    Some(ControllerEvent::StopAcknowledged)
                }
            }
            Message::Data(fields) => {
                if self.session.is_measuring() {
                    Some(self.process_data(&fields, now))
                } else {
                    log::trace!("Ignoring data outside a session: {}", line.trim());
                    None
                }
            }
            Message::Empty => None,
            Message::Malformed => {
                log::debug!("Discarding malformed line: {:?}", line);
                self.session
                    .is_measuring()
                    .then_some(ControllerEvent::Discarded(DiscardReason::Malformed))
            }
        }
    }

    fn start_session(&mut self, now: Instant) -> Option<ControllerEvent> {
        let duration_secs = self.pending_duration_secs;

        if let Err(e) = self
            .source
            .write_line(&HostCommand::Pong { duration_secs }.to_string())
        {
            log::error!("Failed to answer ping, staying idle: {}", e);
            return None;
        }

        if let Some(previous) = self.session.id() {
            log::info!("Ping during session {}, restarting", previous);
        }

        self.engine = Some(self.template.clone());
        self.display.clear();
        let session_id = self.session.start(now, duration_secs);

        log::info!("Session {} started for {} s", session_id, duration_secs);

        Some(ControllerEvent::SessionStarted {
            session_id,
            duration_secs,
        })
    }

    fn process_data(&mut self, fields: &[f64], now: Instant) -> ControllerEvent {
        if fields.len() < self.required_fields {
            log::debug!(
                "Discarding short line: {} field(s), need {}",
                fields.len(),
                self.required_fields
            );
            return ControllerEvent::Discarded(DiscardReason::Short);
        }

        let Some(engine) = self.engine.as_mut() else {
            return ControllerEvent::Discarded(DiscardReason::Malformed);
        };

        let values: Vec<f64> = self.columns.iter().map(|&c| fields[c]).collect();

        match engine.process(&values, now, &mut self.records) {
            EngineResult::Filling(progress) => {
                self.display.show_progress(progress);
                ControllerEvent::Filling(progress)
            }
            EngineResult::Sample(sample) => {
                self.display.show_sample(&sample);
                ControllerEvent::Sample(sample)
            }
        }
    }

    fn send(&mut self, command: HostCommand) {
        if let Err(e) = self.source.write_line(&command.to_string()) {
            log::error!("Failed to send {:?}: {}", command, e);
        }
    }
}
