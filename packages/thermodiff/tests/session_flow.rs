use std::time::{Duration, Instant};
use thermodiff::{
    AcquisitionConfig, AcquisitionError, ChannelMode, ControllerEvent, CsvRecordSink,
    DiscardReason, DisplaySink, FilterResult, FirFilter, LineSource, NullRecordSink,
    ProcessedSample, QueueLineSource, RecordSink, SessionController, SessionState, TimeWindow,
};

// =============================================================================
// HELPERS
// =============================================================================

#[derive(Default)]
struct MemorySink {
    opens: usize,
    rows: Vec<ProcessedSample>,
}

impl RecordSink for MemorySink {
    fn open(&mut self) -> thermodiff::Result<()> {
        self.opens += 1;
        self.rows.clear();
        Ok(())
    }

    fn write(&mut self, sample: &ProcessedSample) -> thermodiff::Result<()> {
        self.rows.push(sample.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryDisplay {
    clears: usize,
    progress: Vec<f64>,
    samples: Vec<ProcessedSample>,
}

impl DisplaySink for MemoryDisplay {
    fn clear(&mut self) {
        self.clears += 1;
        self.progress.clear();
        self.samples.clear();
    }

    fn show_progress(&mut self, percent: f64) {
        self.progress.push(percent);
    }

    fn show_sample(&mut self, sample: &ProcessedSample) {
        self.samples.push(sample.clone());
    }
}

type TestController = SessionController<QueueLineSource, MemorySink, MemoryDisplay>;

fn controller(taps: usize, duration_secs: u64) -> TestController {
    let config = AcquisitionConfig {
        duration_secs,
        coefficients: vec![1.0 / taps as f64; taps],
        ..Default::default()
    };
    SessionController::new(
        config,
        QueueLineSource::new(),
        MemorySink::default(),
        MemoryDisplay::default(),
    )
    .unwrap()
}

/// Line source whose writes always fail, as a port that vanished mid-reply.
#[derive(Default)]
struct BrokenWriteSource {
    lines: Vec<String>,
}

impl LineSource for BrokenWriteSource {
    fn read_line(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.remove(0))
        }
    }

    fn write_line(&mut self, _line: &str) -> thermodiff::Result<()> {
        Err(AcquisitionError::Transport("write failed".to_string()))
    }
}

/// Push one line and run a single tick at `now`.
fn feed(ctl: &mut TestController, line: &str, now: Instant) -> Vec<ControllerEvent> {
    ctl.source_mut().push_line(line);
    ctl.tick_at(now)
}

fn samples(events: &[ControllerEvent]) -> Vec<&ProcessedSample> {
    events
        .iter()
        .filter_map(|e| match e {
            ControllerEvent::Sample(s) => Some(s),
            _ => None,
        })
        .collect()
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_empty_coefficients_refuse_to_start() {
    let config = AcquisitionConfig {
        coefficients: vec![],
        ..Default::default()
    };
    let result = SessionController::new(
        config,
        QueueLineSource::new(),
        NullRecordSink,
        TimeWindow::new(100.0),
    );
    assert!(matches!(result, Err(AcquisitionError::InvalidConfig(_))));
}

#[test]
fn test_zero_duration_refuses_to_start() {
    let config = AcquisitionConfig {
        duration_secs: 0,
        ..Default::default()
    };
    let result = SessionController::new(
        config,
        QueueLineSource::new(),
        NullRecordSink,
        TimeWindow::new(100.0),
    );
    assert!(result.is_err());
}

// =============================================================================
// FIR FILTER PROPERTIES
// =============================================================================

#[test]
fn test_fill_progress_monotonic_and_ready_at_k() {
    for k in 1..=12 {
        let mut filter = FirFilter::new(vec![1.0; k]).unwrap();
        let mut last = 0.0;
        for i in 1..k {
            match filter.push_and_maybe_filter(i as f64) {
                FilterResult::Filling(p) => {
                    assert!(p >= last);
                    assert!(p < 100.0);
                    last = p;
                }
                FilterResult::Ready(_) => panic!("ready before K={} samples", k),
            }
        }
        assert!(matches!(
            filter.push_and_maybe_filter(0.0),
            FilterResult::Ready(_)
        ));
    }
}

#[test]
fn test_constant_input_converges_to_scaled_value() {
    let coefficients = vec![0.1, 0.2, 0.3, 0.7];
    let gain: f64 = coefficients.iter().sum();
    let mut filter = FirFilter::new(coefficients).unwrap();

    let mut y = None;
    for _ in 0..10 {
        if let FilterResult::Ready(v) = filter.push_and_maybe_filter(4.0) {
            y = Some(v);
        }
    }
    assert!((y.unwrap() - 4.0 * gain).abs() < 1e-12);

    let mut normalised = FirFilter::new(thermodiff::DEFAULT_COEFFICIENTS.to_vec()).unwrap();
    let mut y = 0.0;
    for _ in 0..100 {
        if let FilterResult::Ready(v) = normalised.push_and_maybe_filter(21.5) {
            y = v;
        }
    }
    assert!((y - 21.5).abs() < 1e-9);
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[test]
fn test_ping_starts_session_with_pong_duration() {
    let mut ctl = controller(5, 100);
    let now = Instant::now();

    let events = feed(&mut ctl, "ping", now);

    assert_eq!(ctl.source().sent(), ["pong 100"]);
    assert_eq!(ctl.state(), SessionState::Measuring);
    assert_eq!(ctl.session().start_instant(), Some(now));
    assert!(matches!(
        events.as_slice(),
        [ControllerEvent::SessionStarted { duration_secs: 100, .. }]
    ));
    assert_eq!(ctl.display().clears, 1);
}

#[test]
fn test_pong_in_idle_is_acknowledged() {
    let mut ctl = controller(5, 100);
    let events = feed(&mut ctl, "PONG", Instant::now());

    assert_eq!(events, vec![ControllerEvent::StopAcknowledged]);
    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(ctl.source().sent().is_empty());
}

#[test]
fn test_data_in_idle_is_ignored() {
    let mut ctl = controller(1, 100);
    let events = feed(&mut ctl, "20.0,19.5", Instant::now());

    assert!(events.is_empty());
    assert_eq!(ctl.records().opens, 0);
    assert!(ctl.display().samples.is_empty());
}

#[test]
fn test_no_line_is_a_quiet_tick() {
    let mut ctl = controller(3, 100);
    assert!(ctl.tick_at(Instant::now()).is_empty());
    assert_eq!(ctl.state(), SessionState::Idle);
}

// =============================================================================
// END-TO-END
// =============================================================================

#[test]
fn test_end_to_end_fill_then_sample() {
    let k = 5;
    let mut ctl = controller(k, 100);
    let start = Instant::now();

    feed(&mut ctl, "ping", start);

    let mut progress = Vec::new();
    for i in 0..k - 1 {
        let events = feed(&mut ctl, "20.0,19.5", start + Duration::from_millis(10 * i as u64));
        match events.as_slice() {
            [ControllerEvent::Filling(p)] => progress.push(*p),
            other => panic!("expected filling, got {:?}", other),
        }
    }
    assert!(progress.windows(2).all(|w| w[0] < w[1]));

    let events = feed(&mut ctl, "20.0,19.5", start + Duration::from_millis(50));
    let found = samples(&events);
    assert_eq!(found.len(), 1);
    let sample = found[0];
    assert!(sample.elapsed_secs.abs() < 1e-9);
    assert!((sample.difference - 0.5).abs() < 1e-9);
    assert_eq!(sample.filtered.len(), 2);

    assert_eq!(ctl.records().opens, 1);
    assert_eq!(ctl.records().rows.len(), 1);
    assert_eq!(ctl.display().samples.len(), 1);
    assert_eq!(ctl.display().progress.len(), k - 1);
}

#[test]
fn test_malformed_line_while_measuring_changes_nothing() {
    let mut ctl = controller(3, 100);
    let now = Instant::now();
    feed(&mut ctl, "ping", now);
    feed(&mut ctl, "20.0,19.5", now);

    let events = feed(&mut ctl, "abc,def", now);

    assert_eq!(
        events,
        vec![ControllerEvent::Discarded(DiscardReason::Malformed)]
    );
    assert_eq!(ctl.state(), SessionState::Measuring);
    assert_eq!(ctl.display().progress.len(), 1);
    assert!(ctl.display().samples.is_empty());
}

#[test]
fn test_short_line_produces_no_progress_or_sink_call() {
    let mut ctl = controller(1, 100);
    let now = Instant::now();
    feed(&mut ctl, "ping", now);

    let events = feed(&mut ctl, "23.5", now);

    assert_eq!(events, vec![ControllerEvent::Discarded(DiscardReason::Short)]);
    assert!(ctl.display().progress.is_empty());
    assert!(ctl.display().samples.is_empty());
    assert_eq!(ctl.records().opens, 0);
    assert!(ctl.records().rows.is_empty());
}

#[test]
fn test_non_finite_line_is_discarded() {
    let mut ctl = controller(1, 100);
    let now = Instant::now();
    feed(&mut ctl, "ping", now);

    let events = feed(&mut ctl, "nan,19.5", now);

    assert_eq!(
        events,
        vec![ControllerEvent::Discarded(DiscardReason::Malformed)]
    );
    assert!(ctl.records().rows.is_empty());
}

// =============================================================================
// TIMEOUT
// =============================================================================

#[test]
fn test_timeout_sends_stop_exactly_once() {
    let mut ctl = controller(3, 5);
    let start = Instant::now();
    feed(&mut ctl, "ping", start);
    ctl.source_mut().take_sent();

    assert!(ctl.tick_at(start + Duration::from_millis(4990)).is_empty());
    assert_eq!(ctl.state(), SessionState::Measuring);

    let events = ctl.tick_at(start + Duration::from_millis(5010));
    assert!(matches!(
        events.as_slice(),
        [ControllerEvent::TimedOut { .. }]
    ));
    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(ctl.session().start_instant().is_none());

    ctl.tick_at(start + Duration::from_secs(6));
    ctl.tick_at(start + Duration::from_secs(60));
    assert_eq!(ctl.source().sent(), ["stop"]);
}

#[test]
fn test_line_read_in_timeout_tick_is_still_dispatched() {
    let mut ctl = controller(3, 5);
    let start = Instant::now();
    feed(&mut ctl, "ping", start);
    ctl.source_mut().take_sent();

    // A ping queued before the boundary starts the next session right away
    let events = feed(&mut ctl, "ping", start + Duration::from_secs(5));

    assert_eq!(ctl.source().sent(), ["stop", "pong 5"]);
    assert!(matches!(
        events.as_slice(),
        [
            ControllerEvent::TimedOut { .. },
            ControllerEvent::SessionStarted { .. }
        ]
    ));
    assert_eq!(ctl.state(), SessionState::Measuring);
}

#[test]
fn test_data_in_timeout_tick_is_dropped_as_idle() {
    let mut ctl = controller(1, 5);
    let start = Instant::now();
    feed(&mut ctl, "ping", start);

    let events = feed(&mut ctl, "20.0,19.5", start + Duration::from_secs(6));

    assert_eq!(events.len(), 1);
    assert!(samples(&events).is_empty());
    assert!(ctl.records().rows.is_empty());
}

// =============================================================================
// SESSION RESET
// =============================================================================

#[test]
fn test_two_pings_yield_independent_sessions() {
    let k = 3;
    let mut ctl = controller(k, 100);
    let t1 = Instant::now();

    let first = feed(&mut ctl, "ping", t1);
    for _ in 0..k - 1 {
        feed(&mut ctl, "100.0,0.0", t1);
    }

    // Second ping, one more reading that would complete the first window
    let t2 = t1 + Duration::from_secs(2);
    let second = feed(&mut ctl, "ping", t2);
    let events = feed(&mut ctl, "20.0,19.5", t2);

    let id = |events: &[ControllerEvent]| match &events[0] {
        ControllerEvent::SessionStarted { session_id, .. } => session_id.clone(),
        other => panic!("expected session start, got {:?}", other),
    };
    assert_ne!(id(&first[..]), id(&second[..]));

    // Fresh engine: still filling, none of the first session's readings count
    assert!(matches!(events.as_slice(), [ControllerEvent::Filling(_)]));
    assert_eq!(ctl.session().start_instant(), Some(t2));

    feed(&mut ctl, "20.0,19.5", t2 + Duration::from_millis(30));
    let last = feed(&mut ctl, "20.0,19.5", t2 + Duration::from_millis(30));
    let sample = samples(&last)[0];
    assert!(sample.elapsed_secs.abs() < 1e-9);
    assert!((sample.filtered[0] - 20.0).abs() < 1e-9);
    assert!((sample.difference - 0.5).abs() < 1e-9);
}

#[test]
fn test_ping_while_measuring_restarts() {
    let mut ctl = controller(1, 100);
    let start = Instant::now();
    feed(&mut ctl, "ping", start);
    feed(&mut ctl, "20.0,19.5", start);
    assert_eq!(ctl.display().samples.len(), 1);

    feed(&mut ctl, "ping", start + Duration::from_secs(3));

    assert_eq!(ctl.state(), SessionState::Measuring);
    assert_eq!(ctl.display().clears, 2);
    assert!(ctl.display().samples.is_empty());
    assert_eq!(ctl.source().sent(), ["pong 100", "pong 100"]);

    let events = feed(&mut ctl, "20.0,19.0", start + Duration::from_secs(4));
    assert!(samples(&events)[0].elapsed_secs.abs() < 1e-9);
    assert_eq!(ctl.records().opens, 2);
}

#[test]
fn test_warmup_restarts_with_each_session() {
    let config = AcquisitionConfig {
        coefficients: vec![1.0],
        warmup_samples: 2,
        ..Default::default()
    };
    let mut ctl = SessionController::new(
        config,
        QueueLineSource::new(),
        MemorySink::default(),
        MemoryDisplay::default(),
    )
    .unwrap();
    let start = Instant::now();

    for (n, now) in [start, start + Duration::from_secs(1)].into_iter().enumerate() {
        feed(&mut ctl, "ping", now);

        // Settling readings are discarded and never reach the filter
        assert_eq!(
            feed(&mut ctl, "500.0,-500.0", now),
            vec![ControllerEvent::Filling(0.0)]
        );
        assert_eq!(
            feed(&mut ctl, "500.0,-500.0", now),
            vec![ControllerEvent::Filling(0.0)]
        );

        let events = feed(&mut ctl, "20.0,19.5", now);
        let found = samples(&events);
        assert_eq!(found.len(), 1, "session {}", n + 1);
        assert_eq!(found[0].raw, vec![20.0, 19.5]);
        assert!((found[0].difference - 0.5).abs() < 1e-12);
    }
    assert_eq!(ctl.records().opens, 2);
}

// =============================================================================
// LIVE CONTROLS AND TRANSPORT
// =============================================================================

#[test]
fn test_duration_change_applies_to_next_session() {
    let mut ctl = controller(3, 5);
    let start = Instant::now();
    feed(&mut ctl, "ping", start);

    ctl.set_duration(30).unwrap();
    assert!(ctl.set_duration(0).is_err());
    assert_eq!(ctl.pending_duration_secs(), 30);

    // Running session keeps its 5 s
    ctl.tick_at(start + Duration::from_secs(5));
    assert_eq!(ctl.state(), SessionState::Idle);

    feed(&mut ctl, "ping", start + Duration::from_secs(6));
    assert_eq!(ctl.source().sent().last().map(String::as_str), Some("pong 30"));
}

#[test]
fn test_transport_lost_returns_to_idle() {
    let mut ctl = controller(3, 100);
    let now = Instant::now();
    feed(&mut ctl, "ping", now);

    ctl.transport_lost();

    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(feed(&mut ctl, "20.0,19.5", now).is_empty());
    // No stop is owed to a device that went away
    assert_eq!(ctl.source().sent(), ["pong 100"]);
}

#[test]
fn test_failed_pong_keeps_controller_idle() {
    let config = AcquisitionConfig {
        coefficients: vec![1.0],
        ..Default::default()
    };
    let mut ctl = SessionController::new(
        config,
        BrokenWriteSource::default(),
        MemorySink::default(),
        MemoryDisplay::default(),
    )
    .unwrap();
    let now = Instant::now();

    ctl.source_mut().lines.push("ping".to_string());
    let events = ctl.tick_at(now);

    assert!(events.is_empty());
    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(ctl.session().start_instant().is_none());
    assert_eq!(ctl.display().clears, 0);

    // Data after the failed handshake belongs to no session
    ctl.source_mut().lines.push("20.0,19.5".to_string());
    assert!(ctl.tick_at(now).is_empty());
    assert_eq!(ctl.records().opens, 0);
}

// =============================================================================
// VARIANTS AND PERSISTENCE
// =============================================================================

#[test]
fn test_column_selection_for_four_field_lines() {
    let config = AcquisitionConfig {
        coefficients: vec![1.0],
        columns: Some(vec![1, 2]),
        ..Default::default()
    };
    let mut ctl = SessionController::new(
        config,
        QueueLineSource::new(),
        MemorySink::default(),
        MemoryDisplay::default(),
    )
    .unwrap();
    let now = Instant::now();
    feed(&mut ctl, "ping", now);

    // cjc,t1,t2,diff
    let events = feed(&mut ctl, "25.0,20.25,20.0,0.1", now);
    let sample = samples(&events)[0];
    assert_eq!(sample.raw, vec![20.25, 20.0]);
    assert!((sample.difference - 0.25).abs() < 1e-12);

    let events = feed(&mut ctl, "25.0,20.25", now);
    assert_eq!(events, vec![ControllerEvent::Discarded(DiscardReason::Short)]);
}

#[test]
fn test_previous_delta_mode_end_to_end() {
    let config = AcquisitionConfig {
        coefficients: vec![1.0],
        mode: ChannelMode::PreviousDelta,
        ..Default::default()
    };
    let mut ctl = SessionController::new(
        config,
        QueueLineSource::new(),
        MemorySink::default(),
        MemoryDisplay::default(),
    )
    .unwrap();
    let now = Instant::now();
    feed(&mut ctl, "ping", now);

    let diffs: Vec<f64> = ["20.0", "20.5", "20.25"]
        .iter()
        .flat_map(|line| {
            let events = feed(&mut ctl, line, now);
            samples(&events).into_iter().map(|s| s.difference).collect::<Vec<_>>()
        })
        .collect();

    assert_eq!(diffs, vec![0.0, 0.5, -0.25]);
}

#[test]
fn test_csv_file_recreated_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("measurement.csv");
    let config = AcquisitionConfig {
        coefficients: vec![1.0],
        ..Default::default()
    };
    let mut ctl = SessionController::new(
        config,
        QueueLineSource::new(),
        CsvRecordSink::new(&path, 2),
        TimeWindow::new(100.0),
    )
    .unwrap();
    let now = Instant::now();

    ctl.source_mut().push_line("ping");
    ctl.tick_at(now);
    for _ in 0..3 {
        ctl.source_mut().push_line("20.0,19.5");
        ctl.tick_at(now);
    }
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert_eq!(
        text.lines().nth(1),
        Some("0.000,20.000,19.500,20.000,19.500,0.500")
    );
    assert_eq!(ctl.display().len(), 3);

    ctl.source_mut().push_line("ping");
    ctl.tick_at(now + Duration::from_secs(1));
    assert!(ctl.display().is_empty());
    ctl.source_mut().push_line("21.0,19.0");
    ctl.tick_at(now + Duration::from_secs(1));

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().ends_with(",2.000"));
}
