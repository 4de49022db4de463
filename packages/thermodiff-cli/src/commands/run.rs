use crate::acquisition_params;
use crate::cli::RunArgs;
use crate::display::ConsoleDisplay;
use crate::exit_codes;
use crate::transport::{self, ChannelLineSource};
use thermodiff::{ControllerEvent, CsvRecordSink, SessionController};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

type Controller = SessionController<ChannelLineSource, CsvRecordSink, ConsoleDisplay>;

pub async fn execute(args: RunArgs) -> i32 {
    let config = match acquisition_params::build_config(&args.acquisition) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if args.tick_ms == 0 {
        eprintln!("Error: --tick-ms must be positive");
        return exit_codes::INPUT_ERROR;
    }

    if !(args.window.is_finite() && args.window > 0.0) {
        eprintln!("Error: --window must be a positive number of seconds");
        return exit_codes::INPUT_ERROR;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(acquisition_params::default_output_path);
    let records = CsvRecordSink::new(&output, config.mode.channel_count());
    let display = ConsoleDisplay::new(args.window, args.quiet);

    let mut controller = match SessionController::new(
        config,
        ChannelLineSource::new(),
        records,
        display,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.quiet {
        eprintln!("Waiting for ping on {} @ {} baud", args.port, args.baud);
        eprintln!(
            "  Duration: {} s (type a new value + Enter to change)",
            controller.pending_duration_secs()
        );
        eprintln!("  Recording to {}", output.display());
    }

    run_loop(&mut controller, &args).await;

    if let Some(point) = controller.display().window().latest() {
        log::info!(
            "Last difference {:+.3} at {:.3} s",
            point.difference,
            point.elapsed_secs
        );
    }
    log::info!("Shutting down");
    exit_codes::SUCCESS
}

/// Tick the controller until Ctrl-C, keeping the port open.
async fn run_loop(controller: &mut Controller, args: &RunArgs) {
    let mut durations = spawn_duration_control();
    let reconnect_delay = Duration::from_secs(args.reconnect_secs);
    let mut next_connect = Instant::now();

    let mut ticker = interval(Duration::from_millis(args.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        if controller.source_mut().take_lost() {
            controller.transport_lost();
            next_connect = Instant::now() + reconnect_delay;
        }

        if !controller.source().is_connected() && Instant::now() >= next_connect {
            match transport::open(&args.port, args.baud) {
                Ok(link) => controller.source_mut().attach(link),
                Err(e) => {
                    log::error!("{} - retrying in {} s", e, args.reconnect_secs);
                    next_connect = Instant::now() + reconnect_delay;
                }
            }
        }

        while let Ok(duration) = durations.try_recv() {
            if let Err(e) = controller.set_duration(duration) {
                log::warn!("{}", e);
            }
        }

        for event in controller.tick() {
            report(&event);
        }
    }
}

fn report(event: &ControllerEvent) {
    match event {
        ControllerEvent::SessionStarted {
            session_id,
            duration_secs,
        } => log::debug!("session {} started ({} s)", session_id, duration_secs),
        ControllerEvent::TimedOut { session_id } => {
            log::debug!("session {} timed out", session_id)
        }
        ControllerEvent::StopAcknowledged => log::debug!("stop acknowledged"),
        ControllerEvent::Discarded(reason) => log::trace!("line discarded: {:?}", reason),
        ControllerEvent::Filling(_) | ControllerEvent::Sample(_) => {}
    }
}

/// Read new durations (whole seconds) from stdin, one per line.
fn spawn_duration_control() -> mpsc::Receiver<u64> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            match input.parse::<u64>() {
                Ok(secs) => {
                    if tx.send(secs).await.is_err() {
                        break;
                    }
                }
                Err(_) => log::warn!("Ignoring duration input {:?}: expected whole seconds", input),
            }
        }
    });

    rx
}
