use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thermodiff::ChannelMode;

#[derive(Parser)]
#[command(
    name = "thermodiff",
    version,
    about = "Differential temperature acquisition over a serial link",
    long_about = "Answers the sensor board's ping/pong handshake, FIR-filters the incoming\n\
                  readings and records the filtered difference to CSV.\n\
                  Set $THERMODIFF_PORT or use --port to choose the serial device."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the board and run measurement sessions until Ctrl-C
    Run(RunArgs),
    /// Print the effective acquisition configuration as JSON
    Config(ConfigArgs),
    /// List serial ports
    Ports(PortsArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Two channels, filtered[0] - filtered[1]
    Differential,
    /// One channel, change from the previous filtered value
    PreviousDelta,
}

impl From<ModeArg> for ChannelMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Differential => ChannelMode::Differential,
            ModeArg::PreviousDelta => ChannelMode::PreviousDelta,
        }
    }
}

/// Acquisition settings shared by `run` and `config`. Flags override the
/// values loaded from `--config`.
#[derive(Args, Clone, Debug, Default)]
pub struct AcquisitionArgs {
    /// JSON file with an acquisition configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Measurement duration in seconds, sent to the board in "pong <n>"
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Readings discarded at the start of each session
    #[arg(long)]
    pub warmup: Option<usize>,

    /// How the difference is computed
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 0-based data-line fields feeding the channels (e.g. "1 2" for cjc,t1,t2,diff lines)
    #[arg(long, num_args = 1..)]
    pub columns: Option<Vec<usize>>,

    /// Comma-separated FIR coefficients
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub coefficients: Option<Vec<f64>>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Serial port path (e.g. /dev/ttyUSB0, COM5)
    #[arg(short, long, env = "THERMODIFF_PORT")]
    pub port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,

    #[command(flatten)]
    pub acquisition: AcquisitionArgs,

    /// CSV output file, recreated at every session (default: timestamped name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seconds of history kept for the live display
    #[arg(long, default_value_t = 100.0)]
    pub window: f64,

    /// Controller tick period in milliseconds
    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,

    /// Seconds to wait before reopening a lost or unavailable port
    #[arg(long, default_value_t = 2)]
    pub reconnect_secs: u64,

    /// Do not print samples to stdout
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub acquisition: AcquisitionArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct PortsArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
