use clap::Parser;

mod acquisition_params;
mod cli;
mod commands;
mod display;
mod exit_codes;
mod transport;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let exit_code = match cli.command {
        cli::Command::Run(args) => commands::run::execute(args).await,
        cli::Command::Config(args) => commands::config::execute(args),
        cli::Command::Ports(args) => commands::ports::execute(args),
    };

    std::process::exit(exit_code);
}
