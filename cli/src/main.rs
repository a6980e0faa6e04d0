use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use mtp_detect_usb::service::UsbDeviceService;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::process::ExitCode;

use crate::cli::{Cli, LevelFilter};
use crate::walker::{SessionWalker, WalkerConfig};

mod cli;
mod decoder;
#[cfg(test)]
mod testing;
mod walker;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<ExitCode> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        match args.log_level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    debug!("Starting mtp-detect v{}", VERSION);

    let config = WalkerConfig {
        fragment_name: args.fragment_name,
        ..Default::default()
    };

    let stdout = std::io::stdout();
    let mut walker = SessionWalker::new(UsbDeviceService::new(), stdout.lock(), config);

    let status = if args.probe {
        walker.run_probe()?
    } else {
        walker.run_diagnostics()?
    };
    Ok(status.into())
}
