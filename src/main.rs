//! b003flash - Flash CH32V003 parts through the rv003usb HID bootloader
//!
//! Thin command-line wrapper around the session engine in `b003flash-core`
//! and the USB HID feature-report transport in `b003flash-hid`. One
//! invocation opens one device, keeps the bootloader resident and runs a
//! single operation against it.

mod cli;
mod commands;

use b003flash_core::B003Flasher;
use b003flash_hid::HidFeatureTransport;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut dev = B003Flasher::new(HidFeatureTransport::new(cli.vid, cli.pid));
    dev.init()?;

    match cli.command {
        Commands::Info => commands::run_info(&mut dev),
        Commands::Read {
            address,
            length,
            output,
        } => commands::run_read(&mut dev, address, length, output.as_deref()),
        Commands::Write {
            input,
            offset,
            reboot,
        } => commands::run_write(&mut dev, &input, offset, reboot),
        Commands::Erase { address, length } => commands::run_erase(&mut dev, address, length),
        Commands::Reboot => commands::run_reboot(&mut dev),
    }
}
