//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u16>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "b003flash")]
#[command(author, version, about = "Flash CH32V003 parts through the rv003usb HID bootloader", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// USB vendor id of the bootloader
    #[arg(long, value_parser = parse_hex_u16, default_value = "0x1209", global = true)]
    pub vid: u16,

    /// USB product id of the bootloader
    #[arg(long, value_parser = parse_hex_u16, default_value = "0xb003", global = true)]
    pub pid: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show chip identity and option bytes
    Info,

    /// Read a memory range
    Read {
        /// Start address
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes
        #[arg(value_parser = parse_hex_u32)]
        length: u32,

        /// Output file (hex dump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an image file to flash
    Write {
        /// Input file path
        input: PathBuf,

        /// Target offset (normalized into flash when below 0x01000000)
        #[arg(value_parser = parse_hex_u32, default_value = "0x08000000")]
        offset: u32,

        /// Reboot into the application afterwards
        #[arg(short, long)]
        reboot: bool,
    },

    /// Erase a flash range (rounded down to sector boundaries)
    Erase {
        /// Start address
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes
        #[arg(value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Reboot into the application
    Reboot,
}
