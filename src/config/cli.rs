use super::DeviceArgs;
use crate::utils::validation::parse_u16;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "icedespresso")]
#[command(about = "Control an IcedEspresso / CM-2 board over its HTTP API")]
pub struct CliConfig {
    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(switch: Switch) -> bool {
        switch == Switch::On
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Read or set the status LED
    StatusLed { state: Option<Switch> },

    /// Read or set the CM-2 RGB LED (channels in 0..=1)
    Rgb {
        #[arg(num_args = 3, value_names = ["RED", "GREEN", "BLUE"])]
        color: Option<Vec<f64>>,
    },

    /// Read or set the CM-2 display brightness (0..=1)
    Brightness { level: Option<f64> },

    /// Read an FPGA register, or write it when a value is given
    Register {
        #[arg(value_parser = parse_address)]
        address: u16,
        #[arg(value_parser = parse_value)]
        value: Option<u16>,
    },

    /// Access the FPGA memory window
    #[command(subcommand)]
    Memory(MemoryCommand),

    /// Load and start an FPGA bitstream
    Bitstream { file: PathBuf },

    /// Push a 512 byte bitmap to every configured device
    Bitmap { file: PathBuf },

    /// Push raw DMX channel data
    Dmx { file: PathBuf },

    /// Flash a firmware image over the air
    Ota { file: PathBuf },

    /// Run the API conformance checks against a live device
    Check {
        /// Also check the CM-2 endpoints
        #[arg(long)]
        cm2: bool,

        /// Write and read back the panel buffers
        #[arg(long)]
        memory_readback: bool,

        /// Bitstream to load before the checks
        #[arg(long)]
        bitstream: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum MemoryCommand {
    Read {
        #[arg(value_parser = parse_address)]
        address: u16,
        #[arg(value_parser = parse_value)]
        length: u16,
        /// Write the bytes to a file instead of printing a hex dump
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Write {
        #[arg(value_parser = parse_address)]
        address: u16,
        file: PathBuf,
    },
}

pub fn parse_address(text: &str) -> Result<u16, String> {
    parse_u16("address", text).map_err(|e| e.to_string())
}

pub fn parse_value(text: &str) -> Result<u16, String> {
    parse_u16("value", text).map_err(|e| e.to_string())
}
