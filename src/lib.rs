pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::CliConfig, DeviceArgs};

pub use config::ResolvedConfig;
pub use core::{bitmap::Bitmap, client::IcedEspresso, ws2822::Ws2822};
pub use domain::model::{DeviceTarget, RgbColor};
pub use domain::ports::DeviceApi;
pub use utils::error::{DeviceError, Result};
