pub mod bitmap;
pub mod broadcast;
pub mod client;
pub mod conformance;
pub mod rom_table;
pub mod ws2822;

pub use crate::domain::model::{DeviceTarget, RgbColor};
pub use crate::domain::ports::{ConfigProvider, DeviceApi};
pub use crate::utils::error::Result;
