use serde::{Deserialize, Serialize};

/// Largest payload the firmware moves through the FPGA memory window in one request.
pub const MEMORY_CHUNK_MAX: usize = 512;

/// CM-2 panel: 16 x 32 pixels, one byte each.
pub const BITMAP_WIDTH: usize = 16;
pub const BITMAP_HEIGHT: usize = 32;
pub const BITMAP_LEN: usize = BITMAP_WIDTH * BITMAP_HEIGHT;

pub const DMX_CHANNEL_MAX: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl RgbColor {
    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }

    pub fn off() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// True when every channel is within `tolerance` of `other`.
    pub fn approx_eq(&self, other: &RgbColor, tolerance: f64) -> bool {
        (self.red - other.red).abs() <= tolerance
            && (self.green - other.green).abs() <= tolerance
            && (self.blue - other.blue).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLed {
    pub state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brightness {
    pub brightness: f64,
}

/// Body the firmware sends back for a successful PUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub code: i64,
    pub message: String,
}

/// A device entry from the command line or a profile file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub name: String,
    pub host: String,
}

impl DeviceTarget {
    pub fn from_host(host: &str) -> Self {
        Self {
            name: host.to_string(),
            host: host.to_string(),
        }
    }
}
