use crate::domain::model::{DeviceTarget, RgbColor};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The HTTP control surface of an IcedEspresso board.
///
/// The CM-2 endpoints (`rgb_led`, `brightness`, `bitmap`) and `dmx` only exist
/// on firmware builds that register them; other builds answer 404.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn status_led_get(&self) -> Result<bool>;
    async fn status_led_put(&self, state: bool) -> Result<()>;

    async fn rgb_led_get(&self) -> Result<RgbColor>;
    async fn rgb_led_put(&self, color: RgbColor) -> Result<()>;

    async fn brightness_get(&self) -> Result<f64>;
    async fn brightness_put(&self, brightness: f64) -> Result<()>;

    async fn register_get(&self, address: u16) -> Result<u16>;
    async fn register_put(&self, address: u16, value: u16) -> Result<()>;

    async fn memory_get(&self, address: u16, length: u16) -> Result<Vec<u8>>;
    async fn memory_put(&self, address: u16, data: &[u8]) -> Result<()>;

    async fn fpga_bitstream_put(&self, bitstream: &[u8]) -> Result<()>;
    async fn bitmap_put(&self, bitmap: &[u8]) -> Result<()>;
    async fn dmx_put(&self, channels: &[u8]) -> Result<()>;
    async fn ota(&self, image: &[u8]) -> Result<()>;

    /// Untyped GET, for probing the device with arbitrary query parameters.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value>;

    /// Untyped GET returning the raw body.
    async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>>;

    /// Untyped octet-stream PUT.
    async fn put_bytes(&self, path: &str, query: &[(&str, String)], data: &[u8]) -> Result<()>;

    /// Untyped PUT. `None` sends an empty body.
    async fn put_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn devices(&self) -> Vec<DeviceTarget>;
    fn request_timeout(&self) -> Duration;
    fn poll_timeout(&self) -> Duration;
    fn concurrency(&self) -> usize;
}
