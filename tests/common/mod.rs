#![allow(dead_code)]

use async_trait::async_trait;
use icedespresso::core::ws2822::SEND_DMX_REG;
use icedespresso::domain::model::{BITMAP_LEN, DMX_CHANNEL_MAX, MEMORY_CHUNK_MAX};
use icedespresso::{DeviceApi, DeviceError, Result, RgbColor};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory board that applies the firmware's request validation rules.
///
/// A lenient board skips validation and accepts everything, which is what a
/// broken firmware build looks like to the conformance checks.
#[derive(Clone, Default)]
pub struct FakeDevice {
    pub state: Arc<Mutex<FakeState>>,
    lenient: bool,
    short_reads: bool,
    unknown_path_status: Option<u16>,
    bitmap_delay: Duration,
    panic_on_bitmap: bool,
}

#[derive(Default)]
pub struct FakeState {
    pub status_led: bool,
    pub rgb: (f64, f64, f64),
    pub brightness: f64,
    pub registers: HashMap<u16, u16>,
    pub memory: Vec<u8>,
    pub register_writes: Vec<(u16, u16)>,
    pub dmx_frames: Vec<Vec<u8>>,
    pub bitmaps: Vec<Vec<u8>>,
    pub bitstream: Option<Vec<u8>>,
    pub ota_image: Option<Vec<u8>>,
    pub send_polls: usize,
    pub bitmaps_in_flight: usize,
    pub max_bitmaps_in_flight: usize,
}

fn rejected() -> DeviceError {
    DeviceError::Http {
        status: 400,
        body: r#"{"error":"Error applying state"}"#.to_string(),
    }
}

fn query_u16(query: &[(&str, String)], key: &str) -> Result<u16> {
    query
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse::<u16>().ok())
        .ok_or_else(rejected)
}

fn unit_interval(body: &Value, key: &str) -> Result<f64> {
    body.get(key)
        .and_then(Value::as_f64)
        .filter(|v| (0.0..=1.0).contains(v))
        .ok_or_else(rejected)
}

impl FakeDevice {
    pub fn new() -> Self {
        let device = Self::default();
        device.state.lock().unwrap().memory = vec![0; 0x10000 + MEMORY_CHUNK_MAX];
        device
    }

    pub fn lenient() -> Self {
        Self {
            lenient: true,
            ..Self::new()
        }
    }

    /// Memory reads come back one byte short.
    pub fn with_short_reads(mut self) -> Self {
        self.short_reads = true;
        self
    }

    /// Status for paths with no handler; 404 unless overridden.
    pub fn with_unknown_path_status(mut self, status: u16) -> Self {
        self.unknown_path_status = Some(status);
        self
    }

    pub fn with_bitmap_delay(mut self, delay: Duration) -> Self {
        self.bitmap_delay = delay;
        self
    }

    pub fn panicking_on_bitmap(mut self) -> Self {
        self.panic_on_bitmap = true;
        self
    }

    fn unknown_path(&self) -> DeviceError {
        DeviceError::Http {
            status: self.unknown_path_status.unwrap_or(404),
            body: "Nothing matches the given URI".to_string(),
        }
    }

    fn store_register(&self, address: u16, value: u16) {
        let mut state = self.state.lock().unwrap();
        state.registers.insert(address, value);
        state.register_writes.push((address, value));
    }

    /// A lenient board turns every 400 into a success.
    fn accept_if_lenient<T>(&self, result: Result<T>, accepted: impl FnOnce() -> T) -> Result<T> {
        match result {
            Err(e) if self.lenient && e.status() == Some(400) => Ok(accepted()),
            other => other,
        }
    }

    fn read_bytes(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        if path != "fpga/memory" {
            return Err(self.unknown_path());
        }
        let address = usize::from(query_u16(query, "address")?);
        let length = usize::from(query_u16(query, "length")?);
        if length == 0 || length > MEMORY_CHUNK_MAX {
            return Err(rejected());
        }
        let length = if self.short_reads { length - 1 } else { length };
        Ok(self.state.lock().unwrap().memory[address..address + length].to_vec())
    }

    fn write_bytes(&self, path: &str, query: &[(&str, String)], data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match path {
            "fpga/memory" => {
                let address = usize::from(query_u16(query, "address")?);
                if data.len() > MEMORY_CHUNK_MAX {
                    return Err(rejected());
                }
                state.memory[address..address + data.len()].copy_from_slice(data);
            }
            "bitmap" => {
                if data.len() != BITMAP_LEN {
                    return Err(rejected());
                }
                state.bitmaps.push(data.to_vec());
            }
            "dmx" => {
                if data.len() > DMX_CHANNEL_MAX {
                    return Err(rejected());
                }
                state.dmx_frames.push(data.to_vec());
            }
            "fpga/bitstream" => state.bitstream = Some(data.to_vec()),
            "ota" => state.ota_image = Some(data.to_vec()),
            _ => return Err(self.unknown_path()),
        }
        Ok(())
    }

    fn write_json(&self, path: &str, query: &[(&str, String)], body: Option<Value>) -> Result<()> {
        let body = match (path, body) {
            ("status_led" | "fpga/register" | "rgb_led" | "brightness", Some(body)) => body,
            ("status_led" | "fpga/register" | "rgb_led" | "brightness" | "bitmap", _) => {
                return Err(rejected())
            }
            _ => return Err(self.unknown_path()),
        };

        match path {
            "status_led" => {
                let state = body.get("state").and_then(Value::as_bool).ok_or_else(rejected)?;
                self.state.lock().unwrap().status_led = state;
            }
            "fpga/register" => {
                let address = query_u16(query, "address")?;
                let value = body
                    .get("value")
                    .and_then(Value::as_u64)
                    .and_then(|v| u16::try_from(v).ok())
                    .ok_or_else(rejected)?;
                self.store_register(address, value);
            }
            "rgb_led" => {
                let rgb = (
                    unit_interval(&body, "red")?,
                    unit_interval(&body, "green")?,
                    unit_interval(&body, "blue")?,
                );
                self.state.lock().unwrap().rgb = rgb;
            }
            "brightness" => {
                self.state.lock().unwrap().brightness = unit_interval(&body, "brightness")?;
            }
            _ => return Err(self.unknown_path()),
        }
        Ok(())
    }

    fn read_register(&self, address: u16) -> u16 {
        let mut state = self.state.lock().unwrap();
        let value = state.registers.get(&address).copied().unwrap_or(0);
        if address == SEND_DMX_REG && value == 1 {
            // The transfer finishes after the first poll sees it busy
            state.send_polls += 1;
            state.registers.insert(address, 0);
        }
        value
    }
}

#[async_trait]
impl DeviceApi for FakeDevice {
    async fn status_led_get(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().status_led)
    }

    async fn status_led_put(&self, state: bool) -> Result<()> {
        self.put_json("status_led", &[], Some(json!({ "state": state })))
            .await
    }

    async fn rgb_led_get(&self) -> Result<RgbColor> {
        let (red, green, blue) = self.state.lock().unwrap().rgb;
        Ok(RgbColor::new(red, green, blue))
    }

    async fn rgb_led_put(&self, color: RgbColor) -> Result<()> {
        self.put_json("rgb_led", &[], Some(serde_json::to_value(color)?))
            .await
    }

    async fn brightness_get(&self) -> Result<f64> {
        Ok(self.state.lock().unwrap().brightness)
    }

    async fn brightness_put(&self, brightness: f64) -> Result<()> {
        self.put_json("brightness", &[], Some(json!({ "brightness": brightness })))
            .await
    }

    async fn register_get(&self, address: u16) -> Result<u16> {
        Ok(self.read_register(address))
    }

    async fn register_put(&self, address: u16, value: u16) -> Result<()> {
        self.store_register(address, value);
        Ok(())
    }

    async fn memory_get(&self, address: u16, length: u16) -> Result<Vec<u8>> {
        let query = [
            ("address", address.to_string()),
            ("length", length.to_string()),
        ];
        self.get_bytes("fpga/memory", &query).await
    }

    async fn memory_put(&self, address: u16, data: &[u8]) -> Result<()> {
        self.put_bytes("fpga/memory", &[("address", address.to_string())], data)
            .await
    }

    async fn fpga_bitstream_put(&self, bitstream: &[u8]) -> Result<()> {
        self.put_bytes("fpga/bitstream", &[], bitstream).await
    }

    async fn bitmap_put(&self, bitmap: &[u8]) -> Result<()> {
        if self.panic_on_bitmap {
            panic!("bitmap handler crashed");
        }
        {
            let mut state = self.state.lock().unwrap();
            state.bitmaps_in_flight += 1;
            state.max_bitmaps_in_flight = state.max_bitmaps_in_flight.max(state.bitmaps_in_flight);
        }
        tokio::time::sleep(self.bitmap_delay).await;
        self.state.lock().unwrap().bitmaps_in_flight -= 1;
        self.put_bytes("bitmap", &[], bitmap).await
    }

    async fn dmx_put(&self, channels: &[u8]) -> Result<()> {
        self.put_bytes("dmx", &[], channels).await
    }

    async fn ota(&self, image: &[u8]) -> Result<()> {
        self.put_bytes("ota", &[], image).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        match path {
            "status_led" => Ok(json!({ "state": self.state.lock().unwrap().status_led })),
            "fpga/register" => {
                let address = query_u16(query, "address")?;
                Ok(json!({ "value": self.read_register(address) }))
            }
            _ => Err(self.unknown_path()),
        }
    }

    async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        self.accept_if_lenient(self.read_bytes(path, query), Vec::new)
    }

    async fn put_bytes(&self, path: &str, query: &[(&str, String)], data: &[u8]) -> Result<()> {
        self.accept_if_lenient(self.write_bytes(path, query, data), || ())
    }

    async fn put_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<()> {
        self.accept_if_lenient(self.write_json(path, query, body), || ())
    }
}
