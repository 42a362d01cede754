//! Live-device API conformance checks.
//!
//! Each check talks to a real board (or a fake one in tests) and verifies both
//! that valid requests round-trip and that the firmware rejects malformed ones
//! with a non-200 status. Checks run sequentially, in a fixed order, since
//! several of them share device state (status LED, RGB registers).

use crate::domain::model::{RgbColor, BITMAP_LEN, MEMORY_CHUNK_MAX};
use crate::domain::ports::DeviceApi;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};

/// Tolerance for float values read back from the device.
pub const FLOAT_TOLERANCE: f64 = 1e-4;

const RGB_RED_REG: u16 = 0x00F0;
const RGB_GREEN_REG: u16 = 0x00F1;

const LEFT_PANEL_BUFFER: u16 = 0x0000;
const RIGHT_PANEL_BUFFER: u16 = 0x0200;

const BAD_MIN: f64 = -0.0000001;
const BAD_MAX: f64 = 1.0000001;

type CheckOutcome = std::result::Result<(), String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    #[serde(flatten)]
    pub status: CheckStatus,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub device: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<CheckResult>,
}

impl Report {
    fn count(&self, pred: impl Fn(&CheckStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, CheckStatus::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CheckStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CheckStatus::Skipped(_)))
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn result(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped in {}ms",
            self.device,
            self.passed(),
            self.failed(),
            self.skipped(),
            self.duration_ms
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    /// Run the CM-2 endpoint checks (rgb_led, brightness, bitmap).
    pub cm2: bool,
    /// Write two panel buffers and read them back. Not every bitstream supports read-back.
    pub memory_readback: bool,
    /// Bitstream to load before anything else.
    pub bitstream: Option<Vec<u8>>,
}

pub struct ConformanceSuite<'a, D: DeviceApi> {
    device: &'a D,
    device_name: String,
    options: SuiteOptions,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Passes when `result` is a device rejection (non-200).
fn expect_rejected<T: std::fmt::Debug>(what: &str, result: Result<T>) -> CheckOutcome {
    match result {
        Err(e) if e.is_rejection() => Ok(()),
        Err(e) => Err(format!("{}: expected a rejection, got error: {}", what, e)),
        Ok(value) => Err(format!("{}: device accepted it ({:?})", what, value)),
    }
}

fn expect_ok<T>(what: &str, result: Result<T>) -> std::result::Result<T, String> {
    result.map_err(|e| format!("{}: {}", what, e))
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: T, expected: T) -> CheckOutcome {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{}: expected {:?}, got {:?}", what, expected, actual))
    }
}

fn expect_close(what: &str, actual: f64, expected: f64) -> CheckOutcome {
    if (actual - expected).abs() <= FLOAT_TOLERANCE {
        Ok(())
    } else {
        Err(format!("{}: expected {} (±{}), got {}", what, expected, FLOAT_TOLERANCE, actual))
    }
}

fn address(value: impl ToString) -> [(&'static str, String); 1] {
    [("address", value.to_string())]
}

impl<'a, D: DeviceApi> ConformanceSuite<'a, D> {
    pub fn new(device: &'a D, device_name: impl Into<String>, options: SuiteOptions) -> Self {
        Self {
            device,
            device_name: device_name.into(),
            options,
        }
    }

    pub async fn run(&self) -> Report {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut results = Vec::new();

        tracing::info!("Running conformance checks against {}", self.device_name);

        match &self.options.bitstream {
            Some(bitstream) => {
                record(&mut results, "fpga_bitstream_put", self.fpga_bitstream_put(bitstream)).await
            }
            None => skip(&mut results, "fpga_bitstream_put", "no bitstream given"),
        }

        record(&mut results, "unknown_endpoint", self.unknown_endpoint()).await;
        record(&mut results, "status_led_put_bad_data", self.status_led_put_bad_data()).await;
        record(&mut results, "status_led_get_put", self.status_led_get_put()).await;

        record(&mut results, "fpga_register_get_bad_addr", self.register_get_bad_addr()).await;
        record(&mut results, "fpga_register_put_bad_addr", self.register_put_bad_addr()).await;
        record(&mut results, "fpga_register_put_bad_data", self.register_put_bad_data()).await;
        record(&mut results, "fpga_register_get_put", self.register_get_put()).await;

        record(&mut results, "fpga_memory_get_bad_addr", self.memory_get_bad_addr()).await;
        record(&mut results, "fpga_memory_get_bad_length", self.memory_get_bad_length()).await;
        record(&mut results, "fpga_memory_put_bad_addr", self.memory_put_bad_addr()).await;
        record(&mut results, "fpga_memory_put_bad_data", self.memory_put_bad_data()).await;
        record(&mut results, "fpga_memory_get", self.memory_get()).await;

        if self.options.memory_readback {
            record(&mut results, "fpga_memory_put_get", self.memory_put_get()).await;
        } else {
            skip(&mut results, "fpga_memory_put_get", "memory read-back not enabled");
        }

        const CM2_CHECKS: [&str; 7] = [
            "cm2_rgb_led_put_bad_data",
            "cm2_rgb_led_get_put",
            "cm2_brightness_put_bad_data",
            "cm2_brightness_get_put",
            "cm2_bitmap_put_bad_data",
            "cm2_bitmap_put",
            "cm2_status_led_restore",
        ];

        if self.options.cm2 {
            record(&mut results, CM2_CHECKS[0], self.rgb_led_put_bad_data()).await;
            record(&mut results, CM2_CHECKS[1], self.rgb_led_get_put()).await;
            record(&mut results, CM2_CHECKS[2], self.brightness_put_bad_data()).await;
            record(&mut results, CM2_CHECKS[3], self.brightness_get_put()).await;
            record(&mut results, CM2_CHECKS[4], self.bitmap_put_bad_data()).await;
            record(&mut results, CM2_CHECKS[5], self.bitmap_put()).await;
            record(&mut results, CM2_CHECKS[6], self.status_led_restore()).await;
        } else {
            for name in CM2_CHECKS {
                skip(&mut results, name, "CM-2 checks not enabled");
            }
        }

        let report = Report {
            device: self.device_name.clone(),
            started_at,
            duration_ms: millis(clock.elapsed()),
            results,
        };
        tracing::info!("{}", report.summary());
        report
    }

    async fn fpga_bitstream_put(&self, bitstream: &[u8]) -> CheckOutcome {
        expect_ok("bitstream upload", self.device.fpga_bitstream_put(bitstream).await)
    }

    /// Paths the firmware has no handler for must be a 404, not any rejection.
    async fn unknown_endpoint(&self) -> CheckOutcome {
        match self.device.get_json("bad_address", &[]).await {
            Err(e) if e.status() == Some(404) => Ok(()),
            Err(e) => Err(format!("bad_address: expected 404, got {}", e)),
            Ok(value) => Err(format!("bad_address: device answered {}", value)),
        }
    }

    async fn status_led_put_bad_data(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected("empty body", d.put_json("status_led", &[], None).await)?;
        expect_rejected(
            "state -1",
            d.put_json("status_led", &[], Some(json!({"state": -1}))).await,
        )?;
        expect_rejected(
            "state \"\"",
            d.put_json("status_led", &[], Some(json!({"state": ""}))).await,
        )
    }

    async fn status_led_get_put(&self) -> CheckOutcome {
        for state in [true, false] {
            expect_ok("status_led put", self.device.status_led_put(state).await)?;
            let read = expect_ok("status_led get", self.device.status_led_get().await)?;
            expect_eq("status_led", read, state)?;
        }
        Ok(())
    }

    async fn register_get_bad_addr(&self) -> CheckOutcome {
        for bad in ["string", "-1", "65536"] {
            expect_rejected(
                &format!("address {}", bad),
                self.device.get_json("fpga/register", &address(bad)).await,
            )?;
        }
        Ok(())
    }

    async fn register_put_bad_addr(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected(
            "missing address",
            d.put_json("fpga/register", &[], Some(json!({"value": 0}))).await,
        )?;
        for bad in ["string", "-1", "65536"] {
            expect_rejected(
                &format!("address {}", bad),
                d.put_json("fpga/register", &address(bad), Some(json!({"value": 0})))
                    .await,
            )?;
        }
        Ok(())
    }

    async fn register_put_bad_data(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected(
            "missing value",
            d.put_json("fpga/register", &address(0), None).await,
        )?;
        let bad_values: [Value; 3] = [json!("string"), json!(-1), json!(0x10000)];
        for bad in bad_values {
            expect_rejected(
                &format!("value {}", bad),
                d.put_json("fpga/register", &address(0), Some(json!({ "value": bad })))
                    .await,
            )?;
        }
        Ok(())
    }

    async fn register_get_put(&self) -> CheckOutcome {
        let d = self.device;
        for (a, b) in [(0xAAAA, 0x5555), (0xFFFF, 0x0000)] {
            expect_ok("register put", d.register_put(RGB_RED_REG, a).await)?;
            expect_ok("register put", d.register_put(RGB_GREEN_REG, b).await)?;
            let read_a = expect_ok("register get", d.register_get(RGB_RED_REG).await)?;
            let read_b = expect_ok("register get", d.register_get(RGB_GREEN_REG).await)?;
            expect_eq("register 0x00F0", read_a, a)?;
            expect_eq("register 0x00F1", read_b, b)?;
        }
        Ok(())
    }

    async fn memory_get_bad_addr(&self) -> CheckOutcome {
        for bad in ["string", "-1", "65536"] {
            let query = [("address", bad.to_string()), ("length", "1".to_string())];
            expect_rejected(
                &format!("address {}", bad),
                self.device.get_bytes("fpga/memory", &query).await,
            )?;
        }
        Ok(())
    }

    async fn memory_get_bad_length(&self) -> CheckOutcome {
        let too_long = (MEMORY_CHUNK_MAX + 1).to_string();
        for bad in ["string", "0", too_long.as_str()] {
            let query = [("address", "0".to_string()), ("length", bad.to_string())];
            expect_rejected(
                &format!("length {}", bad),
                self.device.get_bytes("fpga/memory", &query).await,
            )?;
        }
        Ok(())
    }

    async fn memory_put_bad_addr(&self) -> CheckOutcome {
        for bad in ["string", "-1", "65536"] {
            expect_rejected(
                &format!("address {}", bad),
                self.device
                    .put_bytes("fpga/memory", &address(bad), &[0u8])
                    .await,
            )?;
        }
        Ok(())
    }

    async fn memory_put_bad_data(&self) -> CheckOutcome {
        let oversized = vec![0u8; MEMORY_CHUNK_MAX + 1];
        expect_rejected(
            "513 byte write",
            self.device.memory_put(0, &oversized).await,
        )
    }

    async fn memory_get(&self) -> CheckOutcome {
        for length in [1u16, 255] {
            let data = expect_ok("memory get", self.device.memory_get(0, length).await)?;
            expect_eq("memory read length", data.len(), usize::from(length))?;
        }
        Ok(())
    }

    async fn memory_put_get(&self) -> CheckOutcome {
        let d = self.device;
        let data_a: Vec<u8> = (0..MEMORY_CHUNK_MAX).map(|i| (i % 256) as u8).collect();
        let data_b: Vec<u8> = (0..MEMORY_CHUNK_MAX).map(|i| (255 - i % 256) as u8).collect();
        let length = MEMORY_CHUNK_MAX as u16;

        for (left, right) in [(&data_a, &data_b), (&data_b, &data_a)] {
            expect_ok("memory put", d.memory_put(LEFT_PANEL_BUFFER, left).await)?;
            expect_ok("memory put", d.memory_put(RIGHT_PANEL_BUFFER, right).await)?;
            let read_left = expect_ok("memory get", d.memory_get(LEFT_PANEL_BUFFER, length).await)?;
            let read_right =
                expect_ok("memory get", d.memory_get(RIGHT_PANEL_BUFFER, length).await)?;
            expect_eq("left panel buffer", &read_left, left)?;
            expect_eq("right panel buffer", &read_right, right)?;
        }
        Ok(())
    }

    async fn rgb_led_put_bad_data(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected("empty body", d.put_json("rgb_led", &[], None).await)?;

        for bad in [BAD_MIN, BAD_MAX] {
            let colors = [
                RgbColor::new(bad, 0.0, 0.0),
                RgbColor::new(0.0, bad, 0.0),
                RgbColor::new(0.0, 0.0, bad),
            ];
            for color in colors {
                expect_rejected(&format!("{:?}", color), d.rgb_led_put(color).await)?;
            }
        }
        Ok(())
    }

    async fn rgb_led_get_put(&self) -> CheckOutcome {
        let d = self.device;
        for color in [RgbColor::new(0.1, 0.2, 0.3), RgbColor::new(0.9, 0.8, 0.7)] {
            expect_ok("rgb_led put", d.rgb_led_put(color).await)?;
            let read = expect_ok("rgb_led get", d.rgb_led_get().await)?;
            if !read.approx_eq(&color, FLOAT_TOLERANCE) {
                return Err(format!(
                    "rgb_led: expected {:?} (±{}), got {:?}",
                    color, FLOAT_TOLERANCE, read
                ));
            }
        }
        Ok(())
    }

    async fn brightness_put_bad_data(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected("empty body", d.put_json("brightness", &[], None).await)?;
        expect_rejected("brightness below 0", d.brightness_put(BAD_MIN).await)?;
        expect_rejected("brightness above 1", d.brightness_put(BAD_MAX).await)?;
        expect_rejected(
            "brightness \"string\"",
            d.put_json("brightness", &[], Some(json!({"brightness": "string"})))
                .await,
        )
    }

    async fn brightness_get_put(&self) -> CheckOutcome {
        let d = self.device;
        for level in [0.1, 1.0] {
            expect_ok("brightness put", d.brightness_put(level).await)?;
            let read = expect_ok("brightness get", d.brightness_get().await)?;
            expect_close("brightness", read, level)?;
        }
        Ok(())
    }

    async fn bitmap_put_bad_data(&self) -> CheckOutcome {
        let d = self.device;
        expect_rejected("empty body", d.put_json("bitmap", &[], None).await)?;
        for length in [0, BITMAP_LEN - 1, BITMAP_LEN + 1] {
            let bitmap = vec![0u8; length];
            expect_rejected(&format!("{} byte bitmap", length), d.bitmap_put(&bitmap).await)?;
        }
        Ok(())
    }

    async fn bitmap_put(&self) -> CheckOutcome {
        let mut bitmap = vec![0u8; BITMAP_LEN];
        bitmap[0] = 255;
        expect_ok("bitmap put", self.device.bitmap_put(&bitmap).await)
    }

    /// Leaves the board dark after the CM-2 checks lit it up.
    async fn status_led_restore(&self) -> CheckOutcome {
        expect_ok("rgb_led off", self.device.rgb_led_put(RgbColor::off()).await)?;
        expect_ok("status_led off", self.device.status_led_put(false).await)
    }
}

async fn record(
    results: &mut Vec<CheckResult>,
    name: &str,
    check: impl Future<Output = CheckOutcome>,
) {
    let clock = Instant::now();
    let status = match check.await {
        Ok(()) => {
            tracing::info!("✅ {}", name);
            CheckStatus::Passed
        }
        Err(reason) => {
            tracing::error!("❌ {}: {}", name, reason);
            CheckStatus::Failed(reason)
        }
    };
    results.push(CheckResult {
        name: name.to_string(),
        status,
        elapsed_ms: millis(clock.elapsed()),
    });
}

fn skip(results: &mut Vec<CheckResult>, name: &str, reason: &str) {
    tracing::debug!("⏭️ {} skipped: {}", name, reason);
    results.push(CheckResult {
        name: name.to_string(),
        status: CheckStatus::Skipped(reason.to_string()),
        elapsed_ms: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::DeviceError;

    #[test]
    fn test_expect_rejected() {
        let rejected: Result<()> = Err(DeviceError::Http {
            status: 400,
            body: "{}".to_string(),
        });
        assert!(expect_rejected("x", rejected).is_ok());

        let accepted: Result<()> = Ok(());
        assert!(expect_rejected("x", accepted).is_err());

        let timed_out: Result<()> = Err(DeviceError::Timeout {
            operation: "x".to_string(),
        });
        assert!(expect_rejected("x", timed_out).is_err());
    }

    #[test]
    fn test_expect_close() {
        assert!(expect_close("red", 0.10004, 0.1).is_ok());
        assert!(expect_close("red", 0.1002, 0.1).is_err());
    }

    #[test]
    fn test_report_counts() {
        let report = Report {
            device: "cm2".to_string(),
            started_at: Utc::now(),
            duration_ms: 12,
            results: vec![
                CheckResult {
                    name: "a".to_string(),
                    status: CheckStatus::Passed,
                    elapsed_ms: 1,
                },
                CheckResult {
                    name: "b".to_string(),
                    status: CheckStatus::Failed("nope".to_string()),
                    elapsed_ms: 1,
                },
                CheckResult {
                    name: "c".to_string(),
                    status: CheckStatus::Skipped("off".to_string()),
                    elapsed_ms: 0,
                },
            ],
        };
        assert_eq!((report.passed(), report.failed(), report.skipped()), (1, 1, 1));
        assert!(!report.all_passed());
        assert_eq!(report.summary(), "cm2: 1 passed, 1 failed, 1 skipped in 12ms");
    }

    #[test]
    fn test_check_result_serializes_flat() {
        let result = CheckResult {
            name: "cm2_bitmap_put".to_string(),
            status: CheckStatus::Failed("rejected".to_string()),
            elapsed_ms: 3,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "rejected");
        assert_eq!(value["name"], "cm2_bitmap_put");
    }
}
