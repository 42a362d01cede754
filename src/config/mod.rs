#[cfg(feature = "cli")]
pub mod cli;
pub mod device_config;

use crate::core::ConfigProvider;
use crate::domain::model::DeviceTarget;
use crate::utils::error::{DeviceError, Result};
use crate::utils::validation::{validate_positive_number, Validate};
use device_config::DeviceProfile;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Connection options shared by every binary.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DeviceArgs {
    /// Device host or base URL; repeat for several devices
    #[arg(short = 'd', long = "device", global = true)]
    pub devices: Vec<String>,

    /// TOML device profile
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Devices pushed to in parallel by broadcast commands
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl DeviceArgs {
    /// Merges command line options over the profile file, if one was given.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let profile = match &self.config {
            Some(path) => Some(DeviceProfile::from_file(path)?),
            None => None,
        };
        ResolvedConfig::merge(
            &self.devices,
            self.timeout,
            self.concurrency,
            profile.as_ref(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub devices: Vec<DeviceTarget>,
    pub timeout: Duration,
    pub poll_timeout: Duration,
    pub concurrency: usize,
}

impl ResolvedConfig {
    pub fn merge(
        cli_devices: &[String],
        timeout_seconds: Option<u64>,
        concurrency: Option<usize>,
        profile: Option<&DeviceProfile>,
    ) -> Result<Self> {
        let client = profile.and_then(|p| p.client.as_ref());

        // Devices named on the command line replace the profile's list.
        let devices = if cli_devices.is_empty() {
            profile.map(|p| p.devices.clone()).unwrap_or_default()
        } else {
            cli_devices.iter().map(|h| DeviceTarget::from_host(h)).collect()
        };

        let timeout_seconds = timeout_seconds
            .or_else(|| client.and_then(|c| c.timeout_seconds))
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let poll_timeout_ms = client
            .and_then(|c| c.poll_timeout_ms)
            .unwrap_or(DEFAULT_POLL_TIMEOUT_MS);
        let concurrency = concurrency
            .or_else(|| client.and_then(|c| c.concurrency))
            .unwrap_or(DEFAULT_CONCURRENCY);

        let config = Self {
            devices,
            timeout: Duration::from_secs(timeout_seconds),
            poll_timeout: Duration::from_millis(poll_timeout_ms),
            concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    /// The single device a non-broadcast command talks to.
    pub fn single_device(&self) -> Result<&DeviceTarget> {
        match self.devices.as_slice() {
            [device] => Ok(device),
            [] => Err(DeviceError::MissingConfigError {
                field: "device (use --device or a profile with one [[devices]] entry)".to_string(),
            }),
            many => Err(DeviceError::ConfigValidationError {
                field: "device".to_string(),
                message: format!(
                    "this command talks to one device, {} were given",
                    many.len()
                ),
            }),
        }
    }
}

impl Validate for ResolvedConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("timeout", self.timeout.as_secs() as usize, 1)?;
        validate_positive_number("poll_timeout", self.poll_timeout.as_millis() as usize, 1)?;
        validate_positive_number("concurrency", self.concurrency, 1)?;
        for device in &self.devices {
            device_config::validate_host(&device.name, &device.host)?;
        }
        Ok(())
    }
}

impl ConfigProvider for ResolvedConfig {
    fn devices(&self) -> Vec<DeviceTarget> {
        self.devices.clone()
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }
}
