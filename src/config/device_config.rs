use crate::domain::model::DeviceTarget;
use crate::utils::error::{DeviceError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A device profile file:
///
/// ```toml
/// [client]
/// timeout_seconds = 10
/// poll_timeout_ms = 2000
/// concurrency = 5
///
/// [[devices]]
/// name = "left-panel"
/// host = "${CM2_LEFT_HOST}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub client: Option<ClientConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub timeout_seconds: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
}

/// A host is usable when `http://<host>/` parses as a URL.
pub fn validate_host(name: &str, host: &str) -> Result<()> {
    let field = format!("devices.{}.host", name);
    validate_non_empty_string(&field, host)?;
    if host.contains("://") {
        validate_url(&field, host)
    } else {
        validate_url(&field, &format!("http://{}/", host))
    }
}

impl DeviceProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DeviceError::IoError)?;
        let profile = Self::from_toml_str(&content)?;
        tracing::debug!(
            "Loaded device profile {} ({} devices)",
            path.as_ref().display(),
            profile.devices.len()
        );
        Ok(profile)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let profile: Self =
            toml::from_str(&processed_content).map_err(|e| DeviceError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DeviceError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for DeviceProfile {
    fn validate(&self) -> Result<()> {
        if let Some(client) = &self.client {
            if let Some(timeout) = client.timeout_seconds {
                validate_positive_number("client.timeout_seconds", timeout as usize, 1)?;
            }
            if let Some(poll_timeout) = client.poll_timeout_ms {
                validate_positive_number("client.poll_timeout_ms", poll_timeout as usize, 1)?;
            }
            if let Some(concurrency) = client.concurrency {
                validate_positive_number("client.concurrency", concurrency, 1)?;
            }
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            validate_non_empty_string("devices.name", &device.name)?;
            if !seen.insert(device.name.as_str()) {
                return Err(DeviceError::InvalidConfigValueError {
                    field: "devices.name".to_string(),
                    value: device.name.clone(),
                    reason: "Device names must be unique".to_string(),
                });
            }
            if device.host.contains("${") {
                return Err(DeviceError::MissingConfigError {
                    field: format!("environment variable in {}", device.host),
                });
            }
            validate_host(&device.name, &device.host)?;
        }
        Ok(())
    }
}
