use config::{Config as ConfigCrate, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Per-relying-party profile configuration for the device authorization
/// grant.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceFlowConfig {
    /// Length of the device code (default: 16, minimum: 16)
    #[serde(default = "default_device_code_length")]
    pub device_code_length: usize,

    /// Length of the user code (default: 6, minimum: 6)
    #[serde(default = "default_user_code_length")]
    pub user_code_length: usize,

    /// Lifetime of device/user codes in seconds (default: 5 minutes)
    #[serde(default = "default_code_lifetime_secs")]
    pub code_lifetime_secs: u64,

    /// Minimum interval between device polls in seconds (default: 5)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Lifetime of an issued access token in seconds (default: 5 minutes)
    #[serde(default = "default_access_token_lifetime_secs")]
    pub access_token_lifetime_secs: u64,

    /// Verification URI shown to the user along with the user code
    #[serde(default = "default_verification_uri")]
    pub verification_uri: String,
}

fn default_device_code_length() -> usize {
    16
}

fn default_user_code_length() -> usize {
    6
}

fn default_code_lifetime_secs() -> u64 {
    300
}

fn default_interval_secs() -> u64 {
    5
}

fn default_access_token_lifetime_secs() -> u64 {
    300
}

fn default_verification_uri() -> String {
    "https://localhost/oauth2/device/authenticate".to_string()
}

impl Default for DeviceFlowConfig {
    fn default() -> Self {
        Self {
            device_code_length: default_device_code_length(),
            user_code_length: default_user_code_length(),
            code_lifetime_secs: default_code_lifetime_secs(),
            interval_secs: default_interval_secs(),
            access_token_lifetime_secs: default_access_token_lifetime_secs(),
            verification_uri: default_verification_uri(),
        }
    }
}

impl DeviceFlowConfig {
    /// Creates a new config instance from `DEVICE_FLOW_*` environment
    /// variables, falling back to the defaults above.
    pub fn from_env() -> Result<Self, String> {
        Self::from_source(Self::env_source())
    }

    fn env_source() -> Environment {
        Environment::with_prefix("DEVICE_FLOW")
            .prefix_separator("_")
            .try_parsing(true)
    }

    fn from_source(source: Environment) -> Result<Self, String> {
        let config: Self = ConfigCrate::builder()
            .add_source(source)
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e: ConfigError| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the minimum bounds the protocol relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.device_code_length < 16 {
            return Err(format!(
                "device code length {} below minimum of 16",
                self.device_code_length
            ));
        }
        if self.user_code_length < 6 {
            return Err(format!(
                "user code length {} below minimum of 6",
                self.user_code_length
            ));
        }
        if self.code_lifetime_secs == 0 {
            return Err("device code lifetime must be greater than 0".to_string());
        }
        if self.access_token_lifetime_secs == 0 {
            return Err("access token lifetime must be greater than 0".to_string());
        }
        if self.verification_uri.is_empty() {
            return Err("verification URI must not be empty".to_string());
        }
        Ok(())
    }

    pub fn code_lifetime(&self) -> Duration {
        Duration::from_secs(self.code_lifetime_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_lifetime_secs)
    }
}
