//! Configuration management for the thing binding

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default binding instance ID
pub const DEFAULT_BINDING_ID: &str = "gateway-binding";

/// Default description re-announcement interval (12 hours)
pub const DEFAULT_TD_INTERVAL: u32 = 43_200;

/// Default gateway poll interval
pub const DEFAULT_POLL_INTERVAL: u32 = 60;

/// Default maximum age of an unchanged value before republication
pub const DEFAULT_REPUBLISH_INTERVAL: u32 = 3_600;

/// Default delays between forced refreshes after an action
pub const DEFAULT_REFRESH_DELAYS: [u64; 2] = [1, 4];

/// Thing binding configuration
#[derive(Debug)]
pub struct BindingConfig {
    /// Binding instance ID, also the publisher identity on the bus
    pub binding_id: String,

    /// Bus address; `None` or "local" selects the in-process bus
    pub bus_address: Option<String>,

    /// Device gateway address
    pub gateway_address: Option<String>,

    /// Gateway login name
    pub login_name: Option<String>,

    /// Gateway password
    pub password: Option<SecretString>,

    /// Seconds between description re-announcements
    pub td_interval: u32,

    /// Seconds between gateway polls
    pub poll_interval: u32,

    /// Seconds an unchanged value may go unpublished
    pub republish_interval: u32,

    /// Seconds between forced refreshes after an action
    pub refresh_delays: Vec<u64>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            binding_id: DEFAULT_BINDING_ID.to_string(),
            bus_address: None,
            gateway_address: None,
            login_name: None,
            password: None,
            td_interval: DEFAULT_TD_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            republish_interval: DEFAULT_REPUBLISH_INTERVAL,
            refresh_delays: DEFAULT_REFRESH_DELAYS.to_vec(),
        }
    }
}

impl BindingConfig {
    /// Load configuration (env > toml > default)
    ///
    /// With an explicit `path` the file must exist and parse; otherwise the
    /// standard config path is used when present.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded or a value
    /// is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if an environment value does not parse or the result
    /// fails validation
    pub fn from_sources<F>(fc: file::BindingConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let interval = |key: &str, file_value: Option<u32>, default: u32| -> Result<u32> {
            match env(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "{key} must be a whole number of seconds, got '{raw}'"
                    ))
                }),
                None => Ok(file_value.unwrap_or(default)),
            }
        };

        let config = Self {
            binding_id: env("BINDING_ID")
                .or(fc.binding_id)
                .unwrap_or(defaults.binding_id),
            bus_address: env("BINDING_BUS_ADDRESS").or(fc.bus.address),
            gateway_address: env("BINDING_GATEWAY_ADDRESS").or(fc.gateway.address),
            login_name: env("BINDING_LOGIN").or(fc.gateway.login_name),
            password: env("BINDING_PASSWORD")
                .or(fc.gateway.password)
                .map(SecretString::from),
            td_interval: interval("BINDING_TD_INTERVAL", fc.intervals.td, defaults.td_interval)?,
            poll_interval: interval(
                "BINDING_POLL_INTERVAL",
                fc.intervals.poll,
                defaults.poll_interval,
            )?,
            republish_interval: interval(
                "BINDING_REPUBLISH_INTERVAL",
                fc.intervals.republish,
                defaults.republish_interval,
            )?,
            refresh_delays: fc.intervals.refresh_delays.unwrap_or(defaults.refresh_delays),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that every interval is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an interval is zero or the binding ID is empty
    pub fn validate(&self) -> Result<()> {
        if self.binding_id.trim().is_empty() {
            return Err(Error::Config("binding_id must not be empty".to_string()));
        }
        for (name, value) in [
            ("td_interval", self.td_interval),
            ("poll_interval", self.poll_interval),
            ("republish_interval", self.republish_interval),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }

    /// Whether gateway credentials are configured
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.login_name.is_some() && self.password.is_some()
    }

    /// Whether the in-process bus is selected
    #[must_use]
    pub fn uses_local_bus(&self) -> bool {
        self.bus_address
            .as_deref()
            .is_none_or(|addr| addr.is_empty() || addr.eq_ignore_ascii_case("local"))
    }

    #[must_use]
    pub fn republish_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.republish_interval))
    }

    #[must_use]
    pub fn refresh_durations(&self) -> Vec<Duration> {
        self.refresh_delays
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }
}
