use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rate_limiter_shared::settings::{ConfigError, WindowSettings, parse_var};

use crate::scheduler::SchedulerSettings;

pub const APP_NAME_VAR: &str = "PING_APP_NAME";
pub const PONG_BASE_URL_VAR: &str = "PONG_BASE_URL";
pub const LOCK_FILE_VAR: &str = "PING_LOCK_FILE";
pub const WINDOW_MS_VAR: &str = "PING_WINDOW_MS";
pub const MAX_REQUESTS_VAR: &str = "PING_MAX_REQUESTS_PER_WINDOW";
pub const TICK_MS_VAR: &str = "PING_TICK_MS";
pub const REQUEST_TIMEOUT_MS_VAR: &str = "PING_REQUEST_TIMEOUT_MS";

const DEFAULT_APP_NAME: &str = "ping";
const DEFAULT_PONG_BASE_URL: &str = "http://localhost:9090";
const DEFAULT_LOCK_FILE_NAME: &str = "ping-lock.bin";
const DEFAULT_TICK_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Everything one pinger process needs. Every process sharing a budget must point
/// `lock_file_path` at the same file and use the same window settings.
#[derive(Debug, Clone)]
pub struct PingConfig {
    pub app_name: String,
    pub pong_base_url: String,
    pub lock_file_path: PathBuf,
    pub window: WindowSettings,
    pub tick_period: Duration,
    pub request_timeout: Duration,
}

impl PingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_name = parse_var(&lookup, APP_NAME_VAR, DEFAULT_APP_NAME.to_string())?;
        let pong_base_url =
            parse_var(&lookup, PONG_BASE_URL_VAR, DEFAULT_PONG_BASE_URL.to_string())?;
        let lock_file_path = parse_var(
            &lookup,
            LOCK_FILE_VAR,
            env::temp_dir().join(DEFAULT_LOCK_FILE_NAME),
        )?;

        let defaults = WindowSettings::default();
        let window = WindowSettings::builder()
            .window_length_ms(parse_var(
                &lookup,
                WINDOW_MS_VAR,
                defaults.get_window_length_ms(),
            )?)
            .max_requests_per_window(parse_var(
                &lookup,
                MAX_REQUESTS_VAR,
                defaults.get_max_requests_per_window(),
            )?)
            .build();
        window.validate()?;

        let tick_ms = parse_var(&lookup, TICK_MS_VAR, DEFAULT_TICK_MS)?;
        if tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: TICK_MS_VAR,
                value: tick_ms.to_string(),
            });
        }
        let request_timeout_ms =
            parse_var(&lookup, REQUEST_TIMEOUT_MS_VAR, DEFAULT_REQUEST_TIMEOUT_MS)?;

        Ok(Self {
            app_name,
            pong_base_url,
            lock_file_path,
            window,
            tick_period: Duration::from_millis(tick_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings::builder()
            .app_name(self.app_name.clone())
            .tick_period(self.tick_period)
            .build()
    }
}
