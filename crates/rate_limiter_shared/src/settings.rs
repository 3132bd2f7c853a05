use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use snafu::{Snafu, ensure};

/// Rejected settings. These only surface at construction time.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("window length must be greater than zero"))]
    ZeroWindow,

    #[snafu(display("{what} must be greater than zero"))]
    ZeroCapacity { what: &'static str },

    #[snafu(display("refill interval must be greater than zero"))]
    ZeroInterval,
}

/// A configuration value that could not be used.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ConfigError {
    #[snafu(display("invalid value {value:?} for {name}"))]
    InvalidValue { name: &'static str, value: String },

    #[snafu(context(false), display("invalid settings: {source}"))]
    Settings { source: SettingsError },
}

/// Reads `name` through `lookup`, falling back to `default` when unset or blank.
pub fn parse_var<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        _ => Ok(default),
    }
}

/// Configuration of the cross-process fixed window.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `window_length_ms` | 1000 | Length of one fixed window. Window starts are multiples of this value. |
/// | `max_requests_per_window` | 2 | Admissions granted across *all* cooperating processes per window. |
///
/// # Example
///
/// ```rust
/// use rate_limiter_shared::settings::WindowSettings;
///
/// let settings = WindowSettings::builder()
///     .window_length_ms(500)
///     .max_requests_per_window(4)
///     .build();
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, Builder, PartialEq, Eq)]
pub struct WindowSettings {
    #[builder(default = default_window_length_ms())]
    pub(crate) window_length_ms: u64,

    #[builder(default = default_max_requests_per_window())]
    pub(crate) max_requests_per_window: u32,
}

const fn default_window_length_ms() -> u64 {
    1000
}

const fn default_max_requests_per_window() -> u32 {
    2
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            window_length_ms: default_window_length_ms(),
            max_requests_per_window: default_max_requests_per_window(),
        }
    }
}

impl WindowSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        ensure!(self.window_length_ms > 0, ZeroWindowSnafu);
        ensure!(
            self.max_requests_per_window > 0,
            ZeroCapacitySnafu {
                what: "max requests per window"
            }
        );
        Ok(())
    }

    pub fn get_window_length_ms(&self) -> u64 {
        self.window_length_ms
    }

    pub fn get_max_requests_per_window(&self) -> u32 {
        self.max_requests_per_window
    }

    /// Start of the window containing `now_millis`.
    pub fn window_start(&self, now_millis: u64) -> u64 {
        now_millis - (now_millis % self.window_length_ms)
    }
}

/// Configuration of the responder's token bucket.
///
/// `capacity` permits become available at the start of every refill interval.
/// Unused permits are discarded, so at most one interval's worth can ever be spent at once.
#[derive(Clone, Copy, Debug, Builder, PartialEq, Eq)]
pub struct TokenBucketSettings {
    #[builder(default = default_capacity())]
    pub(crate) capacity: u32,

    #[builder(default = default_refill_interval_ms())]
    pub(crate) refill_interval_ms: u64,
}

const fn default_capacity() -> u32 {
    1
}

const fn default_refill_interval_ms() -> u64 {
    1000
}

impl Default for TokenBucketSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_interval_ms: default_refill_interval_ms(),
        }
    }
}

impl TokenBucketSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        ensure!(
            self.capacity > 0,
            ZeroCapacitySnafu {
                what: "token bucket capacity"
            }
        );
        ensure!(self.refill_interval_ms > 0, ZeroIntervalSnafu);
        Ok(())
    }

    pub fn get_capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }
}
