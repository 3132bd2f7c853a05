use std::env;
use std::net::{Ipv4Addr, SocketAddr};

use rate_limiter_shared::settings::{ConfigError, TokenBucketSettings, parse_var};

pub const BIND_VAR: &str = "PONG_BIND";
pub const PERMITS_VAR: &str = "PONG_PERMITS_PER_INTERVAL";
pub const REFILL_INTERVAL_MS_VAR: &str = "PONG_REFILL_INTERVAL_MS";

const DEFAULT_PORT: u16 = 9090;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongConfig {
    pub bind_addr: SocketAddr,
    /// Applied to each route's bucket separately.
    pub bucket: TokenBucketSettings,
}

impl PongConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_var(
            &lookup,
            BIND_VAR,
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
        )?;

        let defaults = TokenBucketSettings::default();
        let bucket = TokenBucketSettings::builder()
            .capacity(parse_var(&lookup, PERMITS_VAR, defaults.get_capacity())?)
            .refill_interval_ms(parse_var(
                &lookup,
                REFILL_INTERVAL_MS_VAR,
                defaults.refill_interval().as_millis() as u64,
            )?)
            .build();
        bucket.validate()?;

        Ok(Self { bind_addr, bucket })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use rate_limiter_shared::settings::SettingsError;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_listen_on_9090_with_one_permit_per_second() {
        let config = PongConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(config.bucket.get_capacity(), 1);
        assert_eq!(config.bucket.refill_interval(), Duration::from_secs(1));
    }

    #[test]
    fn overrides() {
        let config = PongConfig::from_lookup(lookup(&[
            (BIND_VAR, "127.0.0.1:19090"),
            (PERMITS_VAR, "3"),
            (REFILL_INTERVAL_MS_VAR, "250"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:19090".parse().unwrap());
        assert_eq!(config.bucket.get_capacity(), 3);
        assert_eq!(config.bucket.refill_interval(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_address_and_zero_permits() {
        let err = PongConfig::from_lookup(lookup(&[(BIND_VAR, "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == BIND_VAR));

        let err = PongConfig::from_lookup(lookup(&[(PERMITS_VAR, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Settings {
                source: SettingsError::ZeroCapacity { .. }
            }
        ));
    }
}
