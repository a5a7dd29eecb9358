//! Process configuration.
//!
//! Built once at startup from the environment and handed to every component by
//! value; nothing reads the environment after that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use warden_auth::{KeyMaterial, KeyMaterialError};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_ACCESS_TTL_MINUTES: u64 = 15;
pub const DEFAULT_REFRESH_TTL_DAYS: u64 = 7;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 20;
pub const DEFAULT_RATE_LIMIT_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Longest duration any setting may express.
pub const MAX_CONFIGURED_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

const MS_PER_MINUTE: u64 = 60 * 1000;
const MS_PER_DAY: u64 = 24 * 60 * MS_PER_MINUTE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Keys(#[from] KeyMaterialError),
}

/// Session lifetimes and store deadlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_MINUTES * 60),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_DAYS * 24 * 60 * 60),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit_per_minute: u32,
    pub burst: u32,
    /// Idle time after which a bucket is forgotten; also the sweep interval.
    pub retention: Duration,
    /// Header set by a trusted reverse proxy with the real client address.
    pub trusted_proxy_header: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            burst: DEFAULT_RATE_LIMIT_BURST,
            retention: DEFAULT_RATE_LIMIT_RETENTION,
            trusted_proxy_header: None,
        }
    }
}

impl RateLimitConfig {
    /// Apply the floor rules: a non-positive limit falls back to the default,
    /// burst is at least 1, and a zero retention falls back to ten minutes.
    pub fn clamped(limit_per_minute: i64, burst: i64, retention_secs: u64) -> Self {
        let limit_per_minute = if limit_per_minute <= 0 {
            DEFAULT_RATE_LIMIT_PER_MINUTE
        } else {
            u32::try_from(limit_per_minute).unwrap_or(u32::MAX)
        };
        let burst = u32::try_from(burst.max(1)).unwrap_or(u32::MAX);
        let retention = if retention_secs == 0 {
            DEFAULT_RATE_LIMIT_RETENTION
        } else {
            Duration::from_secs(retention_secs)
        };

        Self {
            limit_per_minute,
            burst,
            retention,
            trusted_proxy_header: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http_port: u16,
    /// `host:port` of Redis. `None` runs on the in-memory store.
    pub redis_addr: Option<String>,
    /// Postgres URL of the identity tables. `None` runs on an empty in-memory
    /// directory.
    pub database_url: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let http_port = parse_or(&get, "HTTP_PORT", DEFAULT_HTTP_PORT)?;

        let auth = AuthConfig {
            access_ttl: duration_ms(
                "ACCESS_TTL_MINUTES",
                positive(&get, "ACCESS_TTL_MINUTES", DEFAULT_ACCESS_TTL_MINUTES)?,
                MS_PER_MINUTE,
            )?,
            refresh_ttl: duration_ms(
                "REFRESH_TTL_DAYS",
                positive(&get, "REFRESH_TTL_DAYS", DEFAULT_REFRESH_TTL_DAYS)?,
                MS_PER_DAY,
            )?,
            store_timeout: duration_ms(
                "STORE_TIMEOUT_MS",
                positive(&get, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?,
                1,
            )?,
        };

        let retention_secs = parse_or(
            &get,
            "RATE_LIMIT_RETENTION_SECS",
            DEFAULT_RATE_LIMIT_RETENTION.as_secs(),
        )?;
        duration_ms("RATE_LIMIT_RETENTION_SECS", retention_secs, 1000)?;

        let mut rate_limit = RateLimitConfig::clamped(
            parse_or(&get, "RATE_LIMIT_PER_MINUTE", i64::from(DEFAULT_RATE_LIMIT_PER_MINUTE))?,
            parse_or(&get, "RATE_LIMIT_BURST", i64::from(DEFAULT_RATE_LIMIT_BURST))?,
            retention_secs,
        );
        rate_limit.trusted_proxy_header = get("TRUSTED_PROXY_HEADER");

        Ok(Self {
            http_port,
            redis_addr: get("REDIS_ADDR"),
            database_url: get("DATABASE_URL"),
            private_key_path: get("JWT_PRIVATE_KEY_PATH").map(PathBuf::from),
            public_key_path: get("JWT_PUBLIC_KEY_PATH").map(PathBuf::from),
            auth,
            rate_limit,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn positive<G>(get: &G, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_or(get, var, default)? {
        0 => Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        }),
        v => Ok(v),
    }
}

/// `value * unit_ms` milliseconds, rejected above [`MAX_CONFIGURED_DURATION`].
fn duration_ms(var: &'static str, value: u64, unit_ms: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .filter(|d| *d <= MAX_CONFIGURED_DURATION)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            reason: format!("{value} is out of range"),
        })
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the configured PEM keys. At least one of the two must be set.
pub fn load_key_material(config: &AppConfig) -> Result<KeyMaterial, ConfigError> {
    let private = config.private_key_path.as_deref().map(read_pem).transpose()?;
    let public = config.public_key_path.as_deref().map(read_pem).transpose()?;
    Ok(KeyMaterial::from_pem(private.as_deref(), public.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .join(name)
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.redis_addr, None);
        assert_eq!(cfg.auth, AuthConfig::default());
        assert_eq!(cfg.auth.access_ttl, Duration::from_secs(900));
        assert_eq!(cfg.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn values_are_read_and_blank_means_unset() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("HTTP_PORT", "9000"),
            ("REDIS_ADDR", "cache:6379"),
            ("DATABASE_URL", "  "),
            ("ACCESS_TTL_MINUTES", "5"),
            ("REFRESH_TTL_DAYS", "1"),
            ("RATE_LIMIT_PER_MINUTE", "120"),
            ("TRUSTED_PROXY_HEADER", "X-Real-IP"),
        ]))
        .unwrap();

        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.redis_addr.as_deref(), Some("cache:6379"));
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.auth.access_ttl, Duration::from_secs(300));
        assert_eq!(cfg.auth.refresh_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.rate_limit.limit_per_minute, 120);
        assert_eq!(cfg.rate_limit.trusted_proxy_header.as_deref(), Some("X-Real-IP"));
    }

    #[test]
    fn garbage_numbers_fail_fast() {
        let err = AppConfig::from_lookup(lookup(&[("ACCESS_TTL_MINUTES", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ACCESS_TTL_MINUTES", .. }));

        let err = AppConfig::from_lookup(lookup(&[("STORE_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STORE_TIMEOUT_MS", .. }));
    }

    #[test]
    fn absurd_durations_are_rejected_not_wrapped() {
        for (var, raw) in [
            ("ACCESS_TTL_MINUTES", "307445734561825861"),
            ("REFRESH_TTL_DAYS", "213503982334601"),
            ("REFRESH_TTL_DAYS", "36501"),
            ("STORE_TIMEOUT_MS", "18446744073709551615"),
            ("RATE_LIMIT_RETENTION_SECS", "18446744073709551615"),
        ] {
            let err = AppConfig::from_lookup(lookup(&[(var, raw)])).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { var: v, .. } if *v == var),
                "{var}={raw}: {err}"
            );
        }

        let cfg = AppConfig::from_lookup(lookup(&[("REFRESH_TTL_DAYS", "36500")])).unwrap();
        assert_eq!(cfg.auth.refresh_ttl, Duration::from_secs(36_500 * 86_400));
    }

    #[test]
    fn limiter_values_are_clamped() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("RATE_LIMIT_PER_MINUTE", "-5"),
            ("RATE_LIMIT_BURST", "0"),
            ("RATE_LIMIT_RETENTION_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(cfg.rate_limit.limit_per_minute, 60);
        assert_eq!(cfg.rate_limit.burst, 1);
        assert_eq!(cfg.rate_limit.retention, Duration::from_secs(600));
    }

    #[test]
    fn key_material_needs_at_least_one_key() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(
            load_key_material(&cfg),
            Err(ConfigError::Keys(KeyMaterialError::Missing))
        ));
    }

    #[test]
    fn key_material_loads_from_files() {
        let mut cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        cfg.public_key_path = Some(fixture("jwt_public.pem"));

        let keys = load_key_material(&cfg).unwrap();
        assert!(keys.can_verify());
        assert!(!keys.can_sign());

        cfg.private_key_path = Some(fixture("does_not_exist.pem"));
        assert!(matches!(load_key_material(&cfg), Err(ConfigError::KeyFile { .. })));
    }
}
