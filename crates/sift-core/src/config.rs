//! Client configuration
//!
//! Defaults target the public service. Every field can be overridden in code,
//! deserialized with serde, or read from `SIFT_*` environment variables.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use siftstream_domain::StreamHashes;

use crate::{Error, Result};

/// Default streaming host
pub const DEFAULT_STREAM_HOST: &str = "stream.datasift.com/";

/// Default REST API host
pub const DEFAULT_API_HOST: &str = "api.datasift.com/";

/// Prefix shared by all configuration environment variables
pub const ENV_PREFIX: &str = "SIFT_";

/// Connection, framing and reconnect settings shared by consumers and the
/// API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Streaming host, with or without a trailing slash
    pub stream_host: String,
    /// REST API host and path prefix
    pub api_host: String,
    /// Use `https` for stream and API requests
    pub use_tls: bool,
    /// Upper bound on the connection handshake
    pub connect_timeout: Duration,
    /// How often a blocked read wakes up to check for a stop request
    pub read_poll_interval: Duration,
    /// Silence (no data, no heartbeats) after which the connection is
    /// considered dropped
    pub stall_timeout: Duration,
    /// Largest single frame accepted from the wire
    pub max_frame_size: usize,
    /// Reconnect backoff schedule
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            stream_host: DEFAULT_STREAM_HOST.to_string(),
            api_host: DEFAULT_API_HOST.to_string(),
            use_tls: true,
            connect_timeout: Duration::from_secs(30),
            read_poll_interval: Duration::from_secs(1),
            stall_timeout: Duration::from_secs(65),
            max_frame_size: 8 * 1024 * 1024, // 8MB
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load defaults overridden by `SIFT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load defaults overridden by values from `lookup`
    ///
    /// Keys are the full variable names, e.g. `SIFT_STREAM_HOST`. Durations
    /// are given in milliseconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(host) = get("STREAM_HOST") {
            config.stream_host = host;
        }
        if let Some(host) = get("API_HOST") {
            config.api_host = host;
        }
        if let Some(use_tls) = parse_var::<bool>("USE_TLS", get("USE_TLS"))? {
            config.use_tls = use_tls;
        }
        if let Some(ms) = parse_var::<u64>("CONNECT_TIMEOUT_MS", get("CONNECT_TIMEOUT_MS"))? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("READ_POLL_INTERVAL_MS", get("READ_POLL_INTERVAL_MS"))? {
            config.read_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("STALL_TIMEOUT_MS", get("STALL_TIMEOUT_MS"))? {
            config.stall_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize>("MAX_FRAME_SIZE", get("MAX_FRAME_SIZE"))? {
            config.max_frame_size = size;
        }
        if let Some(attempts) =
            parse_var::<u32>("MAX_RECONNECT_ATTEMPTS", get("MAX_RECONNECT_ATTEMPTS"))?
        {
            config.reconnect.max_attempts = Some(attempts);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the consumer loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.stream_host.trim().is_empty() {
            return Err(Error::config("stream_host must not be empty"));
        }
        if self.api_host.trim().is_empty() {
            return Err(Error::config("api_host must not be empty"));
        }
        if self.read_poll_interval.is_zero() {
            return Err(Error::config("read_poll_interval must be greater than zero"));
        }
        if self.stall_timeout < self.read_poll_interval {
            return Err(Error::config(
                "stall_timeout must not be shorter than read_poll_interval",
            ));
        }
        if self.max_frame_size == 0 {
            return Err(Error::config("max_frame_size must be greater than zero"));
        }
        Ok(())
    }

    /// URL scheme for stream and API requests
    pub fn scheme(&self) -> &'static str {
        if self.use_tls { "https" } else { "http" }
    }

    /// Full URL of the stream serving `hashes`
    pub fn stream_url(&self, hashes: &StreamHashes) -> String {
        format!(
            "{}://{}{}",
            self.scheme(),
            with_trailing_slash(&self.stream_host),
            hashes.stream_path()
        )
    }

    /// Full URL of a REST endpoint
    pub fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}://{}{}.json",
            self.scheme(),
            with_trailing_slash(&self.api_host),
            endpoint.trim_start_matches('/')
        )
    }
}

/// Backoff schedule applied between reconnect attempts
///
/// Transport failures (refused, reset, dropped) back off linearly; HTTP
/// rejections back off exponentially, since retrying them quickly only
/// repeats the rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Linear step for transport failures
    pub transport_step: Duration,
    /// Cap for transport failure delays
    pub transport_max: Duration,
    /// First delay after an HTTP rejection
    pub http_initial: Duration,
    /// Cap for HTTP rejection delays
    pub http_max: Duration,
    /// Give up after this many consecutive failed attempts (`None`: never)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            transport_step: Duration::from_millis(250),
            transport_max: Duration::from_secs(16),
            http_initial: Duration::from_secs(10),
            http_max: Duration::from_secs(320),
            max_attempts: None,
        }
    }
}

fn with_trailing_slash(host: &str) -> String {
    let host = host.trim();
    if host.ends_with('/') {
        host.to_string()
    } else {
        format!("{host}/")
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::config(format!("{ENV_PREFIX}{name}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheme(), "https");
    }

    #[test]
    fn test_stream_url_single_and_multi() {
        let config = ClientConfig::default();
        let single = StreamHashes::single("abc").unwrap();
        assert_eq!(config.stream_url(&single), "https://stream.datasift.com/abc");

        let multi = StreamHashes::new(["somehash", "someotherhash"]).unwrap();
        assert_eq!(
            config.stream_url(&multi),
            "https://stream.datasift.com/multi?hashes=somehash,someotherhash"
        );
    }

    #[test]
    fn test_host_without_trailing_slash() {
        let config = ClientConfig {
            stream_host: "localhost:8080".into(),
            use_tls: false,
            ..ClientConfig::default()
        };
        let hashes = StreamHashes::single("abc").unwrap();
        assert_eq!(config.stream_url(&hashes), "http://localhost:8080/abc");
    }

    #[test]
    fn test_api_url() {
        let config = ClientConfig::default();
        assert_eq!(
            config.api_url("compile"),
            "https://api.datasift.com/compile.json"
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SIFT_STREAM_HOST", "example.test/"),
            ("SIFT_USE_TLS", "false"),
            ("SIFT_CONNECT_TIMEOUT_MS", "1500"),
            ("SIFT_MAX_RECONNECT_ATTEMPTS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.stream_host, "example.test/");
        assert!(!config.use_tls);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.reconnect.max_attempts, Some(3));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ClientConfig::from_lookup(lookup(&[("SIFT_USE_TLS", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("SIFT_USE_TLS"));
    }

    #[test]
    fn test_validate_rejects_inverted_timeouts() {
        let config = ClientConfig {
            read_poll_interval: Duration::from_secs(10),
            stall_timeout: Duration::from_secs(1),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
