use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // HTTP source
    pub http_user_agent: &'static str,
    pub http_connect_timeout_ms: u64,
    pub http_read_timeout_ms: u64,

    // Decoder
    pub max_consecutive_decode_errors: u32,
}

impl Config {
    /// Build the configuration from the environment variables set at compile
    /// time by `build.rs` from `config.toml`.
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            http_user_agent: env!("HTTP_USER_AGENT"),
            http_connect_timeout_ms: env!("HTTP_CONNECT_TIMEOUT_MS")
                .parse()
                .map_err(|_| "Failed to parse HTTP_CONNECT_TIMEOUT_MS")?,
            http_read_timeout_ms: env!("HTTP_READ_TIMEOUT_MS")
                .parse()
                .map_err(|_| "Failed to parse HTTP_READ_TIMEOUT_MS")?,

            max_consecutive_decode_errors: env!("DECODER_MAX_CONSECUTIVE_DECODE_ERRORS")
                .parse()
                .map_err(|_| "Failed to parse DECODER_MAX_CONSECUTIVE_DECODE_ERRORS")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().unwrap_or(Self {
            app_name: "ffsd",
            app_version: "0.0.0",
            http_user_agent: "ffsd",
            http_connect_timeout_ms: 10_000,
            http_read_timeout_ms: 30_000,
            max_consecutive_decode_errors: 16,
        })
    }
}

/// Per-stream knobs used when opening a locator.
///
/// Defaults come from [`Config`]; the builder methods override single values.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// `User-Agent` header sent with HTTP(S) requests.
    pub user_agent: String,
    /// Connect timeout for HTTP(S) sources. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Read timeout for HTTP(S) sources. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Corrupt packets skipped in a row before decoding fails.
    pub max_consecutive_decode_errors: u32,
}

fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

impl From<&Config> for DecoderOptions {
    fn from(config: &Config) -> Self {
        Self {
            user_agent: config.http_user_agent.to_string(),
            connect_timeout: millis(config.http_connect_timeout_ms),
            read_timeout: millis(config.http_read_timeout_ms),
            max_consecutive_decode_errors: config.max_consecutive_decode_errors,
        }
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl DecoderOptions {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_consecutive_decode_errors(mut self, count: u32) -> Self {
        self.max_consecutive_decode_errors = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_time_config_parses() {
        let config = Config::new().unwrap();
        assert!(!config.http_user_agent.is_empty());
        assert_eq!(config.app_name, "ffsd");
    }

    #[test]
    fn zero_timeout_means_none() {
        assert_eq!(millis(0), None);
        assert_eq!(millis(250), Some(Duration::from_millis(250)));
    }

    #[test]
    fn builder_overrides_defaults() {
        let options = DecoderOptions::default()
            .with_user_agent("probe")
            .with_read_timeout(None)
            .with_max_consecutive_decode_errors(2);
        assert_eq!(options.user_agent, "probe");
        assert_eq!(options.read_timeout, None);
        assert_eq!(options.max_consecutive_decode_errors, 2);
    }
}
