use std::str::FromStr;
use std::time::Duration;

/// Per-connection limits. Every read is bounded by `read_timeout`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub read_timeout: Duration,
    pub max_line_length: usize,
    pub max_body_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            max_line_length: 64 * 1024,
            max_body_size: 8 * 1024 * 1024,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Defaults, overridden by `HTTP_READ_TIMEOUT_SECS`, `HTTP_MAX_LINE_LENGTH`
    /// and `HTTP_MAX_BODY_SIZE` when set and parseable.
    pub fn from_env() -> Self {
        let default = Self::default();
        let read_timeout = env_or("HTTP_READ_TIMEOUT_SECS", default.read_timeout.as_secs_f64());

        Self {
            read_timeout: Duration::try_from_secs_f64(read_timeout).unwrap_or(default.read_timeout),
            max_line_length: env_or("HTTP_MAX_LINE_LENGTH", default.max_line_length),
            max_body_size: env_or("HTTP_MAX_BODY_SIZE", default.max_body_size),
        }
    }
}
