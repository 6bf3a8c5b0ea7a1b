//! API configuration.

use std::str::FromStr;
use std::time::Duration;

use vamos_worker::StreamOptions;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Allowed origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Largest accepted request body in bytes
    pub max_body_size: usize,
    /// Progress stream fallback poll interval
    pub stream_poll_interval: Duration,
    /// Smallest progress change a stream emits
    pub stream_min_delta: f64,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 64 * 1024, // 64KB
            stream_poll_interval: Duration::from_millis(300),
            stream_min_delta: 0.1,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Overlay `API_HOST`, `API_PORT`, `CORS_ORIGINS`, `MAX_BODY_SIZE`,
    /// `STREAM_POLL_MS`, `STREAM_MIN_DELTA` and `METRICS_ENABLED` on the
    /// defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: env_parsed("API_HOST").unwrap_or(d.host),
            port: env_parsed("API_PORT").unwrap_or(d.port),
            cors_origins: env_parsed::<String>("CORS_ORIGINS")
                .map(|list| split_origins(&list))
                .unwrap_or(d.cors_origins),
            max_body_size: env_parsed("MAX_BODY_SIZE").unwrap_or(d.max_body_size),
            stream_poll_interval: env_parsed::<u64>("STREAM_POLL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(d.stream_poll_interval),
            stream_min_delta: env_parsed::<f64>("STREAM_MIN_DELTA")
                .filter(|delta| *delta >= 0.0)
                .unwrap_or(d.stream_min_delta),
            metrics_enabled: env_parsed::<String>("METRICS_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true"))
                .unwrap_or(d.metrics_enabled),
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            poll_interval: self.stream_poll_interval,
            min_delta: self.stream_min_delta,
        }
    }
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*"]);

        let options = config.stream_options();
        assert_eq!(options.poll_interval, Duration::from_millis(300));
        assert_eq!(options.min_delta, 0.1);
    }

    #[test]
    fn test_split_origins() {
        assert_eq!(
            split_origins("https://a.example, https://b.example,,"),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
