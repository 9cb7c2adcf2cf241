use std::{env, time::Duration};

use crate::wait::Backoff;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Endpoint override for a local or proxied service (default: none)
    pub endpoint_url: Option<String>,
    /// Upper bound for lifecycle waits in seconds (default: 120)
    pub wait_timeout_secs: u64,
    /// First polling delay in milliseconds (default: 500)
    pub poll_initial_ms: u64,
    /// Largest polling delay in milliseconds (default: 5,000)
    pub poll_max_ms: u64,
    /// How many times the batch loader resubmits unprocessed requests (default: 5)
    pub batch_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_ENDPOINT_URL` - Endpoint override (default: unset)
    /// - `KEYTABLE_WAIT_TIMEOUT_SECS` - Lifecycle wait bound (default: 120)
    /// - `KEYTABLE_POLL_INITIAL_MS` - First polling delay (default: 500)
    /// - `KEYTABLE_POLL_MAX_MS` - Polling delay cap (default: 5,000)
    /// - `KEYTABLE_BATCH_RETRIES` - Batch resubmissions (default: 5)
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            wait_timeout_secs: env::var("KEYTABLE_WAIT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            poll_initial_ms: env::var("KEYTABLE_POLL_INITIAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            poll_max_ms: env::var("KEYTABLE_POLL_MAX_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            batch_retries: env::var("KEYTABLE_BATCH_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// Lifecycle wait bound as a Duration.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Polling schedule for waits and batch retries.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.poll_initial_ms),
            Duration::from_millis(self.poll_max_ms.max(self.poll_initial_ms)),
        )
    }

    /// Client settings for a region.
    pub fn aws(&self, region: &str) -> AwsConfig {
        AwsConfig {
            endpoint_url: self.endpoint_url.clone(),
            region: region.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// AWS client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Custom endpoint URL (for a local service).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
}

impl AwsConfig {
    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("local endpoint ({url})"),
            None => format!("AWS (region: {})", self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            endpoint_url: None,
            wait_timeout_secs: 30,
            poll_initial_ms: 250,
            poll_max_ms: 1_000,
            batch_retries: 3,
        }
    }

    #[test]
    fn test_duration_conversions() {
        let config = config();
        assert_eq!(config.wait_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.backoff(),
            Backoff::new(Duration::from_millis(250), Duration::from_secs(1))
        );
    }

    #[test]
    fn test_backoff_cap_never_below_initial() {
        let config = Config {
            poll_max_ms: 10,
            ..config()
        };
        assert_eq!(config.backoff().max, Duration::from_millis(250));
    }

    #[test]
    fn test_aws_target_display() {
        let mut config = config();
        assert_eq!(config.aws("eu-west-1").target_display(), "AWS (region: eu-west-1)");
        config.endpoint_url = Some("http://localhost:8000".to_string());
        assert_eq!(
            config.aws("eu-west-1").target_display(),
            "local endpoint (http://localhost:8000)"
        );
    }

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        env::remove_var("AWS_ENDPOINT_URL");
        env::remove_var("KEYTABLE_WAIT_TIMEOUT_SECS");
        env::remove_var("KEYTABLE_POLL_INITIAL_MS");
        env::remove_var("KEYTABLE_POLL_MAX_MS");
        env::remove_var("KEYTABLE_BATCH_RETRIES");

        let config = Config::from_env();

        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.wait_timeout_secs, 120);
        assert_eq!(config.poll_initial_ms, 500);
        assert_eq!(config.poll_max_ms, 5_000);
        assert_eq!(config.batch_retries, 5);
    }
}
