//! Client configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::reducer::DEFAULT_DIAGNOSTICS_CAPACITY;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use todosync_runtime::RetryPolicy;

/// Service URL used when `TODOSYNC_SERVICE_URL` is not set.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:2000";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the todo service
    pub service_url: String,
    /// Display name to log in with, if preset
    pub user: Option<String>,
    /// Delay before the first reconnect attempt, in milliseconds
    pub reconnect_initial_ms: u64,
    /// Upper bound for reconnect delays, in milliseconds
    pub reconnect_max_ms: u64,
    /// Growth factor between reconnect delays
    pub reconnect_multiplier: f64,
    /// Number of diagnostics kept per session
    pub diagnostics_capacity: usize,
    /// How long closing a session waits for in-flight commands, in milliseconds
    pub close_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            user: None,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 3000,
            reconnect_multiplier: 2.0,
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
            close_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_url: env::var("TODOSYNC_SERVICE_URL").unwrap_or(defaults.service_url),
            user: env::var("TODOSYNC_USER")
                .ok()
                .filter(|user| !user.trim().is_empty()),
            reconnect_initial_ms: env::var("TODOSYNC_RECONNECT_INITIAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reconnect_initial_ms),
            reconnect_max_ms: env::var("TODOSYNC_RECONNECT_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reconnect_max_ms),
            reconnect_multiplier: env::var("TODOSYNC_RECONNECT_MULTIPLIER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|m: &f64| m.is_finite() && *m >= 1.0)
                .unwrap_or(defaults.reconnect_multiplier),
            diagnostics_capacity: env::var("TODOSYNC_DIAGNOSTICS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.diagnostics_capacity),
            close_timeout_ms: env::var("TODOSYNC_CLOSE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.close_timeout_ms),
        }
    }

    /// Set the service URL.
    #[must_use]
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the reconnect backoff bounds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Reconnect delays are far below u64::MAX ms
    pub const fn with_reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial_ms = initial.as_millis() as u64;
        self.reconnect_max_ms = max.as_millis() as u64;
        self
    }

    /// Set the reconnect growth factor.
    #[must_use]
    pub const fn with_reconnect_multiplier(mut self, multiplier: f64) -> Self {
        self.reconnect_multiplier = multiplier;
        self
    }

    /// Set the number of diagnostics kept.
    #[must_use]
    pub const fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Set how long closing waits for in-flight commands.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Close timeouts are far below u64::MAX ms
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Close timeout as a [`Duration`].
    #[must_use]
    pub const fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Backoff policy for the event stream. Reconnects never give up.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .initial_delay(Duration::from_millis(self.reconnect_initial_ms))
            .max_delay(Duration::from_millis(self.reconnect_max_ms))
            .multiplier(self.reconnect_multiplier)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service() {
        let config = ClientConfig::default();
        assert_eq!(config.service_url, "http://localhost:2000");
        assert_eq!(config.user, None);
        assert_eq!(config.diagnostics_capacity, 50);
        assert_eq!(config.close_timeout(), Duration::from_secs(5));

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, None);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(3));
    }

    #[test]
    fn setters_override_defaults() {
        let config = ClientConfig::default()
            .with_service_url("http://todo.internal:8080")
            .with_user("ada")
            .with_reconnect(Duration::from_millis(10), Duration::from_millis(40))
            .with_reconnect_multiplier(3.0)
            .with_diagnostics_capacity(5)
            .with_close_timeout(Duration::from_millis(250));

        assert_eq!(config.user.as_deref(), Some("ada"));
        assert_eq!(config.diagnostics_capacity, 5);
        assert_eq!(config.close_timeout_ms, 250);

        let policy = config.retry_policy();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(30));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
    }
}
