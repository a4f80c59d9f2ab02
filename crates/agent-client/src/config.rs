//! Agent client configuration
//!
//! All sections deserialize from TOML with per-field defaults, so a file
//! only needs the values it changes:
//!
//! ```toml
//! idle_timeout_ms = 600000
//!
//! [retry]
//! ack_timeout_ms = 8000
//!
//! [notification]
//! title_flash_interval_ms = 1000
//! ```

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Delivery policy for acknowledged commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Reconnect attempts, and emit attempts, before giving up
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base_delay_ms * 2^n`
    pub base_delay_ms: u64,
    /// How long to wait for an acknowledgement per emit
    pub ack_timeout_ms: u64,
    /// Add up to 25% random delay to each backoff
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            ack_timeout_ms: 5000,
            use_jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let mut delay_ms = self.base_delay_ms.saturating_mul(factor);
        if self.use_jitter && delay_ms > 0 {
            use rand::Rng;
            delay_ms += rand::thread_rng().gen_range(0..=delay_ms / 4);
        }
        Duration::from_millis(delay_ms)
    }
}

/// Incoming call alert settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Start of one ring to the start of the next
    pub ring_interval_ms: u64,
    /// Audible part of each ring; the rest of the interval is silence
    pub ring_duration_ms: u64,
    /// Dual-tone frequencies played together
    pub ring_frequencies_hz: Vec<f32>,
    pub ring_volume: f32,
    pub title_flash_interval_ms: u64,
    pub title_frames: Vec<String>,
    pub notification_title: String,
    pub notification_tag: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ring_interval_ms: 3000,
            ring_duration_ms: 1000,
            ring_frequencies_hz: vec![440.0, 480.0],
            ring_volume: 0.3,
            title_flash_interval_ms: 800,
            title_frames: vec!["📞 INCOMING CALL".to_string(), "🔔 ANSWER NOW".to_string()],
            notification_title: "📞 Incoming Call".to_string(),
            notification_tag: "incoming-call".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn ring_interval(&self) -> Duration {
        Duration::from_millis(self.ring_interval_ms)
    }

    pub fn ring_duration(&self) -> Duration {
        Duration::from_millis(self.ring_duration_ms)
    }

    pub fn title_flash_interval(&self) -> Duration {
        Duration::from_millis(self.title_flash_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub retry: RetryPolicy,
    pub notification: NotificationConfig,
    /// Go away automatically after this much inactivity
    pub idle_timeout_ms: u64,
    pub idle_detection_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            notification: NotificationConfig::default(),
            idle_timeout_ms: 5 * 60 * 1000,
            idle_detection_enabled: true,
        }
    }
}

impl ClientConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::invalid_configuration("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::invalid_configuration(path.display().to_string(), e.to_string())
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.retry.ack_timeout_ms == 0 {
            return Err(ClientError::invalid_configuration(
                "retry.ack_timeout_ms",
                "must be greater than zero",
            ));
        }
        let n = &self.notification;
        if n.ring_interval_ms == 0 || n.title_flash_interval_ms == 0 {
            return Err(ClientError::invalid_configuration(
                "notification",
                "intervals must be greater than zero",
            ));
        }
        if n.ring_duration_ms > n.ring_interval_ms {
            return Err(ClientError::invalid_configuration(
                "notification.ring_duration_ms",
                "ring cannot be longer than its interval",
            ));
        }
        if n.title_frames.is_empty() {
            return Err(ClientError::invalid_configuration(
                "notification.title_frames",
                "at least one frame is required",
            ));
        }
        if self.idle_detection_enabled && self.idle_timeout_ms == 0 {
            return Err(ClientError::invalid_configuration(
                "idle_timeout_ms",
                "must be greater than zero when idle detection is enabled",
            ));
        }
        Ok(())
    }
}
