//! # Unified Configuration System
//!
//! All configuration structures of the engine live here. Every field has a
//! serde default, so partial TOML/RON files load and fill in the rest.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: logging and tick pacing
//! - **Sound Config**: backend creation flags and the retry policy applied
//!   when the backend refuses to create a sound
//! - **Application Config**: the top-level file applications load

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// # Retry Policy
///
/// Governs how often the sound system retries creating a backend sound after
/// the backend reported a failure. Delays are measured in ticks and double
/// after every failed attempt.
///
/// An unresolved attach target is not a failure and is retried every tick
/// regardless of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failures after which the sound is reported as failed and
    /// no longer retried (`None` = retry forever)
    pub max_attempts: Option<u32>,
    /// Ticks to wait after the first failure
    pub initial_backoff_ticks: u32,
    /// Upper bound for the doubling delay
    pub max_backoff_ticks: u32,
}

impl RetryPolicy {
    /// Retry on every tick, forever
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_backoff_ticks: 0,
            max_backoff_ticks: 0,
        }
    }

    /// Set the attempt budget
    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial and maximum backoff in ticks
    pub fn with_backoff(mut self, initial_ticks: u32, max_ticks: u32) -> Self {
        self.initial_backoff_ticks = initial_ticks;
        self.max_backoff_ticks = max_ticks;
        self
    }

    /// Delay before the next attempt once `failures` attempts have failed
    pub fn backoff_after(&self, failures: u32) -> u32 {
        if failures == 0 || self.initial_backoff_ticks == 0 {
            return 0;
        }
        let shift = (failures - 1).min(31);
        self.initial_backoff_ticks
            .saturating_mul(1_u32 << shift)
            .min(self.max_backoff_ticks.max(self.initial_backoff_ticks))
    }

    /// Whether `failures` consecutive failures exhaust the budget
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if self.max_backoff_ticks < self.initial_backoff_ticks {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ticks must not be smaller than retry.initial_backoff_ticks".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(8),
            initial_backoff_ticks: 1,
            max_backoff_ticks: 32,
        }
    }
}

/// # Sound Configuration
///
/// Flags passed to the backend whenever a sound is created, plus the retry
/// policy for failed creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Stream sound files instead of decoding them up front
    pub stream: bool,
    /// Prebuffer streamed sounds on creation
    pub prebuffer: bool,
    /// Retry policy for failed creations
    pub retry: RetryPolicy,
}

impl SoundConfig {
    /// Create a new sound configuration
    pub fn new() -> Self {
        Self {
            stream: true,
            prebuffer: true,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set streaming flags
    pub fn with_streaming(mut self, stream: bool, prebuffer: bool) -> Self {
        self.stream = stream;
        self.prebuffer = prebuffer;
        self
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Engine Configuration
///
/// Core engine behavior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter (`RUST_LOG` still wins)
    pub log_level: String,
    /// Tick rate the demo loop paces itself to
    pub tick_rate_hz: u32,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            tick_rate_hz: 60,
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Sound system configuration
    pub sound: SoundConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("engine.tick_rate_hz must be at least 1".to_string()));
        }
        self.sound.retry.validate()
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default().with_backoff(2, 10);
        assert_eq!(policy.backoff_after(0), 0);
        assert_eq!(policy.backoff_after(1), 2);
        assert_eq!(policy.backoff_after(2), 4);
        assert_eq!(policy.backoff_after(3), 8);
        assert_eq!(policy.backoff_after(4), 10);
        assert_eq!(policy.backoff_after(40), 10);
    }

    #[test]
    fn test_unbounded_policy_never_exhausts() {
        let policy = RetryPolicy::unbounded();
        assert_eq!(policy.backoff_after(5), 0);
        assert!(!policy.is_exhausted(u32::MAX));
        assert!(RetryPolicy::default().is_exhausted(8));
        assert!(!RetryPolicy::default().is_exhausted(7));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ApplicationConfig::from_toml_str(
            r#"
            [sound.retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.sound.retry.max_attempts, Some(3));
        assert_eq!(config.sound.retry.initial_backoff_ticks, 1);
        assert!(config.sound.stream);
        assert_eq!(config.engine.log_level, "info");
    }

    #[test]
    fn test_ron_config() {
        let config = ApplicationConfig::from_ron_str(
            "(engine: (log_level: \"debug\"), sound: (stream: false))",
        )
        .unwrap();

        assert_eq!(config.engine.log_level, "debug");
        assert!(!config.sound.stream);
        assert!(config.sound.prebuffer);
    }

    #[test]
    fn test_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.sound.retry = RetryPolicy::default().with_backoff(8, 2);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.sound.retry = RetryPolicy::default().with_max_attempts(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("sound_engine_config_{}.toml", std::process::id()));
        let config = ApplicationConfig {
            engine: EngineConfig::new().with_log_level("warn"),
            sound: SoundConfig::new().with_streaming(false, false),
        };

        config.save_to_file(&path).unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ApplicationConfig::default().save_to_file("settings.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
