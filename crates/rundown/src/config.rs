//! Manager configuration.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a [`Manager`](crate::Manager).
///
/// Both deadlines are off by default. When set, every acquire/release
/// action passed to `add` is implicitly bounded by the corresponding
/// duration; expiry surfaces as a timeout error distinct from the
/// action's own failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManagerConfig {
    /// Deadline applied to every acquire action.
    #[cfg_attr(feature = "serde", serde(default))]
    pub acquire_timeout: Option<Duration>,
    /// Deadline applied to every release action.
    #[cfg_attr(feature = "serde", serde(default))]
    pub release_timeout: Option<Duration>,
}

impl ManagerConfig {
    /// Validate the configuration, returning an error if invalid.
    ///
    /// # Errors
    /// Returns a configuration error if a deadline is set to zero.
    pub fn validate(&self) -> Result<()> {
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "acquire_timeout must be greater than zero",
            ));
        }
        if self.release_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "release_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn default_has_no_deadlines() {
        let config = ManagerConfig::default();
        assert_eq!(config.acquire_timeout, None);
        assert_eq!(config.release_timeout, None);
        config.validate().expect("default config is valid");
    }

    #[test]
    fn zero_deadline_rejected() {
        let config = ManagerConfig {
            acquire_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let err = config.validate().expect_err("zero deadline is invalid");
        assert!(matches!(err.kind(), ErrorKind::Configuration { .. }));

        let config = ManagerConfig {
            release_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nonzero_deadlines_accepted() {
        let config = ManagerConfig {
            acquire_timeout: Some(Duration::from_secs(5)),
            release_timeout: Some(Duration::from_secs(30)),
        };
        config.validate().expect("config is valid");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let config = ManagerConfig {
            acquire_timeout: Some(Duration::from_millis(1500)),
            release_timeout: None,
        };
        let json = serde_json::to_string(&config).expect("serializes");
        let back: ManagerConfig = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_default_to_none() {
        let config: ManagerConfig = serde_json::from_str("{}").expect("deserializes");
        assert_eq!(config, ManagerConfig::default());
    }
}
