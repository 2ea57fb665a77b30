//! Hub configuration.
//!
//! Values come from defaults, a JSON document, or `SLOTCAST_*` environment
//! variables. Unknown or malformed environment values fall back to the
//! default and are logged.

use serde::{Deserialize, Serialize};

/// Environment variable toggling subscriber failure logging.
pub const ENV_LOG_SUBSCRIBER_FAILURES: &str = "SLOTCAST_LOG_SUBSCRIBER_FAILURES";

/// Environment variable overriding [`HubConfig::pending_warn_threshold`].
pub const ENV_PENDING_WARN_THRESHOLD: &str = "SLOTCAST_PENDING_WARN_THRESHOLD";

/// Behaviour shared by every slot created through a [`Hub`](crate::Hub).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Log each failing subscriber at `error` level as it happens.
    pub log_subscriber_failures: bool,
    /// Pending-queue depth at which a warning is logged. 0 disables the check.
    ///
    /// The queue only grows while subscribers publish reentrantly, so reaching
    /// this depth usually means a feedback loop between subscribers.
    pub pending_warn_threshold: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            log_subscriber_failures: true,
            pending_warn_threshold: 1024,
        }
    }
}

impl HubConfig {
    /// Defaults overridden by any `SLOTCAST_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_LOG_SUBSCRIBER_FAILURES) {
            match parse_flag(&raw) {
                Some(flag) => config.log_subscriber_failures = flag,
                None => log::warn!(
                    "[HubConfig] Ignoring {ENV_LOG_SUBSCRIBER_FAILURES}={raw:?}: expected a boolean"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_PENDING_WARN_THRESHOLD) {
            match raw.trim().parse::<usize>() {
                Ok(threshold) => config.pending_warn_threshold = threshold,
                Err(e) => log::warn!(
                    "[HubConfig] Ignoring {ENV_PENDING_WARN_THRESHOLD}={raw:?}: {e}"
                ),
            }
        }

        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert!(config.log_subscriber_failures);
        assert_eq!(config.pending_warn_threshold, 1024);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = HubConfig::from_lookup(lookup_from(&[
            (ENV_LOG_SUBSCRIBER_FAILURES, "off"),
            (ENV_PENDING_WARN_THRESHOLD, " 16 "),
        ]));
        assert!(!config.log_subscriber_failures);
        assert_eq!(config.pending_warn_threshold, 16);
    }

    #[test]
    fn test_from_lookup_ignores_malformed_values() {
        let config = HubConfig::from_lookup(lookup_from(&[
            (ENV_LOG_SUBSCRIBER_FAILURES, "maybe"),
            (ENV_PENDING_WARN_THRESHOLD, "-3"),
        ]));
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config = HubConfig::from_json(r#"{"pending_warn_threshold": 0}"#).unwrap();
        assert_eq!(config.pending_warn_threshold, 0);
        assert!(config.log_subscriber_failures);
    }
}
