//! Application settings read from the `reef` table of Rocket's figment.
//!
//! ```toml
//! [default.reef]
//! store_timeout_secs = 5
//! default_recent_limit = 50
//! max_recent_limit = 1000
//! ```
//!
//! Each key can also be set through the environment, e.g.
//! `ROCKET_REEF={store_timeout_secs=10}`.

use std::time::Duration;

use rocket::fairing::AdHoc;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReefConfig {
    /// Upper bound on a single store round trip before it is reported as
    /// unavailable.
    pub store_timeout_secs: u64,
    /// Row count used by the most-recent endpoint when `limit` is omitted.
    pub default_recent_limit: i64,
    /// Largest `limit` the most-recent endpoint accepts.
    pub max_recent_limit: i64,
}

impl Default for ReefConfig {
    fn default() -> Self {
        ReefConfig {
            store_timeout_secs: 5,
            default_recent_limit: 50,
            max_recent_limit: 1000,
        }
    }
}

impl ReefConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Resolves a client-supplied limit against the configured default and
    /// maximum.
    pub fn recent_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_recent_limit)
            .clamp(0, self.max_recent_limit)
    }
}

/// Extracts [`ReefConfig`] at ignition and places it in managed state.
///
/// A missing `reef` table falls back to defaults; a malformed one aborts
/// launch.
pub fn config_fairing() -> AdHoc {
    AdHoc::try_on_ignite("Reef Config", |rocket| async {
        let figment = rocket.figment();
        let config = if figment.contains("reef") {
            match figment.extract_inner::<ReefConfig>("reef") {
                Ok(config) => config,
                Err(e) => {
                    error!("Invalid [reef] configuration: {}", e);
                    return Err(rocket);
                }
            }
        } else {
            ReefConfig::default()
        };

        info!("Store timeout: {}s", config.store_timeout_secs);
        Ok(rocket.manage(config))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_limit_defaults_and_clamps() {
        let config = ReefConfig::default();
        assert_eq!(config.recent_limit(None), 50);
        assert_eq!(config.recent_limit(Some(10)), 10);
        assert_eq!(config.recent_limit(Some(5000)), 1000);
        assert_eq!(config.recent_limit(Some(-3)), 0);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        use rocket::figment::{Figment, providers::Serialized};

        let figment = Figment::from(Serialized::default("reef.store_timeout_secs", 9));
        let config: ReefConfig = figment.extract_inner("reef").unwrap();
        assert_eq!(config.store_timeout(), Duration::from_secs(9));
        assert_eq!(config.max_recent_limit, 1000);
    }
}
