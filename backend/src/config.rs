//! Application configuration loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::NormalizeContext;
use crate::outbound::persistence::PoolConfig;

/// Runtime settings for the repository service.
///
/// Values resolve from CLI arguments, then `CRM_`-prefixed environment
/// variables, then configuration files, then the defaults declared here.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CRM")]
pub struct AppSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Surface raw error details instead of redacted envelopes.
    #[ortho_config(default = false)]
    pub development_mode: bool,
    /// Maximum connections held by the pool.
    pub pool_max_size: Option<u32>,
    /// Minimum idle connections the pool maintains.
    pub pool_min_idle: Option<u32>,
    /// Pool checkout timeout in seconds.
    pub pool_connection_timeout_secs: Option<u64>,
}

impl AppSettings {
    /// Build a pool configuration when a database URL is present.
    #[must_use]
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self.database_url.as_deref()?;
        let mut config = PoolConfig::new(url);
        if let Some(max_size) = self.pool_max_size {
            config = config.with_max_size(max_size);
        }
        if let Some(min_idle) = self.pool_min_idle {
            config = config.with_min_idle(Some(min_idle));
        }
        if let Some(secs) = self.pool_connection_timeout_secs {
            config = config.with_connection_timeout(Duration::from_secs(secs));
        }
        Some(config)
    }

    /// Normalisation context matching the configured mode.
    #[must_use]
    pub fn normalize_context(&self) -> NormalizeContext {
        NormalizeContext::new(self.development_mode)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("crm-backend")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("CRM_DATABASE_URL", None::<String>),
            ("CRM_DEVELOPMENT_MODE", None::<String>),
            ("CRM_POOL_MAX_SIZE", None::<String>),
            ("CRM_POOL_MIN_IDLE", None::<String>),
            ("CRM_POOL_CONNECTION_TIMEOUT_SECS", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(!settings.development_mode);
        assert!(settings.database_url.is_none());
        assert!(settings.pool_config().is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "CRM_DATABASE_URL",
                Some("postgres://localhost/crm".to_owned()),
            ),
            ("CRM_DEVELOPMENT_MODE", Some("true".to_owned())),
            ("CRM_POOL_MAX_SIZE", Some("20".to_owned())),
            ("CRM_POOL_MIN_IDLE", None::<String>),
            ("CRM_POOL_CONNECTION_TIMEOUT_SECS", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.development_mode);
        assert!(settings.normalize_context().development_mode());
        let pool = settings.pool_config().expect("pool config should build");
        assert_eq!(pool.database_url(), "postgres://localhost/crm");
    }
}
