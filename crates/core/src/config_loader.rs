use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the deployment config file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

/// Prefix for environment overrides, e.g. `CROSSARB_TRADING__BUY_TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "CROSSARB_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering defaults, the TOML file, and environment variables.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the result fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "config file not found, using defaults and environment"
            );
        }
        Self::extract(Self::base().merge(Toml::file(path)))
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_default() -> Result<AppConfig> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from an in-memory TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn load_from_str(toml: &str) -> Result<AppConfig> {
        Self::extract(Self::base().merge(Toml::string(toml)))
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pair;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = ConfigLoader::load_from_str("").unwrap();
        assert_eq!(config.pairs.len(), 5);
        assert_eq!(config.trading.buy_timeout_ms, 8_000);
        assert_eq!(config.exchange.ws_url, "wss://ws.sfox.com/ws");
    }

    #[test]
    fn test_document_overrides_pairs_and_tunables() {
        let config = ConfigLoader::load_from_str(
            r#"
            [trading]
            poll_interval_ms = 250

            [[pairs]]
            pair = "ethusd"

            [pairs.limits]
            min_order_quantity = "0.01"
            max_order_quantity = "50"
            min_order_amount = "10"
            max_order_amount = "100"
            profit_threshold_bps = "20"
            fee_rate_bps = "10"
            "#,
        )
        .unwrap();

        assert_eq!(config.trading.poll_interval_ms, 250);
        assert_eq!(config.trading.buy_timeout_ms, 8_000);
        assert_eq!(config.pairs.len(), 1);

        let limits = config.limits_for(&Pair::new("eth", "usd")).unwrap();
        assert_eq!(limits.max_order_amount, dec!(100));
        assert_eq!(limits.fee_rate_bps, dec!(10));
    }

    #[test]
    fn test_invalid_document_fails_validation() {
        let result = ConfigLoader::load_from_str(
            r#"
            [trading]
            client_pool_size = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ConfigLoader::load("does/not/exist.toml").unwrap();
        assert_eq!(config.trading.client_pool_size, 20);
    }
}
