use std::sync::{Arc, OnceLock};

use super::StaticConfig;

static CONFIG: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Falls back to defaults when `init_config` was never called, which keeps
/// library users and tests free of startup ordering concerns.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| Arc::new(StaticConfig::default()))
        .clone()
}

/// Initialize the global configuration
///
/// The first call wins; the configuration is immutable afterwards.
///
/// # Examples
/// ```no_run
/// use morphlink::config::{StaticConfig, init_config};
/// let config = StaticConfig::load("config.toml").unwrap();
/// init_config(config);
/// ```
pub fn init_config(config: StaticConfig) -> Arc<StaticConfig> {
    CONFIG.get_or_init(|| Arc::new(config)).clone()
}
