use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration from "config.toml" in the current directory.
///
/// If the file doesn't exist, uses in-memory defaults.
pub fn init_config() {
    init_config_from(None);
}

/// Initialize the global configuration from an explicit path
///
/// Subsequent calls are no-ops: the first loaded configuration wins.
pub fn init_config_from(path: Option<&str>) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load(path)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_initialization_wins() {
        init_config();
        let first = get_config();

        // 已初始化后不会再读文件
        init_config_from(Some("missing-geotrace-config.toml"));
        assert!(Arc::ptr_eq(&first, &get_config()));
    }
}
