//! Application configuration module / 应用配置模块
//!
//! Selects the log store driver and its options, loaded from a JSON file.
//! A missing file yields the default config (in-memory store) / 配置文件不存在时使用默认配置

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::storage::{StoreBox, StoreManager};

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log store configuration / 日志存储配置
    #[serde(default)]
    pub store: StoreConfig,
}

/// Log store configuration / 日志存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store instance id / 存储实例ID
    #[serde(default = "default_store_id")]
    pub id: String,
    /// Driver type: "s3" or "memory" / 驱动类型
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Driver specific options / 驱动配置项
    #[serde(default = "default_options")]
    pub options: Value,
}

fn default_store_id() -> String {
    "default".to_string()
}

fn default_driver() -> String {
    "memory".to_string()
}

fn default_options() -> Value {
    Value::Object(Default::default())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id: default_store_id(),
            driver: default_driver(),
            options: default_options(),
        }
    }
}

/// Load configuration from file, or default if not exists / 加载配置文件，不存在则使用默认配置
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::info!("Config file {:?} not found, using defaults", path);
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;

    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

/// Create the configured store through the manager / 根据配置创建存储实例
pub async fn build_store(config: &AppConfig, manager: &StoreManager) -> Result<StoreBox> {
    let store = &config.store;
    manager
        .create_store(&store.id, &store.driver, store.options.clone())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers;
    use crate::storage::LogStore;
    use serde_json::json;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.store.driver, "memory");
        assert_eq!(config.store.id, "default");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            store: StoreConfig {
                id: "logs".to_string(),
                driver: "s3".to_string(),
                options: json!({ "bucket": "logs", "prefix": "ci", "force_path_style": true }),
            },
        };
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.store.id, "logs");
        assert_eq!(loaded.store.driver, "s3");
        assert_eq!(loaded.store.options["prefix"], "ci");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[tokio::test]
    async fn test_build_store() {
        let manager = StoreManager::new();
        drivers::register_all(&manager).await.unwrap();

        let config: AppConfig = serde_json::from_value(json!({
            "store": { "driver": "memory", "options": { "prefix": "ci" } }
        }))
        .unwrap();

        let store = build_store(&config, &manager).await.unwrap();
        assert!(!store.exists("job/1").await.unwrap());
        assert!(manager.get_store("default").await.is_some());
    }
}
