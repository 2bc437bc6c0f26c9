use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use anyhow::{anyhow, Result};
use serde_json::Value;

use super::LogStore;

pub type StoreBox = Arc<Box<dyn LogStore>>;

/// Store factory trait / 存储工厂 trait
pub trait StoreFactory: Send + Sync {
    /// Driver type name / 驱动类型名称
    fn driver_type(&self) -> &'static str;

    /// Create store instance from driver options / 创建存储实例
    fn create_store(&self, config: Value) -> Result<Box<dyn LogStore>>;
}

/// Store manager (manages all store instances) / 存储管理器
#[derive(Clone, Default)]
pub struct StoreManager {
    stores: Arc<RwLock<HashMap<String, StoreBox>>>,
    factories: Arc<RwLock<HashMap<String, Arc<Box<dyn StoreFactory>>>>>,
    /// Store error status (id -> error message) / 存储错误状态
    store_errors: Arc<RwLock<HashMap<String, String>>>,
}

impl StoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register store factory / 注册存储工厂
    pub async fn register_factory(&self, factory: Box<dyn StoreFactory>) -> Result<()> {
        let driver_type = factory.driver_type().to_string();

        let mut factories = self.factories.write().await;
        factories.insert(driver_type.clone(), Arc::new(factory));

        tracing::info!("Store factory registered: {}", driver_type);
        Ok(())
    }

    /// Create store instance (verify with ping, record error on failure) / 创建存储实例
    pub async fn create_store(&self, id: &str, driver_type: &str, config: Value) -> Result<StoreBox> {
        let factory = {
            let factories = self.factories.read().await;
            factories
                .get(driver_type)
                .cloned()
                .ok_or_else(|| anyhow!("Store driver not found: {}", driver_type))?
        };

        let store: StoreBox = match factory.create_store(config) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                let error_msg = e.to_string();
                self.set_store_error(id, error_msg.clone()).await;
                tracing::error!("Store creation failed: {} ({}) - {}", id, driver_type, error_msg);
                return Err(e);
            }
        };

        // The store is kept even when it is not ready yet / 验证失败时仍保留实例
        let validation_result = store.ping().await;

        self.stores.write().await.insert(id.to_string(), store.clone());

        match validation_result {
            Ok(()) => {
                self.clear_store_error(id).await;
                tracing::info!("Store created and verified: {} ({})", id, driver_type);
            }
            Err(e) => {
                let error_msg = e.to_string();
                self.set_store_error(id, error_msg.clone()).await;
                tracing::warn!("Store created but readiness check failed: {} ({}) - {}", id, driver_type, error_msg);
            }
        }

        Ok(store)
    }

    /// Set store error status / 设置存储错误状态
    pub async fn set_store_error(&self, id: &str, error: String) {
        self.store_errors.write().await.insert(id.to_string(), error);
    }

    /// Clear store error status / 清除存储错误状态
    pub async fn clear_store_error(&self, id: &str) {
        self.store_errors.write().await.remove(id);
    }

    /// Get store error status / 获取存储错误状态
    pub async fn get_store_error(&self, id: &str) -> Option<String> {
        self.store_errors.read().await.get(id).cloned()
    }

    /// Get store instance / 获取存储实例
    pub async fn get_store(&self, id: &str) -> Option<StoreBox> {
        self.stores.read().await.get(id).cloned()
    }

    /// Remove store instance / 移除存储实例
    pub async fn remove_store(&self, id: &str) -> Result<()> {
        self.stores
            .write()
            .await
            .remove(id)
            .ok_or_else(|| anyhow!("Store not found: {}", id))?;
        self.clear_store_error(id).await;

        tracing::info!("Store removed: {}", id);
        Ok(())
    }

    /// List all store ids / 列出所有存储实例
    pub async fn list_stores(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stores.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// List all available driver types / 列出所有可用的驱动类型
    pub async fn list_driver_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().await.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers;
    use serde_json::json;

    async fn manager() -> StoreManager {
        let manager = StoreManager::new();
        drivers::register_all(&manager).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_register_all_driver_types() {
        let manager = manager().await;
        assert_eq!(manager.list_driver_types().await, vec!["memory", "s3"]);
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let manager = manager().await;
        let store = manager
            .create_store("ci", "memory", json!({ "bucket": "logs", "prefix": "ci" }))
            .await
            .unwrap();

        store.upload_bytes("job/1", bytes::Bytes::from_static(b"hello")).await.unwrap();
        assert!(store.exists("job/1").await.unwrap());
        assert_eq!(manager.get_store_error("ci").await, None);
        assert_eq!(manager.list_stores().await, vec!["ci"]);
    }

    #[tokio::test]
    async fn test_unknown_driver_type() {
        let manager = manager().await;
        let err = manager.create_store("x", "gcs", json!({})).await.err().unwrap();
        assert!(err.to_string().contains("gcs"));
        assert!(manager.get_store("x").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_records_error() {
        let manager = manager().await;
        let result = manager.create_store("broken", "s3", json!({ "prefix": "ci" })).await;
        assert!(result.is_err());
        assert!(manager.get_store_error("broken").await.is_some());
        assert!(manager.get_store("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_records_error() {
        let manager = manager().await;
        let store = manager
            .create_store(
                "offline",
                "s3",
                json!({
                    "bucket": "logs",
                    "endpoint": "http://127.0.0.1:1",
                    "access_key_id": "minio",
                    "secret_access_key": "minio123",
                    "force_path_style": true,
                }),
            )
            .await
            .unwrap();

        assert_eq!(store.name(), "S3");
        let error = manager.get_store_error("offline").await.unwrap();
        assert!(error.contains("logs"), "{error}");

        manager.remove_store("offline").await.unwrap();
        assert_eq!(manager.get_store_error("offline").await, None);
        assert!(manager.remove_store("offline").await.is_err());
    }
}
