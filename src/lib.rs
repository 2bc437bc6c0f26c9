pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use drivers::s3::{S3Config, S3Store};
pub use error::{StoreError, StoreResult};
pub use storage::{BlobReader, BlobSource, LogStore, StoreManager};

/// Register all store drivers / 注册所有存储驱动
pub async fn register_store_drivers(manager: &storage::StoreManager) -> anyhow::Result<()> {
    drivers::register_all(manager).await
}
