// Driver package / 驱动包
pub mod s3;
pub mod memory;

use crate::storage::StoreManager;

/// Register all drivers to StoreManager / 注册所有驱动
pub async fn register_all(manager: &StoreManager) -> anyhow::Result<()> {
    // Register S3 driver / 注册S3对象存储驱动
    manager.register_factory(Box::new(s3::S3DriverFactory)).await?;
    // Register in-memory driver (tests and local development) / 注册内存驱动
    manager.register_factory(Box::new(memory::MemoryDriverFactory)).await?;
    Ok(())
}
