//! S3驱动核心实现
//!
//! 设计原则：
//! - 每个操作直接委托给对象存储后端，不做缓存和重试
//! - 所有调用点使用同一种键规范化（见 utils::join_key）
//! - 分片上传，每片32MB，内存只保留2片
//! - 支持预签名URL直链

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{ListPage, ObjectBackend};
use super::bucket::BucketBackend;
use super::config::S3Config;
use super::upload::{upload_stream, PART_SIZE};
use crate::error::{StoreError, StoreResult};
use crate::storage::{BlobReader, BlobSource, LogStore};
use crate::utils::join_key;

/// 按前缀删除时每页列出的对象数
const DELETE_PAGE_SIZE: usize = 1000;
/// 按前缀列出时每页最大对象数（S3上限）
const LIST_PAGE_SIZE: usize = 1000;
/// 预签名URL最长有效期（7天）
const MAX_LINK_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// S3日志存储
pub struct S3Store<B: ObjectBackend = BucketBackend> {
    backend: Arc<B>,
    prefix: String,
    acl: Option<String>,
}

impl S3Store<BucketBackend> {
    /// 根据配置创建S3日志存储
    pub fn new(config: &S3Config) -> StoreResult<Self> {
        let backend = BucketBackend::new(config)?;
        Ok(Self::with_backend(backend, &config.prefix).with_acl(&config.acl))
    }

    /// 从环境变量创建S3日志存储
    pub fn from_env() -> StoreResult<Self> {
        Self::new(&S3Config::from_env()?)
    }
}

impl<B: ObjectBackend> S3Store<B> {
    /// 使用已有后端创建存储
    pub fn with_backend(backend: B, prefix: &str) -> Self {
        Self {
            backend: Arc::new(backend),
            prefix: prefix.to_string(),
            acl: None,
        }
    }

    /// 设置写入ACL，空字符串表示不设置
    pub fn with_acl(mut self, acl: &str) -> Self {
        self.acl = if acl.is_empty() { None } else { Some(acl.to_string()) };
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bucket(&self) -> &str {
        self.backend.bucket_name()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 逻辑键对应的物理对象键
    pub fn physical_key(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }

    /// 单对象操作使用的键，不允许指向根
    fn object_key(&self, key: &str) -> StoreResult<String> {
        let object_key = self.physical_key(key);
        if object_key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(object_key)
    }

    /// 列出一页，失败时记录日志
    async fn list_objects(&self, prefix: &str, token: Option<String>, limit: usize) -> StoreResult<ListPage> {
        self.backend
            .list_page(prefix, token, limit)
            .await
            .inspect_err(|e| tracing::warn!("Failed to list objects: prefix={}, error={}", prefix, e))
    }
}

fn expiry_secs(expire: Duration) -> StoreResult<u32> {
    if expire.is_zero() || expire > MAX_LINK_EXPIRY {
        return Err(StoreError::InvalidExpiry(expire));
    }
    // 不足一秒的部分向上取整
    let secs = expire.as_secs() + u64::from(expire.subsec_nanos() > 0);
    Ok(secs.min(MAX_LINK_EXPIRY.as_secs()) as u32)
}

#[async_trait]
impl<B: ObjectBackend> LogStore for S3Store<B> {
    fn name(&self) -> &str {
        "S3"
    }

    async fn download(&self, key: &str) -> StoreResult<BlobReader> {
        let key = self.object_key(key)?;
        tracing::debug!("S3下载: bucket={}, key={}", self.bucket(), key);
        self.backend.get_object(&key).await
    }

    async fn download_link(&self, key: &str, expire: Duration) -> StoreResult<String> {
        let key = self.object_key(key)?;
        let secs = expiry_secs(expire)?;
        self.backend.presign_get(&key, secs).await
    }

    async fn upload(&self, key: &str, source: BlobSource<'_>) -> StoreResult<()> {
        let key = self.object_key(key)?;
        let size = upload_stream(self.backend.clone(), &key, source, self.acl.as_deref(), PART_SIZE).await?;
        tracing::debug!("S3上传完成: bucket={}, key={}, size={}", self.bucket(), key, size);
        Ok(())
    }

    async fn upload_link(&self, key: &str, expire: Duration) -> StoreResult<String> {
        let key = self.object_key(key)?;
        let secs = expiry_secs(expire)?;
        self.backend.presign_put(&key, secs).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = self.object_key(key)?;
        self.backend.delete_object(&key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let prefix = self.physical_key(key);
        let page = self.list_objects(&prefix, None, 1).await?;
        Ok(!page.keys.is_empty())
    }

    async fn delete_with_prefix(&self, key: &str) -> StoreResult<()> {
        let prefix = self.physical_key(key);
        loop {
            let page = self.list_objects(&prefix, None, DELETE_PAGE_SIZE).await?;
            if page.keys.is_empty() {
                tracing::info!("All objects deleted for prefix {}", prefix);
                return Ok(());
            }
            for object_key in &page.keys {
                self.backend
                    .delete_object(object_key)
                    .await
                    .inspect_err(|e| tracing::warn!("Failed to delete object: key={}, error={}", object_key, e))?;
            }
            tracing::info!("Deleted {} objects for prefix {}", page.keys.len(), prefix);
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.backend.check_bucket().await
    }

    async fn list_blob_prefix(&self, prefix: &str, limit: usize) -> StoreResult<Vec<String>> {
        // 前缀按物理键处理，不拼接存储前缀；limit 只是每页数量
        let prefix = prefix.trim_start_matches('/');
        let page_size = if limit == 0 { LIST_PAGE_SIZE } else { limit.min(LIST_PAGE_SIZE) };

        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = self.list_objects(prefix, token, page_size).await?;
            keys.extend(page.keys);

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }
}
