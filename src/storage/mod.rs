use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::error::StoreResult;

/// Readable blob stream returned by downloads / 下载返回的字节流
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Upload source, consumed in bounded chunks / 上传数据源（分片读取）
pub type BlobSource<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Log blob store interface / 日志存储接口
///
/// Keys are logical: every store scopes them under its own prefix.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Driver name / 驱动名称
    fn name(&self) -> &str;

    /// Open a stream over the blob stored at `key` / 打开对象读取流
    async fn download(&self, key: &str) -> StoreResult<BlobReader>;

    /// Pre-signed GET link valid for `expire` / 生成下载预签名链接
    async fn download_link(&self, key: &str, expire: Duration) -> StoreResult<String>;

    /// Store everything `source` yields under `key` / 上传数据流
    async fn upload(&self, key: &str, source: BlobSource<'_>) -> StoreResult<()>;

    /// Pre-signed PUT link valid for `expire` / 生成上传预签名链接
    async fn upload_link(&self, key: &str, expire: Duration) -> StoreResult<String>;

    /// Delete a single blob, succeeds when it is already gone / 删除单个对象
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Whether any blob is stored under `key` (prefix match) / 判断对象是否存在
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Delete every blob whose key starts with `key` / 按前缀删除
    async fn delete_with_prefix(&self, key: &str) -> StoreResult<()>;

    /// Readiness check / 就绪检查
    async fn ping(&self) -> StoreResult<()>;

    /// List every physical key under the physical `prefix`, fetching `limit` keys per page
    /// (0 or above 1000 = 1000) / 按物理前缀列出全部对象键，limit 为每页数量
    async fn list_blob_prefix(&self, prefix: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Upload an in-memory buffer / 上传内存数据
    async fn upload_bytes(&self, key: &str, data: Bytes) -> StoreResult<()> {
        let mut reader: &[u8] = &data;
        self.upload(key, &mut reader).await
    }
}

pub mod manager;

pub use manager::{StoreManager, StoreFactory, StoreBox};
