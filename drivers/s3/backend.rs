//! 对象存储后端原语
//!
//! S3Store 只依赖这里列出的原语，生产环境使用 rust-s3，测试使用内存实现。

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::storage::BlobReader;

/// 列表分页结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// 已上传的分片
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// 对象存储后端
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// 存储桶名称
    fn bucket_name(&self) -> &str;

    /// 流式读取对象，对象不存在时返回 NotFound
    async fn get_object(&self, key: &str) -> StoreResult<BlobReader>;

    /// 单次上传完整对象
    async fn put_object(&self, key: &str, data: Bytes, acl: Option<&str>) -> StoreResult<()>;

    /// 初始化分片上传，返回 upload_id
    async fn create_multipart_upload(&self, key: &str, acl: Option<&str>) -> StoreResult<String>;

    /// 上传单个分片
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StoreResult<CompletedPart>;

    /// 完成分片上传，parts 按分片号升序
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<()>;

    /// 取消分片上传，释放已上传的分片
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()>;

    /// 删除对象，对象不存在不算错误
    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    /// 列出一页对象键
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: usize,
    ) -> StoreResult<ListPage>;

    /// 生成GET预签名URL
    async fn presign_get(&self, key: &str, expire_secs: u32) -> StoreResult<String>;

    /// 生成PUT预签名URL
    async fn presign_put(&self, key: &str, expire_secs: u32) -> StoreResult<String>;

    /// 检查存储桶可访问
    async fn check_bucket(&self) -> StoreResult<()>;
}
