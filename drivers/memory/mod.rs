//! 内存对象存储后端
//!
//! 行为与S3保持一致：键按字典序列出、分页、分片上传、删除不存在的对象不报错。
//! 用于测试和本地开发，不持久化。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::ops::Bound;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::drivers::s3::{CompletedPart, ListPage, ObjectBackend, S3Store};
use crate::error::{StoreError, StoreResult};
use crate::storage::{BlobReader, LogStore, StoreFactory};

/// 已存储的对象
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub acl: Option<String>,
}

struct PendingUpload {
    key: String,
    acl: Option<String>,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    aborted_uploads: usize,
    list_calls: usize,
    failing_parts: HashSet<u32>,
    discard_on_part_failure: bool,
    fail_list_call: Option<usize>,
    unreachable: bool,
}

/// 内存后端
pub struct MemoryBackend {
    bucket: String,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// 读取对象（物理键）
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().objects.get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// 未完成的分片上传数
    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    pub fn aborted_uploads(&self) -> usize {
        self.state.lock().aborted_uploads
    }

    /// 已执行的列表请求数
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// 让指定分片号的上传失败
    pub fn fail_part(&self, part_number: u32) {
        self.state.lock().failing_parts.insert(part_number);
    }

    /// 分片失败时同时丢弃整个分片上传（rust-s3 客户端的行为）
    pub fn discard_on_part_failure(&self) {
        self.state.lock().discard_on_part_failure = true;
    }

    /// 让第 n 次（从1开始）列表请求失败
    pub fn fail_list_call(&self, n: usize) {
        self.state.lock().fail_list_call = Some(n);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    fn presign(&self, method: &str, key: &str, expire_secs: u32) -> StoreResult<String> {
        let mut url = Url::parse(&format!("memory://{}/", self.bucket)).map_err(|e| StoreError::Signing {
            key: key.to_string(),
            source: e.into(),
        })?;
        url.set_path(key);
        url.query_pairs_mut()
            .append_pair("X-Amz-Method", method)
            .append_pair("X-Amz-Expires", &expire_secs.to_string());
        Ok(url.to_string())
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> StoreResult<BlobReader> {
        let data = self
            .state
            .lock()
            .objects
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn put_object(&self, key: &str, data: Bytes, acl: Option<&str>) -> StoreResult<()> {
        self.state.lock().objects.insert(
            key.to_string(),
            StoredObject { data, acl: acl.map(str::to_string) },
        );
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str, acl: Option<&str>) -> StoreResult<String> {
        let mut state = self.state.lock();
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                acl: acl.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StoreResult<CompletedPart> {
        let mut state = self.state.lock();
        if state.failing_parts.contains(&part_number) {
            if state.discard_on_part_failure && state.uploads.remove(upload_id).is_some() {
                state.aborted_uploads += 1;
            }
            return Err(StoreError::http("upload part", 500, "InternalError"));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StoreError::http("upload part", 404, "NoSuchUpload"))?;
        upload.parts.insert(part_number, data);
        Ok(CompletedPart {
            part_number,
            etag: format!("\"{}-{}\"", upload_id, part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        let upload = match state.uploads.remove(upload_id) {
            Some(upload) if upload.key == key => upload,
            _ => return Err(StoreError::http("complete multipart upload", 404, "NoSuchUpload")),
        };

        let mut data = BytesMut::new();
        let mut last = 0;
        for part in &parts {
            if part.part_number <= last {
                return Err(StoreError::http("complete multipart upload", 400, "InvalidPartOrder"));
            }
            last = part.part_number;
            let chunk = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StoreError::http("complete multipart upload", 400, "InvalidPart"))?;
            data.extend_from_slice(chunk);
        }

        state.objects.insert(
            key.to_string(),
            StoredObject { data: data.freeze(), acl: upload.acl },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.uploads.remove(upload_id).is_none() {
            return Err(StoreError::http("abort multipart upload", 404, "NoSuchUpload"));
        }
        state.aborted_uploads += 1;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.state.lock().objects.remove(key);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: usize,
    ) -> StoreResult<ListPage> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if state.fail_list_call == Some(state.list_calls) {
            return Err(StoreError::transport("list objects", "connection reset by peer"));
        }

        let max_keys = if max_keys == 0 { 1000 } else { max_keys };
        let start = match continuation_token {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(prefix.to_string()),
        };

        let mut matching = state
            .objects
            .range((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(max_keys).cloned().collect();
        let is_truncated = matching.next().is_some();
        let next_continuation_token = if is_truncated { keys.last().cloned() } else { None };

        Ok(ListPage { keys, is_truncated, next_continuation_token })
    }

    async fn presign_get(&self, key: &str, expire_secs: u32) -> StoreResult<String> {
        self.presign("GET", key, expire_secs)
    }

    async fn presign_put(&self, key: &str, expire_secs: u32) -> StoreResult<String> {
        self.presign("PUT", key, expire_secs)
    }

    async fn check_bucket(&self) -> StoreResult<()> {
        if self.state.lock().unreachable {
            return Err(StoreError::Connectivity {
                bucket: self.bucket.clone(),
                source: "bucket unreachable".into(),
            });
        }
        Ok(())
    }
}

/// 内存驱动配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub acl: String,
}

fn default_bucket() -> String {
    "logs".to_string()
}

/// 内存驱动工厂
pub struct MemoryDriverFactory;

impl StoreFactory for MemoryDriverFactory {
    fn driver_type(&self) -> &'static str {
        "memory"
    }

    fn create_store(&self, config: Value) -> Result<Box<dyn LogStore>> {
        let config: MemoryConfig = serde_json::from_value(config)
            .map_err(|e| anyhow!("配置解析失败: {}", e))?;
        let store = S3Store::with_backend(MemoryBackend::new(&config.bucket), &config.prefix)
            .with_acl(&config.acl);
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn put(backend: &MemoryBackend, key: &str) {
        backend.put_object(key, Bytes::from_static(b"x"), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_page_pagination() {
        let backend = MemoryBackend::new("logs");
        for i in 0..5 {
            put(&backend, &format!("ci/{}", i)).await;
        }
        put(&backend, "cj/0").await;

        let first = backend.list_page("ci/", None, 2).await.unwrap();
        assert_eq!(first.keys, vec!["ci/0", "ci/1"]);
        assert!(first.is_truncated);

        let second = backend.list_page("ci/", first.next_continuation_token, 2).await.unwrap();
        assert_eq!(second.keys, vec!["ci/2", "ci/3"]);

        let third = backend.list_page("ci/", second.next_continuation_token, 2).await.unwrap();
        assert_eq!(third.keys, vec!["ci/4"]);
        assert!(!third.is_truncated);
        assert_eq!(third.next_continuation_token, None);
        assert_eq!(backend.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_multipart_rejects_unordered_parts() {
        let backend = MemoryBackend::new("logs");
        let id = backend.create_multipart_upload("a", None).await.unwrap();
        let p1 = backend.upload_part("a", &id, 1, Bytes::from_static(b"1")).await.unwrap();
        let p2 = backend.upload_part("a", &id, 2, Bytes::from_static(b"2")).await.unwrap();

        let err = backend.complete_multipart_upload("a", &id, vec![p2, p1]).await.unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 400, .. }));
        assert!(backend.object("a").is_none());
    }

    #[tokio::test]
    async fn test_factory_default_bucket() {
        let store = MemoryDriverFactory.create_store(serde_json::json!({})).unwrap();
        assert_eq!(store.name(), "S3");
        store.ping().await.unwrap();
    }
}
