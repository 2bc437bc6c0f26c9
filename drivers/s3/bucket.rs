//! rust-s3 后端实现

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::serde_types::Part;
use s3::Region;
use tokio_util::io::StreamReader;

use super::backend::{CompletedPart, ListPage, ObjectBackend};
use super::config::S3Config;
use crate::error::{StoreError, StoreResult};
use crate::storage::BlobReader;

const CONTENT_TYPE: &str = "application/octet-stream";

/// 基于 rust-s3 的后端
///
/// 持有一份配置好的 Bucket 模板，每次请求克隆出独立的客户端。
pub struct BucketBackend {
    bucket: Box<Bucket>,
}

impl BucketBackend {
    /// 根据配置创建后端（不发起网络请求）
    pub fn new(config: &S3Config) -> StoreResult<Self> {
        config.validate()?;

        let credentials = if config.access_key_id.is_empty() && config.secret_access_key.is_empty() {
            Credentials::anonymous()
        } else {
            Credentials::new(
                Some(&config.access_key_id),
                Some(&config.secret_access_key),
                if config.session_token.is_empty() { None } else { Some(&config.session_token) },
                None,
                None,
            )
        }
        .map_err(|e| StoreError::Config(format!("创建S3凭证失败: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StoreError::Config(format!("创建S3 Bucket失败: {}", e)))?;

        let bucket = if config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self { bucket })
    }

    fn client(&self) -> Box<Bucket> {
        self.bucket.clone()
    }

    /// 写请求客户端，带上ACL头
    fn write_client(&self, acl: Option<&str>) -> Box<Bucket> {
        let mut bucket = self.client();
        if let Some(acl) = acl {
            bucket.add_header("x-amz-acl", acl);
        }
        bucket
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl ObjectBackend for BucketBackend {
    fn bucket_name(&self) -> &str {
        &self.bucket.name
    }

    async fn get_object(&self, key: &str) -> StoreResult<BlobReader> {
        let response = self
            .client()
            .get_object_stream(key)
            .await
            .map_err(|e| StoreError::transport("get object", e))?;

        match response.status_code {
            status if is_success(status) => {}
            404 => return Err(StoreError::NotFound { key: key.to_string() }),
            status => return Err(StoreError::http("get object", status, String::new())),
        }

        let stream = response.bytes.map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn put_object(&self, key: &str, data: Bytes, acl: Option<&str>) -> StoreResult<()> {
        let response = self
            .write_client(acl)
            .put_object_with_content_type(key, &data, CONTENT_TYPE)
            .await
            .map_err(|e| StoreError::transport("put object", e))?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(StoreError::http(
                "put object",
                status,
                String::from_utf8_lossy(response.bytes()),
            ));
        }
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str, acl: Option<&str>) -> StoreResult<String> {
        let response = self
            .write_client(acl)
            .initiate_multipart_upload(key, CONTENT_TYPE)
            .await
            .map_err(|e| StoreError::transport("create multipart upload", e))?;
        Ok(response.upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StoreResult<CompletedPart> {
        // 分片已移交给这里，转换时复用同一块内存
        let part = self
            .client()
            .put_multipart_chunk(Vec::from(data), key, part_number, upload_id, CONTENT_TYPE)
            .await
            .map_err(|e| StoreError::transport("upload part", e))?;

        Ok(CompletedPart {
            part_number: part.part_number,
            etag: part.etag,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<()> {
        let parts = parts
            .into_iter()
            .map(|p| Part { part_number: p.part_number, etag: p.etag })
            .collect();

        let response = self
            .client()
            .complete_multipart_upload(key, upload_id, parts)
            .await
            .map_err(|e| StoreError::transport("complete multipart upload", e))?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(StoreError::http(
                "complete multipart upload",
                status,
                String::from_utf8_lossy(response.bytes()),
            ));
        }
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.client()
            .abort_upload(key, upload_id)
            .await
            .map_err(|e| StoreError::transport("abort multipart upload", e))
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        let response = self
            .client()
            .delete_object(key)
            .await
            .map_err(|e| StoreError::transport("delete object", e))?;

        let status = response.status_code();
        if is_success(status) || status == 404 {
            return Ok(());
        }
        Err(StoreError::http(
            "delete object",
            status,
            String::from_utf8_lossy(response.bytes()),
        ))
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: usize,
    ) -> StoreResult<ListPage> {
        let (result, status) = self
            .client()
            .list_page(prefix.to_string(), None, continuation_token, None, Some(max_keys))
            .await
            .map_err(|e| StoreError::transport("list objects", e))?;

        if !is_success(status) {
            return Err(StoreError::http("list objects", status, String::new()));
        }

        Ok(ListPage {
            keys: result.contents.into_iter().map(|obj| obj.key).collect(),
            is_truncated: result.is_truncated,
            next_continuation_token: result.next_continuation_token,
        })
    }

    async fn presign_get(&self, key: &str, expire_secs: u32) -> StoreResult<String> {
        self.client()
            .presign_get(key, expire_secs, None)
            .await
            .map_err(|e| StoreError::Signing { key: key.to_string(), source: e.into() })
    }

    async fn presign_put(&self, key: &str, expire_secs: u32) -> StoreResult<String> {
        self.client()
            .presign_put(key, expire_secs, None, None)
            .await
            .map_err(|e| StoreError::Signing { key: key.to_string(), source: e.into() })
    }

    async fn check_bucket(&self) -> StoreResult<()> {
        let bucket = self.bucket_name().to_string();
        match self.list_page("", None, 1).await {
            Ok(_) => Ok(()),
            Err(e) => Err(StoreError::Connectivity { bucket, source: e.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            bucket: "logs".to_string(),
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key_id: "minio".to_string(),
            secret_access_key: "minio123".to_string(),
            force_path_style: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_missing_bucket() {
        let config = S3Config { bucket: String::new(), ..config() };
        assert!(matches!(BucketBackend::new(&config), Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_presign_get_url() {
        let backend = BucketBackend::new(&config()).unwrap();
        let link = backend.presign_get("ci/job/1", 600).await.unwrap();

        let url = url::Url::parse(&link).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.path(), "/logs/ci/job/1");
        let expires = url
            .query_pairs()
            .find(|(k, _)| k == "X-Amz-Expires")
            .map(|(_, v)| v.into_owned());
        assert_eq!(expires.as_deref(), Some("600"));
        assert!(url.query_pairs().any(|(k, _)| k == "X-Amz-Signature"));
    }

    #[tokio::test]
    async fn test_presign_put_url() {
        let backend = BucketBackend::new(&config()).unwrap();
        let link = backend.presign_put("ci/job/1", 3600).await.unwrap();

        let url = url::Url::parse(&link).unwrap();
        assert_eq!(url.path(), "/logs/ci/job/1");
        assert!(url.query_pairs().any(|(k, v)| k == "X-Amz-Expires" && v == "3600"));
    }

    #[tokio::test]
    async fn test_check_bucket_unreachable() {
        let config = S3Config { endpoint: "http://127.0.0.1:1".to_string(), ..config() };
        let backend = BucketBackend::new(&config).unwrap();

        match backend.check_bucket().await {
            Err(StoreError::Connectivity { bucket, .. }) => assert_eq!(bucket, "logs"),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
