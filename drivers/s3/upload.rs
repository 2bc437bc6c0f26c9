//! 分片上传
//!
//! - 每片32MB，内存最多保留2片（一片上传中，一片读取中）
//! - 数据源在第一片内结束时直接单次PUT
//! - 失败或被取消时取消分片上传，不留下可读对象

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::backend::{CompletedPart, ObjectBackend};
use crate::error::StoreResult;

pub const PART_SIZE: usize = 32 * 1024 * 1024; // 32MB per part

/// 从数据源读取一片，数据源结束时返回的长度小于 part_size
///
/// 缓冲区随读取增长，返回前收缩到实际长度
async fn read_part<R>(reader: &mut R, part_size: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    (&mut *reader).take(part_size as u64).read_to_end(&mut buf).await?;
    buf.shrink_to_fit();
    Ok(Bytes::from(buf))
}

/// 未完成的分片上传，drop 时在后台取消
struct AbortGuard<B: ObjectBackend> {
    backend: Arc<B>,
    key: String,
    upload_id: Option<String>,
}

impl<B: ObjectBackend> AbortGuard<B> {
    /// 上传成功，不再需要取消
    fn disarm(mut self) {
        self.upload_id = None;
    }

    /// 立即取消并等待结果
    ///
    /// part_failed: 分片上传失败后客户端可能已自行取消，此时取消失败只记 debug
    async fn abort(mut self, part_failed: bool) {
        if let Some(upload_id) = self.upload_id.take() {
            abort_upload(self.backend.as_ref(), &self.key, &upload_id, part_failed).await;
        }
    }
}

impl<B: ObjectBackend> Drop for AbortGuard<B> {
    fn drop(&mut self) {
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    abort_upload(backend.as_ref(), &key, &upload_id, false).await;
                });
            }
            Err(_) => {
                tracing::warn!("S3分片上传被丢弃且无运行时，无法取消: key={}, upload_id={}", key, upload_id);
            }
        }
    }
}

async fn abort_upload<B: ObjectBackend + ?Sized>(backend: &B, key: &str, upload_id: &str, part_failed: bool) {
    match backend.abort_multipart_upload(key, upload_id).await {
        Ok(()) => tracing::debug!("S3分片上传已取消: key={}, upload_id={}", key, upload_id),
        Err(e) if part_failed => {
            tracing::debug!("S3分片上传已不存在: key={}, upload_id={}, error={}", key, upload_id, e)
        }
        Err(e) => tracing::warn!("取消S3分片上传失败: key={}, upload_id={}, error={}", key, upload_id, e),
    }
}

/// 上传数据源的全部内容，返回写入的字节数
pub async fn upload_stream<B, R>(
    backend: Arc<B>,
    key: &str,
    reader: &mut R,
    acl: Option<&str>,
    part_size: usize,
) -> StoreResult<u64>
where
    B: ObjectBackend,
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let first = read_part(reader, part_size).await?;
    if first.len() < part_size {
        let size = first.len() as u64;
        tracing::debug!("S3单次上传: key={}, size={}", key, size);
        backend.put_object(key, first, acl).await?;
        return Ok(size);
    }

    let upload_id = backend.create_multipart_upload(key, acl).await?;
    tracing::debug!("S3分片上传开始: key={}, upload_id={}", key, upload_id);

    let guard = AbortGuard {
        backend: backend.clone(),
        key: key.to_string(),
        upload_id: Some(upload_id.clone()),
    };

    let result = upload_parts(backend.as_ref(), key, &upload_id, reader, first, part_size).await;
    let (parts, size) = match result {
        Ok(uploaded) => uploaded,
        Err(e) => {
            guard.abort(true).await;
            return Err(e);
        }
    };

    let count = parts.len();
    if let Err(e) = backend.complete_multipart_upload(key, &upload_id, parts).await {
        guard.abort(false).await;
        return Err(e);
    }
    guard.disarm();

    tracing::debug!("S3分片上传完成: key={}, parts={}, size={}", key, count, size);
    Ok(size)
}

/// 顺序上传分片，上传当前分片的同时读取下一片
async fn upload_parts<B, R>(
    backend: &B,
    key: &str,
    upload_id: &str,
    reader: &mut R,
    first: Bytes,
    part_size: usize,
) -> StoreResult<(Vec<CompletedPart>, u64)>
where
    B: ObjectBackend,
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut parts = Vec::new();
    let mut size = 0u64;
    let mut part_number = 1u32;
    let mut current = first;

    loop {
        let len = current.len() as u64;
        tracing::debug!("S3上传分片: key={}, part={}, size={}", key, part_number, len);

        let (uploaded, next) = tokio::join!(
            backend.upload_part(key, upload_id, part_number, current),
            read_part(reader, part_size),
        );
        parts.push(uploaded?);
        size += len;

        let next = next?;
        if next.is_empty() {
            break;
        }
        part_number += 1;
        current = next;
    }

    Ok((parts, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_part() {
        let data = vec![7u8; 25];
        let mut reader: &[u8] = &data;

        assert_eq!(read_part(&mut reader, 10).await.unwrap().len(), 10);
        assert_eq!(read_part(&mut reader, 10).await.unwrap().len(), 10);
        assert_eq!(read_part(&mut reader, 10).await.unwrap().len(), 5);
        assert!(read_part(&mut reader, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_part_short_source_fits_data() {
        let mut reader: &[u8] = b"0123456789";
        let part = read_part(&mut reader, PART_SIZE).await.unwrap();
        assert_eq!(part.len(), 10);
        assert!(Vec::from(part).capacity() < 1024);
    }
}
