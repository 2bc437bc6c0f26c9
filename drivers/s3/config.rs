//! S3驱动配置

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// S3配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// 存储桶名称
    pub bucket: String,
    /// 对象键前缀，所有日志键都位于该前缀下
    #[serde(default)]
    pub prefix: String,
    /// S3端点地址
    /// AWS: 留空，按区域生成
    /// MinIO: http://localhost:9000
    /// 没有协议头时按 http 处理
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    #[serde(default)]
    pub access_key_id: String,
    /// Secret Access Key
    #[serde(default)]
    pub secret_access_key: String,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: String,
    /// 写入时使用的ACL，如 private、bucket-owner-full-control；留空不设置
    #[serde(default)]
    pub acl: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            endpoint: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            acl: String::new(),
            force_path_style: false,
        }
    }
}

impl S3Config {
    /// 从环境变量读取配置
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();

        let force_path_style = match lookup("S3_PATH_STYLE") {
            None => false,
            Some(v) => parse_bool(&v)
                .ok_or_else(|| StoreError::Config(format!("S3_PATH_STYLE is not a boolean: {}", v)))?,
        };
        let region = lookup("S3_REGION")
            .filter(|r| !r.is_empty())
            .unwrap_or_else(default_region);

        let config = Self {
            bucket: var("S3_BUCKET"),
            prefix: var("S3_PREFIX"),
            endpoint: var("S3_ENDPOINT"),
            region,
            access_key_id: var("S3_ACCESS_KEY_ID"),
            secret_access_key: var("S3_SECRET_ACCESS_KEY"),
            session_token: var("S3_SESSION_TOKEN"),
            acl: var("S3_ACL"),
            force_path_style,
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket is required".to_string()));
        }
        if let Some((scheme, _)) = self.endpoint.split_once("://") {
            if scheme != "http" && scheme != "https" {
                return Err(StoreError::Config(format!("unsupported endpoint scheme: {}", scheme)));
            }
        }
        Ok(())
    }

    /// 实际请求使用的端点URL，是否使用TLS由其协议决定
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", self.region)
        } else if self.endpoint.contains("://") {
            self.endpoint.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.endpoint.trim_end_matches('/'))
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_env() {
        let config = S3Config::from_lookup(lookup(&[
            ("S3_BUCKET", "logs"),
            ("S3_PREFIX", "ci"),
            ("S3_ENDPOINT", "minio:9000"),
            ("S3_PATH_STYLE", "true"),
            ("S3_ACCESS_KEY_ID", "minio"),
            ("S3_SECRET_ACCESS_KEY", "minio123"),
            ("S3_ACL", "bucket-owner-full-control"),
        ]))
        .unwrap();

        assert_eq!(config.bucket, "logs");
        assert_eq!(config.prefix, "ci");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.acl, "bucket-owner-full-control");
        assert!(config.force_path_style);
        assert_eq!(config.endpoint_url(), "http://minio:9000");
    }

    #[test]
    fn test_from_env_requires_bucket() {
        let err = S3Config::from_lookup(lookup(&[("S3_PREFIX", "ci")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_from_env_rejects_bad_bool() {
        let err = S3Config::from_lookup(lookup(&[("S3_BUCKET", "logs"), ("S3_PATH_STYLE", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("S3_PATH_STYLE"));
    }

    #[test]
    fn test_endpoint_url() {
        let mut config = S3Config { bucket: "logs".to_string(), region: "eu-west-1".to_string(), ..Default::default() };
        assert_eq!(config.endpoint_url(), "https://s3.eu-west-1.amazonaws.com");

        config.endpoint = "https://storage.example.com/".to_string();
        assert_eq!(config.endpoint_url(), "https://storage.example.com");

        config.endpoint = "http://127.0.0.1:9000".to_string();
        assert_eq!(config.endpoint_url(), "http://127.0.0.1:9000");

        config.endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: S3Config = serde_json::from_value(serde_json::json!({ "bucket": "logs" })).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert!(config.prefix.is_empty());
        assert!(config.acl.is_empty());
        assert!(!config.force_path_style);
    }
}
