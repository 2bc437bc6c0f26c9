//! S3 对象存储日志驱动

pub mod backend;
pub mod bucket;
pub mod config;
pub mod driver;
pub mod factory;
pub mod upload;

pub use backend::{CompletedPart, ListPage, ObjectBackend};
pub use bucket::BucketBackend;
pub use config::S3Config;
pub use driver::S3Store;
pub use factory::S3DriverFactory;
