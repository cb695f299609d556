//! 共享库
//!
//! 包含配置、错误处理、数据库连接池、缓存连接管理和可观测性等基础设施代码。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod retry;
pub mod test_utils;

pub use cache::{CacheConnection, CacheStore, HealthReport, HealthStatus, RedisStore, StoreError};
pub use config::AppConfig;
pub use database::Database;
pub use error::{Result, ShopError};
