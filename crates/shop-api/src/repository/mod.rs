//! 数据访问层
//!
//! 认证只依赖 `UserLookup` 这一只读接口。

mod user;

pub use user::{InMemoryUserLookup, PgUserLookup, UserLookup};

#[cfg(test)]
pub use user::MockUserLookup;
