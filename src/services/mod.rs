//! 服务层模块
//!
//! 包含核心业务逻辑

pub mod containers;
pub mod nginx;
pub mod password;
pub mod postgres;
pub mod signing;

pub use containers::{ContainerError, ContainerManager};
pub use postgres::{DatabaseError, PostgresRunner};
