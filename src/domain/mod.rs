//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod container;
pub mod database;
pub mod session;

// Re-exports for convenience
pub use container::{ContainerRecord, ContainerStatus, PortMapping};
pub use session::{LockoutCounter, Session};
