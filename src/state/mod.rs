//! 运行时状态模块
//!
//! 管理应用状态、会话存储和容器清单

pub mod app_state;
pub mod inventory;
pub mod session_store;

pub use app_state::AppState;
pub use inventory::ContainerInventory;
pub use session_store::{LockoutStore, SessionStore};
