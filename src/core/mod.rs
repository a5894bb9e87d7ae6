//! 核心模块
//!
//! 包含应用程序的入口逻辑和服务启动流程

pub mod app;
pub mod launcher;

// 重新导出主要类型
pub use app::{execute_command, run_service, run_service_with};
pub use launcher::ServiceLauncher;
