//! Inventory Service - 库存服务
//!
//! 以生命周期协调器为核心的服务进程：
//! - SIGINT/SIGTERM 转换为可取消的上下文
//! - 应用的构造、运行、释放由协调器统一调度
//! - 释放在任何退出路径上都只执行一次
//! - 进程退出码区分初始化失败、运行时失败和正常关闭
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod logging;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use error::{InventoryServiceError, LifecycleError};
pub use lifecycle::{coordinate, notify_context, LifecycleContext, Outcome};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
