//! Inventory Service 主程序入口
//!
//! 收到 SIGINT/SIGTERM 后优雅关闭的库存服务

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    inventory_service::core::app::main().await
}
