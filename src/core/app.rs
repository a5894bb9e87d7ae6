//! 应用程序核心逻辑
//!
//! 包含主函数和命令分发

use crate::cli::args::{Args, Commands};
use crate::cli::commands::{Command, ValidateCommand, VersionCommand};
use crate::core::launcher::ServiceLauncher;
use crate::inventory::InventoryAppBuilder;
use crate::lifecycle::{LifecycleContext, Outcome, SignalKind, SignalListener};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// 应用程序主函数
pub async fn main() -> ExitCode {
    // 解析命令行参数
    let args = Args::parse();

    execute_command(&args).await
}

/// 执行CLI命令
pub async fn execute_command(args: &Args) -> ExitCode {
    match args.command() {
        Commands::Run => run_service(args).await.into(),
        Commands::Validate { .. } => {
            if let Err(e) = ServiceLauncher::setup_logging(args, None) {
                eprintln!("{e:#}");
            }
            match ValidateCommand.execute(args).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("配置验证失败: {}", e);
                    eprintln!("✗ {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Version { .. } => match VersionCommand.execute(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

/// 启动库存服务，直到收到终止信号
pub async fn run_service(args: &Args) -> Outcome {
    let listener = SignalListener::new(&SignalKind::DEFAULT);
    run_service_with(args, &LifecycleContext::new(), &listener).await
}

/// 使用给定的根上下文和信号监听器启动库存服务
///
/// 信号监听先于配置加载注册：启动期间收到终止信号视为初始化失败。
/// 配置加载完成后只保留配置中的信号用于优雅关闭。
pub async fn run_service_with(
    args: &Args,
    root: &LifecycleContext,
    listener: &SignalListener,
) -> Outcome {
    let (ctx, guard) = match listener.listen(root) {
        Ok(listening) => listening,
        Err(e) => {
            eprintln!("注册信号处理器失败: {e}");
            return Outcome::InitializationFailure;
        }
    };

    let config = match ServiceLauncher::load_config(args).await {
        Ok(config) => config,
        Err(e) => {
            if let Err(log_err) = ServiceLauncher::setup_logging(args, None) {
                eprintln!("{log_err:#}");
            }
            error!("{e:#}");
            return Outcome::InitializationFailure;
        }
    };

    if let Err(e) = ServiceLauncher::setup_logging(args, Some(&config)) {
        eprintln!("{e:#}");
        return Outcome::InitializationFailure;
    }

    info!("{} v{} 启动", crate::APP_NAME, crate::VERSION);
    let config_path = args.get_config_path();
    if config_path.exists() {
        info!("使用配置文件: {}", config_path.display());
    } else {
        warn!("未找到配置文件 {}，使用默认配置", config_path.display());
    }

    if let Err(e) = guard.accept_only(&config.lifecycle.signals) {
        error!("配置的终止信号无效: {}", e);
        return Outcome::InitializationFailure;
    }

    if let Some(cause) = ctx.cause() {
        warn!("启动完成前收到关闭请求（{cause}），不再启动服务");
        return Outcome::InitializationFailure;
    }

    ServiceLauncher::coordinate_with(ctx, guard, InventoryAppBuilder::new(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn quiet_listener() -> SignalListener {
        SignalListener::new(&SignalKind::DEFAULT).restore_defaults(false)
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn args_for(file: &NamedTempFile) -> Args {
        let path = file.path().to_string_lossy().to_string();
        Args::try_parse_from(["inventory-service", "--config", &path, "run"]).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_shutdown_during_startup_is_initialization_failure() {
        let file = config_file("[server]\nbind_address = \"127.0.0.1\"\nport = 18080\n");
        let root = LifecycleContext::new();
        root.cancel();

        let outcome = run_service_with(&args_for(&file), &root, &quiet_listener()).await;

        assert_eq!(outcome, Outcome::InitializationFailure);
        assert_eq!(outcome.exit_code(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_config_is_initialization_failure() {
        let args = Args::try_parse_from([
            "inventory-service",
            "--config",
            "/nonexistent/inventory.toml",
        ])
        .unwrap();

        let outcome =
            run_service_with(&args, &LifecycleContext::new(), &quiet_listener()).await;
        assert_eq!(outcome, Outcome::InitializationFailure);
    }

    #[tokio::test]
    #[serial]
    async fn test_cancel_after_startup_is_clean_shutdown() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        drop(occupied);
        let file = config_file(&format!(
            "[server]\nbind_address = \"127.0.0.1\"\nport = {port}\n\n[lifecycle]\nsignals = [\"terminate\"]\n"
        ));

        let root = LifecycleContext::new();
        let canceller = root.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_service_with(&args_for(&file), &root, &quiet_listener()),
        )
        .await
        .expect("service should stop after cancellation");
        assert_eq!(outcome, Outcome::CleanShutdown);
    }
}
