//! 服务启动器
//!
//! 把配置、日志、信号监听与生命周期协调器串起来

use crate::cli::args::Args;
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::lifecycle::{
    coordinate, ApplicationBuilder, LifecycleContext, Outcome, SignalGuard, SignalListener,
};
use crate::logging::{LogConfig, LoggingSystem};
use anyhow::Context;
use tracing::{error, info, warn};

/// 服务启动器
#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    listener: SignalListener,
}

impl ServiceLauncher {
    /// 使用给定的信号监听器
    pub fn with_listener(listener: SignalListener) -> Self {
        Self { listener }
    }

    /// 加载和验证配置
    ///
    /// 显式指定的配置文件必须存在；默认路径下没有配置文件时使用默认配置。
    pub async fn load_config(args: &Args) -> anyhow::Result<Config> {
        let config_path = args.get_config_path();

        if args.config.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let config_loader = TomlConfigLoader::new(true);
        config_loader
            .load_from_file(&config_path)
            .await
            .with_context(|| format!("加载配置文件失败: {}", config_path.display()))
    }

    /// 初始化日志系统
    ///
    /// 命令行指定的日志级别优先于配置文件。
    pub fn setup_logging(args: &Args, config: Option<&Config>) -> anyhow::Result<LoggingSystem> {
        let mut log_config = match config {
            Some(config) => LogConfig::from_config(&config.logging)?,
            None => LogConfig::default(),
        };
        if let Some(level) = args.log_level {
            log_config.level = level.into();
        }

        LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")
    }

    /// 监听终止信号并协调一次完整的生命周期
    pub async fn run<B: ApplicationBuilder>(&self, builder: B) -> Outcome {
        self.run_with_context(&LifecycleContext::new(), builder).await
    }

    /// 在给定的根上下文下运行
    ///
    /// 根上下文被取消时与收到终止信号的效果相同。
    pub async fn run_with_context<B: ApplicationBuilder>(
        &self,
        root: &LifecycleContext,
        builder: B,
    ) -> Outcome {
        match self.listener.listen(root) {
            Ok((ctx, guard)) => Self::coordinate_with(ctx, guard, builder).await,
            Err(e) => {
                error!("注册信号处理器失败: {}", e);
                Outcome::InitializationFailure
            }
        }
    }

    /// 在已经注册好的信号监听上协调生命周期，结束后释放信号监听
    pub async fn coordinate_with<B: ApplicationBuilder>(
        ctx: LifecycleContext,
        guard: SignalGuard,
        builder: B,
    ) -> Outcome {
        info!("等待终止信号: {:?}", guard.accepted());

        let result = coordinate(&ctx, builder).await;
        guard.stop();

        let outcome = Outcome::from_result(&result);
        match &result {
            Ok(report) => {
                if let Some(e) = &report.release_failure {
                    warn!("服务已正常停止，但释放资源时出错: {e:#}");
                }
            }
            Err(e) => error!("服务异常退出: {e}"),
        }
        info!(exit_code = outcome.exit_code(), "服务结束: {}", outcome);

        outcome
    }
}
