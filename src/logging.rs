//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能

use crate::config::LoggingConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            file_path: None,
            console: true,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// 根据配置文件中的日志段构造日志配置
    ///
    /// 有日志文件时只写文件，否则输出到控制台。
    pub fn from_config(config: &LoggingConfig) -> anyhow::Result<Self> {
        let level = config
            .level
            .parse::<LevelFilter>()
            .map_err(|e| anyhow::anyhow!("无效的日志级别 {}: {}", config.level, e))?;

        let mut module_levels = HashMap::with_capacity(config.modules.len());
        for (module, module_level) in &config.modules {
            let parsed = module_level.parse::<LevelFilter>().map_err(|e| {
                anyhow::anyhow!("模块 {} 的日志级别无效 {}: {}", module, module_level, e)
            })?;
            module_levels.insert(module.clone(), parsed);
        }

        Ok(Self {
            level,
            file_path: config.file_path.clone(),
            console: config.file_path.is_none(),
            json_format: config.json_format,
            module_levels,
        })
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 线程安全的单次初始化：重复调用只返回新的句柄，不会重复安装 subscriber。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let state_mutex =
            GLOBAL_LOGGING_STATE.get_or_init(|| Mutex::new(GlobalLoggingState::default()));
        let mut state = state_mutex.lock().unwrap_or_else(PoisonError::into_inner);

        if state.initialized {
            return Ok(Self { config });
        }

        Self::init_tracing_subscriber(&config)?;
        state.initialized = true;

        Ok(Self { config })
    }

    /// 当前句柄使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 构造环境过滤器：`RUST_LOG` 优先，其次是配置的级别和模块级别
    fn build_env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
        let mut env_filter =
            EnvFilter::from_default_env().add_directive(Directive::from(config.level));

        for (module, level) in &config.module_levels {
            let directive = format!("{module}={level}")
                .parse::<Directive>()
                .map_err(|e| anyhow::anyhow!("无效的模块日志级别 {}: {}", module, e))?;
            env_filter = env_filter.add_directive(directive);
        }

        Ok(env_filter)
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_env_filter(config)?;

        let result = match (&config.file_path, config.console) {
            (Some(file_path), false) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| anyhow::anyhow!("创建日志文件失败: {}", e))?;
                let file_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_writer(Mutex::new(file))
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_ansi(false)
                        .with_file(true)
                        .with_line_number(true)
                        .boxed()
                };
                registry().with(env_filter).with(file_layer).try_init()
            }
            _ => {
                let console_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_file(true)
                        .with_line_number(true)
                        .boxed()
                } else {
                    fmt::layer()
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_ansi(true)
                        .with_target(true)
                        .with_thread_names(true)
                        .boxed()
                };
                registry().with(env_filter).with(console_layer).try_init()
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("日志系统初始化完成");
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains(
                    "attempted to set a logger after the logging system was already initialized",
                ) || error_msg.contains("a global default trace dispatcher has already been set")
                {
                    // 已经有全局 subscriber（例如测试中重复初始化）
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state_mutex) = GLOBAL_LOGGING_STATE.get() {
            let mut state = state_mutex.lock().unwrap_or_else(PoisonError::into_inner);
            state.initialized = false;
        }
    }
}

// ===================== 日志系统测试模块 =====================
