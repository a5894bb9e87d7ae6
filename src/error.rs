//! 错误处理模块
//!
//! 定义应用程序的统一错误类型以及生命周期错误分类

use thiserror::Error;

/// Inventory Service 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum InventoryServiceError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 信号处理相关错误
    #[error("信号处理错误: {0}")]
    Signal(#[from] SignalError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 信号监听错误类型
#[derive(Error, Debug)]
pub enum SignalError {
    /// 没有指定任何需要监听的信号
    #[error("至少需要监听一个终止信号")]
    NoSignals,

    /// 当前平台不支持该信号
    #[error("当前平台不支持信号: {0}")]
    Unsupported(String),

    /// 信号不在已注册的集合中
    #[error("信号未注册: {0}")]
    NotRegistered(String),

    /// 注册信号处理器失败
    #[error("注册信号处理器失败: {0}")]
    Registration(#[from] std::io::Error),
}

/// 生命周期错误分类
///
/// 初始化失败与运行时失败都会终止进程，释放失败只会被记录。
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// 应用构造失败，运行和释放都不会发生
    #[error("应用初始化失败: {0:#}")]
    Initialization(#[source] anyhow::Error),

    /// 运行阶段失败，释放已经执行
    #[error("运行时错误: {source:#}")]
    Runtime {
        /// 运行阶段返回的错误
        #[source]
        source: anyhow::Error,
        /// 运行失败之后释放阶段出现的错误（仅用于诊断）
        release_failure: Option<anyhow::Error>,
    },
}

impl LifecycleError {
    /// 运行失败之后记录下来的释放错误
    pub fn release_failure(&self) -> Option<&anyhow::Error> {
        match self {
            LifecycleError::Initialization(_) => None,
            LifecycleError::Runtime {
                release_failure, ..
            } => release_failure.as_ref(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, InventoryServiceError>;
