//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::lifecycle::SignalKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP 服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 生命周期配置
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// API 基础路径
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl ServerConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            base_path: default_base_path(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否使用JSON格式
    #[serde(default)]
    pub json_format: bool,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 模块级别日志控制，例如 `tower_http = "warn"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            modules: HashMap::new(),
        }
    }
}

/// 生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    /// 触发优雅关闭的信号
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalKind>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            signals: default_signals(),
        }
    }
}

// 默认值函数
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_base_path() -> String {
    "/api/v1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_signals() -> Vec<SignalKind> {
    SignalKind::DEFAULT.to_vec()
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.server.port == 0 {
        return Err("监听端口不能为0".to_string());
    }

    if config.server.bind_address.trim().is_empty() {
        return Err("绑定地址不能为空".to_string());
    }

    config.server.socket_addr()?;

    if !config.server.base_path.starts_with('/') {
        return Err(format!(
            "API基础路径必须以 '/' 开头: {}",
            config.server.base_path
        ));
    }

    // 验证日志级别
    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.logging.level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.logging.level, valid_log_levels
        ));
    }

    for (module, level) in &config.logging.modules {
        if !valid_log_levels.contains(&level.as_str()) {
            return Err(format!("模块 {} 的日志级别无效: {}", module, level));
        }
    }

    if config.lifecycle.signals.is_empty() {
        return Err("至少需要配置一个终止信号".to_string());
    }

    Ok(())
}
