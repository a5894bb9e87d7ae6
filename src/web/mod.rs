//! Web接口模块
//!
//! 提供 HTTP 服务器和基础 API 端点

use serde::Serialize;

pub mod server;

pub use server::WebServer;

/// Web服务器状态
#[derive(Debug, Clone)]
pub struct WebServerState {
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl WebServerState {
    /// 创建新的Web服务器状态
    pub fn new() -> Self {
        Self {
            start_time: chrono::Utc::now(),
        }
    }

    /// 已运行的秒数
    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.start_time)
            .num_seconds()
            .max(0) as u64
    }
}

impl Default for WebServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// API响应包装器
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 是否成功
    pub success: bool,
    /// 响应数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 时间戳
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 版本信息响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VersionInfo {
    /// 服务名称
    pub name: String,
    /// 版本号
    pub version: String,
    /// 服务描述
    pub description: String,
    /// 运行时间（秒）
    pub uptime_seconds: u64,
}

impl VersionInfo {
    /// 根据服务器状态生成版本信息
    pub fn current(state: &WebServerState) -> Self {
        Self {
            name: crate::APP_NAME.to_string(),
            version: crate::VERSION.to_string(),
            description: crate::APP_DESCRIPTION.to_string(),
            uptime_seconds: state.uptime_seconds(),
        }
    }
}
