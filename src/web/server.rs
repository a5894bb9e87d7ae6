//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{ApiResponse, VersionInfo, WebServerState};
use crate::config::ServerConfig;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
#[derive(Debug, Clone)]
pub struct WebServer {
    /// 配置
    config: ServerConfig,
    /// 服务器状态
    state: Arc<WebServerState>,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(WebServerState::new()),
        }
    }

    /// 创建路由
    ///
    /// API 挂载在配置的基础路径下；基础路径为 `/` 时直接挂在根上。
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/version", get(version_handler))
            .with_state(Arc::clone(&self.state));

        let base_path = self.config.base_path.trim_end_matches('/');
        let router = if base_path.is_empty() {
            Router::new().merge(api)
        } else {
            Router::new().nest(base_path, api)
        };

        router.layer(TraceLayer::new_for_http())
    }

    /// 在给定监听器上提供服务，直到 `shutdown` 完成
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Web服务器已启动: http://{}{}", addr, self.config.base_path);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}

async fn version_handler(
    State(state): State<Arc<WebServerState>>,
) -> Json<ApiResponse<VersionInfo>> {
    Json(ApiResponse::success(VersionInfo::current(&state)))
}
