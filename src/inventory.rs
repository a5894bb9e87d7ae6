//! 库存服务应用
//!
//! 由生命周期协调器驱动的 HTTP 服务：构造时绑定监听端口，运行时提供 API，
//! 上下文取消后优雅关闭。

use crate::config::Config;
use crate::lifecycle::{Application, ApplicationBuilder, LifecycleContext};
use crate::web::WebServer;
use anyhow::Context;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// 库存服务构造器
#[derive(Debug, Clone)]
pub struct InventoryAppBuilder {
    config: Config,
}

impl InventoryAppBuilder {
    /// 使用已验证的配置创建构造器
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ApplicationBuilder for InventoryAppBuilder {
    type App = InventoryApp;

    async fn construct(&self, _ctx: &LifecycleContext) -> anyhow::Result<InventoryApp> {
        let addr = self
            .config
            .server
            .socket_addr()
            .map_err(anyhow::Error::msg)?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定监听地址失败: {addr}"))?;
        let local_addr = listener.local_addr().context("获取监听地址失败")?;

        info!("库存服务监听地址: {}", local_addr);

        Ok(InventoryApp {
            server: WebServer::new(self.config.server.clone()),
            listener: Some(listener),
            local_addr,
        })
    }
}

/// 库存服务应用
#[derive(Debug)]
pub struct InventoryApp {
    server: WebServer,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
}

impl InventoryApp {
    /// 实际监听的地址（端口为 0 时由系统分配）
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Application for InventoryApp {
    async fn run(&mut self, ctx: &LifecycleContext) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("监听器已被使用，服务不能重复运行")?;

        self.server
            .serve(listener, ctx.clone().cancelled_owned())
            .await
            .context("Web服务器异常退出")
    }

    async fn release(&mut self) -> anyhow::Result<()> {
        if self.listener.take().is_some() {
            debug!("关闭未使用的监听器: {}", self.local_addr);
        }
        info!("库存服务资源已释放");
        Ok(())
    }
}
