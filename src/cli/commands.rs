//! 命令处理逻辑
//!
//! 实现不需要启动服务的CLI命令

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

impl VersionCommand {
    /// 按指定格式渲染版本信息
    pub fn render(format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => {
                let version_info = serde_json::json!({
                    "name": crate::APP_NAME,
                    "version": crate::VERSION,
                    "description": crate::APP_DESCRIPTION
                });
                Ok(serde_json::to_string_pretty(&version_info)?)
            }
            OutputFormat::Text => Ok(format!(
                "{} v{}\n{}",
                crate::APP_NAME,
                crate::VERSION,
                crate::APP_DESCRIPTION
            )),
        }
    }
}

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = args.command() {
            println!("{}", Self::render(format)?);
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate { config_path } = args.command() {
            let config_file = config_path.unwrap_or_else(|| args.get_config_path());

            println!("验证配置文件: {}", config_file.display());
            let config = self.validate_config_file(&config_file).await?;

            println!("✓ 配置文件验证通过");
            println!(
                "✓ 监听地址: {}:{}{}",
                config.server.bind_address, config.server.port, config.server.base_path
            );
            println!("✓ 终止信号: {:?}", config.lifecycle.signals);
        }
        Ok(())
    }
}

impl ValidateCommand {
    /// 加载并验证配置文件
    pub async fn validate_config_file(&self, config_path: &Path) -> Result<Config> {
        let loader = TomlConfigLoader::new(true);
        loader.load_from_file(config_path).await
    }
}
