//! 生命周期协调器
//!
//! 负责应用的构造、运行与释放：构造成功后，无论运行阶段正常结束、返回错误、
//! panic 还是被取消，释放都会且只会执行一次，并且在协调器返回之前完成。

use crate::error::LifecycleError;
use crate::lifecycle::context::{LifecycleContext, ShutdownCause};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const RELEASE_TARGET: &str = "inventory_service::lifecycle::release";

/// 被协调的应用
///
/// 应用内部可以有任意多的并发任务，协调器只关心运行与释放两个入口。
#[async_trait]
pub trait Application: Send {
    /// 运行主循环，直到上下文被取消（返回 `Ok`）或出现不可恢复的错误
    async fn run(&mut self, ctx: &LifecycleContext) -> anyhow::Result<()>;

    /// 释放应用持有的资源
    async fn release(&mut self) -> anyhow::Result<()>;
}

/// 应用构造器
#[async_trait]
pub trait ApplicationBuilder: Send + Sync {
    /// 构造出的应用类型
    type App: Application + 'static;

    /// 使用生命周期上下文构造应用
    ///
    /// 构造过程中已获取的部分资源需要在返回错误之前自行释放。
    async fn construct(&self, ctx: &LifecycleContext) -> anyhow::Result<Self::App>;
}

/// 进程最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 初始化失败
    InitializationFailure,
    /// 运行时失败
    RuntimeFailure,
    /// 正常关闭
    CleanShutdown,
}

impl Outcome {
    /// 根据协调结果得到最终结果
    pub fn from_result(result: &Result<ShutdownReport, LifecycleError>) -> Self {
        match result {
            Ok(_) => Outcome::CleanShutdown,
            Err(LifecycleError::Initialization(_)) => Outcome::InitializationFailure,
            Err(LifecycleError::Runtime { .. }) => Outcome::RuntimeFailure,
        }
    }

    /// 进程退出码
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::CleanShutdown => 0,
            Outcome::RuntimeFailure => 1,
            Outcome::InitializationFailure => 2,
        }
    }
}

impl From<Outcome> for std::process::ExitCode {
    fn from(outcome: Outcome) -> Self {
        std::process::ExitCode::from(outcome.exit_code())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::InitializationFailure => write!(f, "initialization-failure"),
            Outcome::RuntimeFailure => write!(f, "runtime-failure"),
            Outcome::CleanShutdown => write!(f, "clean-shutdown"),
        }
    }
}

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// 已创建
    Created,
    /// 正在初始化
    Initializing,
    /// 运行中
    Running,
    /// 正在关闭
    ShuttingDown,
    /// 已终止
    Terminated(Outcome),
}

impl LifecycleState {
    /// 状态机是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::{Created, Initializing, Running, ShuttingDown, Terminated};

        matches!(
            (self, next),
            (Created, Initializing)
                | (Initializing, Running)
                | (Initializing, Terminated(Outcome::InitializationFailure))
                | (Running, ShuttingDown)
                | (ShuttingDown, Terminated(Outcome::CleanShutdown))
                | (ShuttingDown, Terminated(Outcome::RuntimeFailure))
        )
    }

    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Terminated(_))
    }
}

/// 正常关闭时的报告
#[derive(Debug)]
pub struct ShutdownReport {
    /// 关闭原因；应用自行结束运行时为 `None`
    pub cause: Option<ShutdownCause>,
    /// 释放阶段出现的错误，不影响退出码
    pub release_failure: Option<anyhow::Error>,
}

/// 已获取的应用
///
/// 释放是一次性的：`release` 消耗自身；若未释放就被丢弃，
/// 会在当前 tokio 运行时上补做释放。
pub struct Acquired<A: Application + 'static> {
    app: Option<A>,
}

impl<A: Application + 'static> Acquired<A> {
    fn new(app: A) -> Self {
        Self { app: Some(app) }
    }

    /// 访问应用
    pub fn get(&self) -> Option<&A> {
        self.app.as_ref()
    }

    async fn run(&mut self, ctx: &LifecycleContext) -> anyhow::Result<()> {
        let Some(app) = self.app.as_mut() else {
            return Err(anyhow!("应用已经释放"));
        };

        match AssertUnwindSafe(app.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("应用运行时 panic: {}", panic_message(&*panic))),
        }
    }

    async fn release(mut self) -> anyhow::Result<()> {
        let Some(mut app) = self.app.take() else {
            return Ok(());
        };

        match AssertUnwindSafe(app.release()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("应用释放时 panic: {}", panic_message(&*panic))),
        }
    }
}

impl<A: Application + 'static> Drop for Acquired<A> {
    fn drop(&mut self) {
        let Some(mut app) = self.app.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(target: RELEASE_TARGET, "应用未经协调器释放，在后台补做释放");
                runtime.spawn(async move {
                    if let Err(e) = app.release().await {
                        error!(target: RELEASE_TARGET, "后台释放应用失败: {e:#}");
                    }
                });
            }
            Err(_) => {
                error!(target: RELEASE_TARGET, "没有可用的 tokio 运行时，应用资源可能泄漏");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 生命周期协调器
pub struct Coordinator<B: ApplicationBuilder> {
    builder: B,
    state: watch::Sender<LifecycleState>,
}

impl<B: ApplicationBuilder> Coordinator<B> {
    /// 创建新的协调器
    pub fn new(builder: B) -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self { builder, state }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// 当前状态
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn transition(&self, next: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else if current.can_transition_to(next) {
                debug!("生命周期状态: {:?} -> {:?}", current, next);
                *current = next;
                true
            } else {
                warn!("忽略非法的生命周期状态迁移: {:?} -> {:?}", current, next);
                false
            }
        })
    }

    /// 构造应用
    ///
    /// 失败时不会运行也不会释放应用。
    pub async fn initialize(
        &self,
        ctx: &LifecycleContext,
    ) -> Result<Acquired<B::App>, LifecycleError> {
        self.transition(LifecycleState::Initializing);

        match self.builder.construct(ctx).await {
            Ok(app) => {
                self.transition(LifecycleState::Running);
                info!("应用初始化完成");
                Ok(Acquired::new(app))
            }
            Err(e) => {
                error!("应用初始化失败: {e:#}");
                self.transition(LifecycleState::Terminated(Outcome::InitializationFailure));
                Err(LifecycleError::Initialization(e))
            }
        }
    }

    /// 运行应用，直到上下文取消或出现运行时错误
    ///
    /// 上下文一旦取消就进入 `ShuttingDown`，随后继续等待应用收尾。
    pub async fn run(
        &self,
        ctx: &LifecycleContext,
        app: &mut Acquired<B::App>,
    ) -> anyhow::Result<()> {
        let run = app.run(ctx);
        tokio::pin!(run);

        let result = tokio::select! {
            result = &mut run => result,
            _ = ctx.cancelled() => {
                self.transition(LifecycleState::ShuttingDown);
                run.await
            }
        };

        match (&result, ctx.cause()) {
            (Ok(()), Some(cause)) => info!("收到关闭请求（{cause}），应用已停止运行"),
            (Ok(()), None) => info!("应用运行结束"),
            (Err(e), _) => error!("运行时错误: {e:#}"),
        }
        self.transition(LifecycleState::ShuttingDown);

        result
    }

    /// 释放应用资源
    ///
    /// 释放失败只会被记录，返回值供诊断使用。
    pub async fn release(&self, app: Acquired<B::App>) -> Option<anyhow::Error> {
        match app.release().await {
            Ok(()) => {
                debug!(target: RELEASE_TARGET, "应用资源已释放");
                None
            }
            Err(e) => {
                error!(target: RELEASE_TARGET, "释放应用资源失败，可能存在资源泄漏: {e:#}");
                Some(e)
            }
        }
    }

    /// 完整的生命周期：构造 -> 运行 -> 释放
    pub async fn coordinate(
        self,
        ctx: &LifecycleContext,
    ) -> Result<ShutdownReport, LifecycleError> {
        let mut app = self.initialize(ctx).await?;

        let run_result = self.run(ctx, &mut app).await;
        let release_failure = self.release(app).await;

        match run_result {
            Ok(()) => {
                self.transition(LifecycleState::Terminated(Outcome::CleanShutdown));
                info!("服务已停止");
                Ok(ShutdownReport {
                    cause: ctx.cause(),
                    release_failure,
                })
            }
            Err(source) => {
                self.transition(LifecycleState::Terminated(Outcome::RuntimeFailure));
                Err(LifecycleError::Runtime {
                    source,
                    release_failure,
                })
            }
        }
    }
}

/// 使用给定构造器协调一次完整的生命周期
pub async fn coordinate<B: ApplicationBuilder>(
    ctx: &LifecycleContext,
    builder: B,
) -> Result<ShutdownReport, LifecycleError> {
    Coordinator::new(builder).coordinate(ctx).await
}
