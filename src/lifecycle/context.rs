//! 生命周期上下文
//!
//! 对 `CancellationToken` 的一层封装：记录“进程应继续运行”还是“必须开始关闭”，
//! 并保存第一次取消的原因。

use crate::lifecycle::signals::SignalKind;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture, WaitForCancellationFutureOwned};

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// 收到操作系统终止信号
    Signal(SignalKind),
    /// 进程主动请求关闭（例如释放信号监听器时）
    Explicit,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Signal(kind) => write!(f, "signal:{kind}"),
            ShutdownCause::Explicit => write!(f, "explicit"),
        }
    }
}

/// 可取消的生命周期上下文
///
/// 克隆得到的是同一个上下文的句柄；`child` 派生出的上下文会随父上下文一起取消，
/// 但取消子上下文不会影响父上下文。取消是单向且幂等的。
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    token: CancellationToken,
    cause: Arc<OnceLock<ShutdownCause>>,
    parent: Option<Arc<LifecycleContext>>,
}

impl LifecycleContext {
    /// 创建新的根上下文
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            cause: Arc::new(OnceLock::new()),
            parent: None,
        }
    }

    /// 派生子上下文
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            cause: Arc::new(OnceLock::new()),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// 主动取消上下文
    pub fn cancel(&self) {
        self.cancel_with(ShutdownCause::Explicit);
    }

    /// 以指定原因取消上下文
    ///
    /// 只有第一次取消会生效，返回值表示本次调用是否就是那一次。
    pub fn cancel_with(&self, cause: ShutdownCause) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let first = self.cause.set(cause).is_ok();
        self.token.cancel();
        first
    }

    /// 是否已经取消
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 等待上下文被取消
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// 等待上下文被取消（拥有所有权的版本，可移动到其他任务中）
    pub fn cancelled_owned(self) -> WaitForCancellationFutureOwned {
        self.token.cancelled_owned()
    }

    /// 第一次取消的原因；由父上下文触发的取消沿用父上下文的原因
    pub fn cause(&self) -> Option<ShutdownCause> {
        if let Some(cause) = self.cause.get() {
            return Some(*cause);
        }
        match &self.parent {
            Some(parent) if self.token.is_cancelled() => parent.cause(),
            _ => None,
        }
    }
}

impl Default for LifecycleContext {
    fn default() -> Self {
        Self::new()
    }
}
