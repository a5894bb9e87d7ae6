//! 信号处理模块
//!
//! 把操作系统的终止信号（SIGINT、SIGTERM）转换为生命周期上下文的取消。
//! 监听器本身不会退出进程，只负责取消派生出的上下文。

use crate::error::SignalError;
use crate::lifecycle::context::{LifecycleContext, ShutdownCause};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook_tokio::{Handle, Signals};
#[cfg(unix)]
use std::sync::atomic::AtomicBool;

/// 触发优雅关闭的终止信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// 中断信号（SIGINT / Ctrl+C）
    Interrupt,
    /// 终止信号（SIGTERM）
    Terminate,
}

impl SignalKind {
    /// 默认监听的信号集合
    pub const DEFAULT: [SignalKind; 2] = [SignalKind::Interrupt, SignalKind::Terminate];

    /// 信号的系统名称
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Interrupt => "SIGINT",
            SignalKind::Terminate => "SIGTERM",
        }
    }

    fn bit(self) -> u8 {
        match self {
            SignalKind::Interrupt => 0b01,
            SignalKind::Terminate => 0b10,
        }
    }

    fn mask(kinds: &[SignalKind]) -> u8 {
        kinds.iter().fold(0, |mask, kind| mask | kind.bit())
    }

    #[cfg(unix)]
    fn raw(self) -> i32 {
        match self {
            SignalKind::Interrupt => SIGINT,
            SignalKind::Terminate => SIGTERM,
        }
    }

    #[cfg(unix)]
    fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SIGINT => Some(SignalKind::Interrupt),
            SIGTERM => Some(SignalKind::Terminate),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Interrupt => write!(f, "interrupt"),
            SignalKind::Terminate => write!(f, "terminate"),
        }
    }
}

/// 信号监听器构建器
#[derive(Debug, Clone)]
pub struct SignalListener {
    kinds: Vec<SignalKind>,
    restore_defaults: bool,
}

impl SignalListener {
    /// 创建监听指定信号的构建器
    pub fn new(kinds: &[SignalKind]) -> Self {
        let mut unique = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        Self {
            kinds: unique,
            restore_defaults: true,
        }
    }

    /// 停止监听后是否恢复信号的默认处理（默认恢复）
    ///
    /// 关闭后再次收到信号时将执行系统默认动作，即终止进程。
    /// 同一进程内反复创建监听器的场景（例如测试）可以关闭此行为。
    pub fn restore_defaults(mut self, restore: bool) -> Self {
        self.restore_defaults = restore;
        self
    }

    /// 监听的信号集合
    pub fn kinds(&self) -> &[SignalKind] {
        &self.kinds
    }

    /// 注册信号处理器并派生出可取消的上下文
    ///
    /// 注册在返回前同步完成。必须在 tokio 运行时内调用。
    pub fn listen(
        &self,
        parent: &LifecycleContext,
    ) -> Result<(LifecycleContext, SignalGuard), SignalError> {
        if self.kinds.is_empty() {
            return Err(SignalError::NoSignals);
        }

        let ctx = parent.child();
        let accepted = Arc::new(AtomicU8::new(SignalKind::mask(&self.kinds)));
        let inner = self.spawn_listener(&ctx, Arc::clone(&accepted))?;
        debug!(signals = ?self.kinds, "信号处理器已注册");

        Ok((
            ctx.clone(),
            SignalGuard {
                ctx,
                kinds: self.kinds.clone(),
                accepted,
                inner: Mutex::new(Some(inner)),
            },
        ))
    }

    #[cfg(unix)]
    fn spawn_listener(
        &self,
        ctx: &LifecycleContext,
        accepted: Arc<AtomicU8>,
    ) -> Result<ListenerInner, SignalError> {
        use futures::stream::StreamExt;

        let raw: Vec<i32> = self.kinds.iter().map(|kind| kind.raw()).collect();
        let signals = Signals::new(&raw)?;
        let handle = signals.handle();

        let restore = Arc::new(AtomicBool::new(false));
        if self.restore_defaults {
            for sig in &raw {
                signal_hook::flag::register_conditional_default(*sig, Arc::clone(&restore))?;
            }
        }

        let task_ctx = ctx.clone();
        let task = tokio::spawn(async move {
            let mut signals = signals;
            while let Some(raw) = signals.next().await {
                match SignalKind::from_raw(raw) {
                    Some(kind) if accepted.load(Ordering::SeqCst) & kind.bit() != 0 => {
                        info!("接收到 {} 信号，开始优雅关闭...", kind.name());
                        task_ctx.cancel_with(ShutdownCause::Signal(kind));
                        break;
                    }
                    Some(kind) => {
                        warn!("{} 未配置为优雅关闭信号，执行系统默认处理", kind.name());
                        if let Err(e) = signal_hook::low_level::emulate_default_handler(raw) {
                            error!("执行 {} 的默认处理失败: {}", kind.name(), e);
                        }
                    }
                    None => warn!("接收到未处理的信号: {raw}"),
                }
            }
        });

        Ok(ListenerInner {
            handle,
            restore,
            task,
        })
    }

    #[cfg(not(unix))]
    fn spawn_listener(
        &self,
        ctx: &LifecycleContext,
        accepted: Arc<AtomicU8>,
    ) -> Result<ListenerInner, SignalError> {
        if !self.kinds.contains(&SignalKind::Interrupt) {
            return Err(SignalError::Unsupported(SignalKind::Terminate.name().to_string()));
        }
        if self.kinds.contains(&SignalKind::Terminate) {
            warn!("非Unix系统，只监听 Ctrl+C");
        }

        let task_ctx = ctx.clone();
        let task = tokio::spawn(async move {
            loop {
                match tokio::signal::ctrl_c().await {
                    Ok(()) if accepted.load(Ordering::SeqCst) & SignalKind::Interrupt.bit() != 0 => {
                        info!("接收到 Ctrl+C，开始优雅关闭...");
                        task_ctx.cancel_with(ShutdownCause::Signal(SignalKind::Interrupt));
                        break;
                    }
                    Ok(()) => warn!("Ctrl+C 未配置为优雅关闭信号，已忽略"),
                    Err(e) => {
                        warn!("监听中断信号失败: {e}");
                        break;
                    }
                }
            }
        });

        Ok(ListenerInner { task })
    }
}

struct ListenerInner {
    #[cfg(unix)]
    handle: Handle,
    #[cfg(unix)]
    restore: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ListenerInner {
    fn shutdown(self) {
        #[cfg(unix)]
        {
            self.handle.close();
            self.restore.store(true, Ordering::SeqCst);
        }
        self.task.abort();
    }
}

/// 信号监听的释放句柄
///
/// `stop` 停止拦截信号并取消派生上下文；可以多次调用，`Drop` 时也会自动调用。
pub struct SignalGuard {
    ctx: LifecycleContext,
    kinds: Vec<SignalKind>,
    accepted: Arc<AtomicU8>,
    inner: Mutex<Option<ListenerInner>>,
}

impl SignalGuard {
    /// 只让 `kinds` 中的信号触发优雅关闭
    ///
    /// 其余已注册的信号在收到时执行系统默认处理。`kinds` 必须是已注册信号的非空子集。
    pub fn accept_only(&self, kinds: &[SignalKind]) -> Result<(), SignalError> {
        if kinds.is_empty() {
            return Err(SignalError::NoSignals);
        }
        if let Some(kind) = kinds.iter().find(|kind| !self.kinds.contains(kind)) {
            return Err(SignalError::NotRegistered(kind.name().to_string()));
        }

        self.accepted.store(SignalKind::mask(kinds), Ordering::SeqCst);
        debug!(signals = ?kinds, "优雅关闭信号已更新");
        Ok(())
    }

    /// 当前会触发优雅关闭的信号
    pub fn accepted(&self) -> Vec<SignalKind> {
        let mask = self.accepted.load(Ordering::SeqCst);
        self.kinds
            .iter()
            .copied()
            .filter(|kind| mask & kind.bit() != 0)
            .collect()
    }

    /// 停止拦截信号
    ///
    /// 返回前派生上下文已经处于取消状态。
    pub fn stop(&self) {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(inner) = inner {
            inner.shutdown();
            debug!("信号处理器已注销");
        }

        self.ctx.cancel();
    }

    /// 是否已经停止
    pub fn is_stopped(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SignalGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalGuard")
            .field("stopped", &self.is_stopped())
            .field("cancelled", &self.ctx.is_cancelled())
            .finish()
    }
}

/// 监听给定的终止信号，返回派生上下文和释放句柄
///
/// 第一次收到任一信号时派生上下文被取消；调用 `SignalGuard::stop`
/// 之后恢复信号的默认处理。
pub fn notify_context(
    parent: &LifecycleContext,
    kinds: &[SignalKind],
) -> Result<(LifecycleContext, SignalGuard), SignalError> {
    SignalListener::new(kinds).listen(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quiet_listener() -> SignalListener {
        SignalListener::new(&SignalKind::DEFAULT).restore_defaults(false)
    }

    #[test]
    fn test_listener_deduplicates_kinds() {
        let listener = SignalListener::new(&[
            SignalKind::Terminate,
            SignalKind::Interrupt,
            SignalKind::Terminate,
        ]);
        assert_eq!(
            listener.kinds(),
            &[SignalKind::Terminate, SignalKind::Interrupt]
        );
    }

    #[tokio::test]
    async fn test_empty_signal_set_is_rejected() {
        let parent = LifecycleContext::new();
        let result = notify_context(&parent, &[]);
        assert!(matches!(result, Err(SignalError::NoSignals)));
    }

    #[tokio::test]
    async fn test_stop_cancels_derived_context() {
        let parent = LifecycleContext::new();
        let (ctx, guard) = quiet_listener().listen(&parent).unwrap();
        assert!(!ctx.is_cancelled());

        guard.stop();

        assert!(ctx.is_cancelled());
        assert!(guard.is_stopped());
        assert_eq!(ctx.cause(), Some(ShutdownCause::Explicit));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let parent = LifecycleContext::new();
        let (ctx, guard) = quiet_listener().listen(&parent).unwrap();

        guard.stop();
        guard.stop();
        drop(guard);

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_keeps_signal_cause() {
        let parent = LifecycleContext::new();
        let (ctx, guard) = quiet_listener().listen(&parent).unwrap();

        ctx.cancel_with(ShutdownCause::Signal(SignalKind::Terminate));
        guard.stop();

        assert_eq!(
            ctx.cause(),
            Some(ShutdownCause::Signal(SignalKind::Terminate))
        );
    }

    #[tokio::test]
    async fn test_parent_cancel_propagates() {
        let parent = LifecycleContext::new();
        let (ctx, _guard) = quiet_listener().listen(&parent).unwrap();

        parent.cancel();

        tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
            .await
            .expect("derived context should be cancelled");
    }

    #[tokio::test]
    async fn test_accept_only_narrows_shutdown_signals() {
        let parent = LifecycleContext::new();
        let (_ctx, guard) = quiet_listener().listen(&parent).unwrap();
        assert_eq!(guard.accepted(), SignalKind::DEFAULT.to_vec());

        guard.accept_only(&[SignalKind::Terminate]).unwrap();
        assert_eq!(guard.accepted(), vec![SignalKind::Terminate]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_accept_only_rejects_empty_and_unregistered() {
        let parent = LifecycleContext::new();
        let (_ctx, guard) = SignalListener::new(&[SignalKind::Terminate])
            .restore_defaults(false)
            .listen(&parent)
            .unwrap();

        assert!(matches!(guard.accept_only(&[]), Err(SignalError::NoSignals)));
        assert!(matches!(
            guard.accept_only(&[SignalKind::Interrupt]),
            Err(SignalError::NotRegistered(_))
        ));
        assert_eq!(guard.accepted(), vec![SignalKind::Terminate]);
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let parent = LifecycleContext::new();
        let (ctx, guard) = quiet_listener().listen(&parent).unwrap();

        drop(guard);

        assert!(ctx.is_cancelled());
    }
}
