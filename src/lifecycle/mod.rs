//! 生命周期管理模块
//!
//! 信号监听器把终止信号转换为可取消的上下文，协调器用这个上下文构造、运行并释放应用：
//!
//! ```text
//! SIGINT/SIGTERM -> signals::notify_context -> LifecycleContext
//!     -> Coordinator::initialize -> Coordinator::run -> Coordinator::release -> Outcome
//! ```

pub mod context;
pub mod coordinator;
pub mod signals;

// 重新导出主要类型
pub use context::{LifecycleContext, ShutdownCause};
pub use coordinator::{
    coordinate, Acquired, Application, ApplicationBuilder, Coordinator, LifecycleState, Outcome,
    ShutdownReport,
};
pub use signals::{notify_context, SignalGuard, SignalKind, SignalListener};
