//! 生命周期集成测试
//!
//! 通过真实的终止信号驱动协调器，验证构造、运行、释放的顺序与退出码

use async_trait::async_trait;
use inventory_service::error::LifecycleError;
use inventory_service::lifecycle::{
    coordinate, Application, ApplicationBuilder, Coordinator, LifecycleContext, LifecycleState,
    Outcome, ShutdownCause, SignalKind, SignalListener,
};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// 记录调用顺序的事件日志
#[derive(Default, Clone)]
struct EventLog(Arc<Mutex<Vec<&'static str>>>);

impl EventLog {
    fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    ServeUntilCancelled,
    FailAfter(Duration, &'static str),
}

struct TestBuilder {
    log: EventLog,
    init_error: Option<&'static str>,
    behavior: Behavior,
}

impl TestBuilder {
    fn new(log: &EventLog, behavior: Behavior) -> Self {
        Self {
            log: log.clone(),
            init_error: None,
            behavior,
        }
    }
}

struct TestApp {
    log: EventLog,
    behavior: Behavior,
}

#[async_trait]
impl ApplicationBuilder for TestBuilder {
    type App = TestApp;

    async fn construct(&self, _ctx: &LifecycleContext) -> anyhow::Result<TestApp> {
        self.log.push("construct");
        if let Some(message) = self.init_error {
            anyhow::bail!(message);
        }
        Ok(TestApp {
            log: self.log.clone(),
            behavior: self.behavior,
        })
    }
}

#[async_trait]
impl Application for TestApp {
    async fn run(&mut self, ctx: &LifecycleContext) -> anyhow::Result<()> {
        self.log.push("run");
        match self.behavior {
            Behavior::ServeUntilCancelled => {
                ctx.cancelled().await;
                self.log.push("run-cancelled");
                Ok(())
            }
            Behavior::FailAfter(delay, message) => {
                tokio::time::sleep(delay).await;
                anyhow::bail!(message)
            }
        }
    }

    async fn release(&mut self) -> anyhow::Result<()> {
        self.log.push("release");
        Ok(())
    }
}

fn quiet_listener() -> SignalListener {
    SignalListener::new(&SignalKind::DEFAULT).restore_defaults(false)
}

#[cfg(unix)]
fn raise_after(signal: i32, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        signal_hook::low_level::raise(signal).unwrap();
    });
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_interrupt_signal_leads_to_clean_shutdown() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    raise_after(signal_hook::consts::SIGINT, Duration::from_millis(100));

    let result = tokio::time::timeout(
        TEST_TIMEOUT,
        coordinate(&ctx, TestBuilder::new(&log, Behavior::ServeUntilCancelled)),
    )
    .await
    .expect("interrupt should stop the application");
    guard.stop();

    let outcome = Outcome::from_result(&result);
    assert_eq!(outcome, Outcome::CleanShutdown);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        result.unwrap().cause,
        Some(ShutdownCause::Signal(SignalKind::Interrupt))
    );
    assert_eq!(
        log.events(),
        vec!["construct", "run", "run-cancelled", "release"]
    );
    assert!(!root.is_cancelled());
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_terminate_signal_leads_to_clean_shutdown() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    let coordinator = Coordinator::new(TestBuilder::new(&log, Behavior::ServeUntilCancelled));
    let state = coordinator.subscribe();

    raise_after(signal_hook::consts::SIGTERM, Duration::from_millis(100));

    let report = tokio::time::timeout(TEST_TIMEOUT, coordinator.coordinate(&ctx))
        .await
        .expect("terminate should stop the application")
        .unwrap();
    guard.stop();

    assert_eq!(
        report.cause,
        Some(ShutdownCause::Signal(SignalKind::Terminate))
    );
    assert_eq!(
        *state.borrow(),
        LifecycleState::Terminated(Outcome::CleanShutdown)
    );
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_repeated_signals_release_once() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    raise_after(signal_hook::consts::SIGINT, Duration::from_millis(50));
    raise_after(signal_hook::consts::SIGTERM, Duration::from_millis(60));
    raise_after(signal_hook::consts::SIGINT, Duration::from_millis(70));

    let result = tokio::time::timeout(
        TEST_TIMEOUT,
        coordinate(&ctx, TestBuilder::new(&log, Behavior::ServeUntilCancelled)),
    )
    .await
    .expect("first signal should stop the application");

    // 让剩余的信号都送达
    tokio::time::sleep(Duration::from_millis(100)).await;
    guard.stop();

    assert!(result.is_ok());
    let releases = log.events().iter().filter(|e| **e == "release").count();
    assert_eq!(releases, 1);
}

#[tokio::test]
#[serial]
async fn test_initialization_failure_scenario() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    let mut builder = TestBuilder::new(&log, Behavior::ServeUntilCancelled);
    builder.init_error = Some("config missing");

    let result = coordinate(&ctx, builder).await;
    guard.stop();

    let outcome = Outcome::from_result(&result);
    assert_eq!(outcome, Outcome::InitializationFailure);
    assert_ne!(outcome.exit_code(), 0);
    match result {
        Err(LifecycleError::Initialization(source)) => {
            assert_eq!(source.to_string(), "config missing");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(log.events(), vec!["construct"]);
}

#[tokio::test]
#[serial]
async fn test_runtime_failure_scenario() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    let builder = TestBuilder::new(
        &log,
        Behavior::FailAfter(Duration::from_millis(20), "listener closed unexpectedly"),
    );

    let result = tokio::time::timeout(TEST_TIMEOUT, coordinate(&ctx, builder))
        .await
        .expect("failing run should return");
    guard.stop();

    let outcome = Outcome::from_result(&result);
    assert_eq!(outcome, Outcome::RuntimeFailure);
    assert_ne!(outcome.exit_code(), 0);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("listener closed unexpectedly"));
    assert_eq!(log.events(), vec!["construct", "run", "release"]);
}

#[tokio::test]
#[serial]
async fn test_duplicate_cancels_have_no_further_effect() {
    let log = EventLog::default();
    let root = LifecycleContext::new();
    let (ctx, guard) = quiet_listener().listen(&root).unwrap();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel_with(ShutdownCause::Signal(SignalKind::Terminate));
        canceller.cancel();
        canceller.cancel_with(ShutdownCause::Signal(SignalKind::Interrupt));
    });

    let report = tokio::time::timeout(
        TEST_TIMEOUT,
        coordinate(&ctx, TestBuilder::new(&log, Behavior::ServeUntilCancelled)),
    )
    .await
    .expect("cancel should stop the application")
    .unwrap();

    guard.stop();
    guard.stop();

    assert_eq!(
        report.cause,
        Some(ShutdownCause::Signal(SignalKind::Terminate))
    );
    assert_eq!(
        log.events(),
        vec!["construct", "run", "run-cancelled", "release"]
    );
}
