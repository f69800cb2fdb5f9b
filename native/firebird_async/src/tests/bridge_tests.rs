//! Tests for bridge.rs - routing blocking calls by execution context

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;

use super::test_utils::inline_runtime;
use crate::bridge::{Bridge, ExecContext, SchedulerLoop, WorkerPool};
use crate::error::{DriverError, Error};

#[tokio::test]
async fn test_cooperative_call_runs_off_the_caller_thread() {
    let cx = ExecContext::cooperative().unwrap();
    let caller = thread::current().id();

    let worker = Bridge::shared()
        .run(&cx, || Ok(thread::current().id()))
        .await
        .unwrap();

    assert_ne!(worker, caller, "cooperative call must not block the scheduler thread");
}

#[test]
fn test_inline_call_runs_on_the_caller_thread() {
    let caller = thread::current().id();
    let rt = inline_runtime();

    let worker = rt
        .block_on(Bridge::shared().run(&ExecContext::Inline, || Ok(thread::current().id())))
        .unwrap();

    assert_eq!(worker, caller);
}

#[test]
fn test_inline_ignores_dedicated_pool() {
    let pool = Arc::new(WorkerPool::new(1, "inline-test-worker").unwrap());
    let bridge = Bridge::with_executor(Arc::clone(&pool));
    let caller = thread::current().id();

    let worker = inline_runtime()
        .block_on(bridge.run(&ExecContext::Inline, || Ok(thread::current().id())))
        .unwrap();

    assert_eq!(worker, caller);
}

#[tokio::test]
async fn test_dedicated_pool_runs_on_named_thread() {
    let pool = Arc::new(WorkerPool::new(1, "bridge-test-worker").unwrap());
    let bridge = Bridge::with_executor(Arc::clone(&pool));
    let cx = ExecContext::cooperative().unwrap();

    let name = bridge
        .run(&cx, || Ok(thread::current().name().map(str::to_string)))
        .await
        .unwrap();

    assert_eq!(name.as_deref(), Some("bridge-test-worker"));
    assert_eq!(pool.threads(), 1);
}

#[tokio::test]
async fn test_shutdown_pool_rejects_calls_without_fallback() {
    let pool = Arc::new(WorkerPool::new(1, "shutdown-test-worker").unwrap());
    let bridge = Bridge::with_executor(Arc::clone(&pool));
    let cx = ExecContext::cooperative().unwrap();

    pool.shutdown();
    assert!(pool.is_shutdown());

    let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let result = bridge
        .run(&cx, move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::ExecutorShutdown)));
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn test_pool_shutdown_is_idempotent() {
    let pool = WorkerPool::new(2, "idempotent-worker").unwrap();
    pool.shutdown();
    pool.shutdown();
    assert!(pool.is_shutdown());
    assert_eq!(pool.threads(), 2);
}

#[test]
fn test_pool_has_at_least_one_thread() {
    let pool = WorkerPool::new(0, "zero-worker").unwrap();
    assert_eq!(pool.threads(), 1);
}

#[tokio::test]
async fn test_errors_pass_through_unchanged() {
    let cx = ExecContext::cooperative().unwrap();

    let result: Result<(), Error> = Bridge::shared()
        .run(&cx, || {
            Err(DriverError::operational("boom").with_code(335544721).into())
        })
        .await;

    let err = result.unwrap_err();
    let driver = err.driver_error().unwrap();
    assert_eq!(driver.message, "boom");
    assert_eq!(driver.code, Some(335544721));
}

#[tokio::test]
async fn test_panic_is_resumed_on_caller() {
    let task = tokio::spawn(async {
        let cx = ExecContext::cooperative().unwrap();
        Bridge::shared()
            .run(&cx, || -> Result<(), Error> { panic!("blocking call panicked") })
            .await
    });

    let err = task.await.unwrap_err();
    assert!(err.is_panic());
}

#[tokio::test]
async fn test_call_on_stopped_runtime_is_cancelled() {
    let stopped = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let cx = SchedulerLoop::new(stopped.handle().clone()).context();
    stopped.shutdown_background();

    let result = Bridge::shared().run(&cx, || Ok(1)).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_sequential_calls_keep_order() {
    let cx = ExecContext::cooperative().unwrap();
    let bridge = Bridge::shared();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    for i in 0..5 {
        let log = Arc::clone(&log);
        bridge
            .run(&cx, move || {
                log.lock().unwrap().push(i);
                Ok(())
            })
            .await
            .unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

mod scheduler_loop {
    use super::*;

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(matches!(SchedulerLoop::current(), Err(Error::NoScheduler)));
        assert!(matches!(ExecContext::cooperative(), Err(Error::NoScheduler)));
    }

    #[tokio::test]
    async fn test_closed_flag_is_shared_between_clones() {
        let scheduler = SchedulerLoop::current().unwrap();
        let clone = scheduler.clone();
        assert!(!clone.is_closed());

        scheduler.mark_closed();
        assert!(clone.is_closed());
    }

    #[tokio::test]
    async fn test_context_is_cooperative() {
        let scheduler = SchedulerLoop::current().unwrap();
        let cx = scheduler.context();
        assert!(cx.is_cooperative());
        assert!(cx.scheduler().is_some());
        assert!(ExecContext::Inline.scheduler().is_none());
    }
}
