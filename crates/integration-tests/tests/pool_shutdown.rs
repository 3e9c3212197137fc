//! Worker pool cancellation against real subprocesses

#![cfg(unix)]

use simbatch_core::application::{shutdown_channel, WorkQueue, Worker, WorkerStats};
use simbatch_core::domain::Job;
use simbatch_core::port::time_provider::SystemTimeProvider;
use simbatch_core::port::TaskExecutor;
use simbatch_infra_system::SubprocessExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;

fn executor() -> Arc<dyn TaskExecutor> {
    Arc::new(SubprocessExecutor::new(Arc::new(SystemTimeProvider)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_process_survives_cancellation() {
    let queue = Arc::new(WorkQueue::new());
    queue.enqueue(Job::new_test(0, "sh", &["-c", "sleep 0.3; echo finished"]));

    let (tx, token) = shutdown_channel();
    let worker = Worker::new(0, Arc::clone(&queue), executor());
    let handle = tokio::spawn(async move { worker.run(token).await });

    // Wait until the job has been handed out, then cancel mid-execution
    timeout(Duration::from_secs(5), async {
        while queue.stats().dispatched == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tx.shutdown();

    let stats = timeout(Duration::from_secs(10), handle)
        .await
        .expect("worker must finish its job and stop")
        .unwrap()
        .unwrap();

    assert_eq!(stats.executed, 1);
    assert_eq!(stats.succeeded, 1, "process was not interrupted");
    assert!(queue.stats().is_drained());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_idle_pool_terminates_promptly() {
    let queue = Arc::new(WorkQueue::new());
    let (tx, token) = shutdown_channel();

    let mut workers = JoinSet::new();
    for id in 0..8 {
        let worker = Worker::new(id, Arc::clone(&queue), executor());
        let token = token.clone();
        workers.spawn(async move { worker.run(token).await });
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.shutdown();

    let joined = timeout(Duration::from_secs(1), async {
        let mut joined = 0;
        while let Some(result) = workers.join_next().await {
            assert_eq!(result.unwrap().unwrap(), WorkerStats::default());
            joined += 1;
        }
        joined
    })
    .await
    .expect("idle workers must stop within the bound");

    assert_eq!(joined, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_then_cancel_joins_every_worker() {
    const JOBS: u64 = 20;
    let queue = Arc::new(WorkQueue::new());
    for id in 0..JOBS {
        // Alternate success and failure
        let script = if id % 2 == 0 { "exit 0" } else { "exit 1" };
        queue.enqueue(Job::new_test(id, "sh", &["-c", script]));
    }

    let (tx, token) = shutdown_channel();
    let mut workers = JoinSet::new();
    for id in 0..4 {
        let worker = Worker::new(id, Arc::clone(&queue), executor());
        let token = token.clone();
        workers.spawn(async move { worker.run(token).await });
    }

    timeout(Duration::from_secs(30), queue.wait_until_drained())
        .await
        .expect("batch must drain");
    tx.shutdown();

    let mut total = WorkerStats::default();
    while let Some(result) = workers.join_next().await {
        total.merge(&result.unwrap().unwrap());
    }

    assert_eq!(total.executed, JOBS);
    assert_eq!(total.succeeded, JOBS / 2);
    assert_eq!(total.non_zero_exits, JOBS / 2);
    assert_eq!(queue.stats().acknowledged, JOBS);
}
