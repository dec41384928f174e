//! Fan-out of per-block work over the audit thread pool.

use crossbeam_channel::{Receiver, Sender};
use std::{panic, sync::Arc};
use threadpool::ThreadPool;

type TaskResult<R> = std::thread::Result<R>;

/// Run `task` on the pool and send its result, or the payload of its panic, tagged with
/// `position`.
fn spawn_task<F, R>(
    thread_pool: &ThreadPool,
    position: usize,
    task: F,
    tx: Sender<(usize, TaskResult<R>)>,
) where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    thread_pool.execute(move || {
        let res = panic::catch_unwind(panic::AssertUnwindSafe(task));
        let _ = tx.send((position, res));
    });
}

/// Wait for the next task spawned with [`spawn_task`] to finish, resuming its panic if it
/// panicked.
fn join_task<R>(rx: &Receiver<(usize, TaskResult<R>)>) -> (usize, R) {
    // UNWRAP: spawned tasks always send before dropping their sender, and the caller never
    // joins more tasks than it spawned.
    let (position, res) = rx.recv().unwrap();
    match res {
        Ok(res) => (position, res),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Apply `f` to every item on the pool and wait for all of them. Results are returned in item
/// order regardless of completion order.
pub fn run_all<T, F, R>(thread_pool: &ThreadPool, items: Vec<T>, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let n = items.len();
    let (tx, rx) = crossbeam_channel::unbounded();
    for (position, item) in items.into_iter().enumerate() {
        let f = f.clone();
        spawn_task(thread_pool, position, move || f(item), tx.clone());
    }
    drop(tx);

    let mut results: Vec<Option<R>> = (0..n).map(|_| None).collect();
    for _ in 0..n {
        let (position, res) = join_task(&rx);
        results[position] = Some(res);
    }
    // UNWRAP: every position is sent exactly once.
    results.into_iter().map(|r| r.unwrap()).collect()
}
