//! Sync bridge (C10): run an async future to completion from sync code
//! without deadlocking an already-running runtime.
//!
//! Rust rendition of `sync_utils.py::run_sync`: Python's
//! `asyncio.get_running_loop()`/no-loop split becomes
//! `tokio::runtime::Handle::try_current()`; the "spin a thread with its own
//! loop" branch becomes a dedicated OS thread building a fresh
//! current-thread `Runtime`, mirroring the teacher's `tokio::spawn` +
//! channel handshake pattern in `llm/openai.rs::chat_loop`.

use std::future::Future;
use std::sync::mpsc as std_mpsc;

use crate::error::SyncBridgeError;

/// Marker for a future that closes over a resource tied to the *caller's*
/// async runtime (e.g. a `reqwest::Client` built on a specific `Handle`).
/// Passing one while already inside a running loop is refused outright,
/// matching `run_sync`'s `session is not None` guard.
pub struct LoopBound;

/// Run `fut` to completion and return its output.
///
/// - No runtime currently running on this thread: build (or reuse, via
///   `tokio::runtime::Runtime::block_on`-on-the-current-thread) a runtime
///   and block on `fut` directly.
/// - A runtime is already running on this thread: spawn a worker thread
///   with its own current-thread runtime and block on a channel carrying
///   the result back.
pub fn run_sync<F, T>(fut: F) -> Result<T, SyncBridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    run_sync_inner(fut, None)
}

/// Same as [`run_sync`], but refuses up front when called from within a
/// running runtime and a loop-bound resource was supplied — it cannot
/// safely cross into the worker thread's separate runtime.
pub fn run_sync_with_resource<F, T>(fut: F, resource: LoopBound) -> Result<T, SyncBridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    run_sync_inner(fut, Some(resource))
}

fn run_sync_inner<F, T>(fut: F, resource: Option<LoopBound>) -> Result<T, SyncBridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if tokio::runtime::Handle::try_current().is_err() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| SyncBridgeError::WorkerPanicked(err.to_string()))?;
        return Ok(runtime.block_on(fut));
    }

    if resource.is_some() {
        return Err(SyncBridgeError::LoopBoundResource);
    }

    let (tx, rx) = std_mpsc::channel();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = tx.send(Err(SyncBridgeError::WorkerPanicked(err.to_string())));
                return;
            }
        };
        let output = runtime.block_on(fut);
        let _ = tx.send(Ok(output));
    });

    rx.recv()
        .map_err(|err| SyncBridgeError::WorkerPanicked(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_from_a_thread_with_no_runtime() {
        let result = run_sync(async { 2 + 2 });
        assert_eq!(result.unwrap(), 4);
    }

    #[tokio::test]
    async fn spawns_a_worker_thread_when_already_inside_a_runtime() {
        let result = tokio::task::spawn_blocking(|| run_sync(async { "done" }))
            .await
            .unwrap();
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn refuses_loop_bound_resource_inside_a_running_runtime() {
        let result = tokio::task::spawn_blocking(|| {
            run_sync_with_resource(async { 1 }, LoopBound)
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(SyncBridgeError::LoopBoundResource)));
    }
}
