//! Deadline wrapper bounding arbitrary asynchronous actions.
//!
//! Independent of the manager and reusable on its own: any fallible
//! future can be wrapped. Expiry never cancels the wrapped action —
//! the action is spawned as a task and keeps running detached; only
//! its result goes unobserved.

use std::future::Future;
use std::time::Duration;

use crate::error::{BoxError, Error, Result};

/// Bound `action` by `limit`.
///
/// The action is spawned as a task and raced against a timer:
///
/// - If the action settles first, its own success or failure is
///   returned unchanged in the inner `Result`.
/// - If the timer fires first, a timeout error carrying `limit` is
///   returned and the spawned task is left running. An action that
///   produces a resource after its deadline has expired leaks that
///   resource: nothing is waiting for the result anymore.
///
/// A panic inside the action is resumed here, so a panicking action
/// behaves the same wrapped or unwrapped.
///
/// # Errors
/// The outer `Result` only ever fails with a timeout error.
pub async fn within<T, F>(limit: Duration, action: F) -> Result<std::result::Result<T, BoxError>>
where
    T: Send + 'static,
    F: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
{
    let mut task = tokio::spawn(action);
    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(settled)) => Ok(settled),
        Ok(Err(join)) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        // Not a panic and never aborted: the runtime is shutting down.
        // Surface it as the action's own failure.
        Ok(Err(join)) => Ok(Err(join.into())),
        Err(_elapsed) => Err(Error::timeout(limit)),
    }
}

/// Apply [`within`] when a limit is configured; pass straight through
/// otherwise. Without a limit the action runs in place, unspawned.
pub async fn maybe_within<T, F>(
    limit: Option<Duration>,
    action: F,
) -> Result<std::result::Result<T, BoxError>>
where
    T: Send + 'static,
    F: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
{
    match limit {
        Some(limit) => within(limit, action).await,
        None => Ok(action.await),
    }
}
