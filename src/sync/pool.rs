//! Bounded fan-out
//!
//! Runs one future per item with at most `limit` in flight, all on the
//! calling task. Results come back in item order.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// Map `items` through `f` with at most `limit` futures running at once
///
/// A `limit` of zero is treated as one.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    let f = &f;

    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire().await.ok();
            (index, f(item).await)
        })
        .collect();

    let mut results = Vec::with_capacity(pending.len());
    while let Some(result) = pending.next().await {
        results.push(result);
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
