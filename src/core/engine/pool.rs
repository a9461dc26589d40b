// src/core/engine/pool.rs

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Runs `tasks` with at most `limit` in flight, yielding outputs in completion order.
///
/// Every task checks `exhausted` right before it starts; once the flag is up the
/// remaining tasks are dropped without being polled. Tasks already running are left
/// to finish.
///
/// # Arguments
/// * `tasks` - Lazy futures. Nothing inside them runs until the pool starts them.
/// * `limit` - Maximum number of concurrently running tasks, clamped to at least 1.
/// * `exhausted` - The scan's one-way budget flag.
pub fn run_bounded<'a, I, Fut>(tasks: I, limit: usize, exhausted: &'a AtomicBool) -> impl Stream<Item = Fut::Output> + 'a
where
    I: IntoIterator<Item = Fut>,
    I::IntoIter: 'a,
    Fut: Future + 'a,
{
    stream::iter(tasks)
        .map(move |task| async move {
            if exhausted.load(Ordering::Acquire) {
                trace!("Budget exhausted, skipping task.");
                return None;
            }
            Some(task.await)
        })
        .buffer_unordered(limit.max(1))
        .filter_map(futures::future::ready)
}

/// Items gathered from a stream within a time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gathered<T> {
    pub items: Vec<T>,
    /// `true` when the budget ran out before the stream ended.
    pub cut_short: bool,
}

/// Drains `stream` until it ends or `budget` elapses.
///
/// Items yielded before the budget ran out are kept; work still in flight at that
/// point is dropped. Multi-query probes use this so a slow tail never costs them the
/// findings they already have.
pub async fn collect_within<S>(stream: S, budget: Duration) -> Gathered<S::Item>
where
    S: Stream,
{
    let deadline = Instant::now() + budget;
    let mut stream = std::pin::pin!(stream);
    let mut items = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => return Gathered { items, cut_short: false },
            Err(_) => {
                debug!(kept = items.len(), ?budget, "Collection budget spent, keeping partial results.");
                return Gathered { items, cut_short: true };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let flag = AtomicBool::new(false);
        let tasks = (0..20).map(|i| {
            let running = &running;
            let peak = &peak;
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });
        let mut out: Vec<i32> = run_bounded(tasks, 4, &flag).collect().await;
        out.sort();
        assert_eq!(out, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn raised_flag_skips_unstarted_tasks() {
        let flag = AtomicBool::new(false);
        let started = AtomicUsize::new(0);
        let tasks = (0..10).map(|_| {
            let flag = &flag;
            let started = &started;
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                flag.store(true, Ordering::Release);
            }
        });
        let done: Vec<()> = run_bounded(tasks, 1, &flag).collect().await;
        assert_eq!(done.len(), 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let flag = AtomicBool::new(false);
        let out: Vec<u8> = run_bounded([async { 1u8 }], 0, &flag).collect().await;
        assert_eq!(out, vec![1]);
    }

    #[tokio::test]
    async fn slow_tail_keeps_earlier_items() {
        let steps = stream::iter([5u64, 10, 15, 5_000, 20])
            .map(|ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            })
            .buffered(1);
        let gathered = collect_within(steps, Duration::from_millis(500)).await;
        assert_eq!(gathered.items, vec![5, 10, 15]);
        assert!(gathered.cut_short);
    }

    #[tokio::test]
    async fn finished_stream_is_not_cut_short() {
        let gathered = collect_within(stream::iter([1, 2, 3]), Duration::from_secs(1)).await;
        assert_eq!(gathered, Gathered { items: vec![1, 2, 3], cut_short: false });
    }
}
