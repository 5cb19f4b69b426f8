use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{Result, TvError};
use crate::signal::{SIGNAL_LEN, SUBTOTAL_LEN};

/// What one worker owns for the lifetime of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    pub id: usize,
    /// Its slab of the signal buffer, aligned to the subtotal groups.
    pub signal_range: Range<usize>,
}

impl WorkerContext {
    fn new(id: usize, count: usize) -> Self {
        let boundary = |k: usize| SIGNAL_LEN * k / count / SUBTOTAL_LEN * SUBTOTAL_LEN;
        let end = if id + 1 == count { SIGNAL_LEN } else { boundary(id + 1) };
        Self {
            id,
            signal_range: boundary(id)..end,
        }
    }
}

pub struct WorkerPool {
    pool: ThreadPool,
    contexts: Vec<WorkerContext>,
}

impl WorkerPool {
    /// Build a pool of `threads` workers, or one per available core.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let count = match threads {
            Some(0) => return Err(TvError::InvalidThreadCount),
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(count)
            .thread_name(|i| format!("analogtv-{i}"))
            .build()?;
        let contexts = (0..count).map(|id| WorkerContext::new(id, count)).collect();
        debug!(workers = count, "worker pool ready");

        Ok(Self { pool, contexts })
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn contexts(&self) -> &[WorkerContext] {
        &self.contexts
    }

    /// Run `task` once per worker with that worker's part, and wait for
    /// all of them.
    pub fn run_partitioned<T, F>(&self, parts: Vec<T>, task: F)
    where
        T: Send,
        F: Fn(&WorkerContext, T) + Sync,
    {
        assert!(parts.len() <= self.contexts.len(), "more parts than workers");
        let task = &task;
        self.pool.scope(|scope| {
            for (ctx, part) in self.contexts.iter().zip(parts) {
                scope.spawn(move |_| task(ctx, part));
            }
        });
    }
}

/// Deal `items` to `workers` round-robin: worker k gets k, k+W, k+2W...
pub fn interleave<T>(items: impl IntoIterator<Item = T>, workers: usize) -> Vec<Vec<T>> {
    let mut parts: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (n, item) in items.into_iter().enumerate() {
        parts[n % workers].push(item);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn slabs_cover_the_signal() {
        let pool = WorkerPool::new(Some(7)).unwrap();
        let mut next = 0;
        for ctx in pool.contexts() {
            assert_eq!(ctx.signal_range.start, next);
            assert_eq!(ctx.signal_range.start % SUBTOTAL_LEN, 0);
            next = ctx.signal_range.end;
        }
        assert_eq!(next, SIGNAL_LEN);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(WorkerPool::new(Some(0)), Err(TvError::InvalidThreadCount)));
    }

    #[test]
    fn every_part_runs_once() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        let total = AtomicUsize::new(0);
        pool.run_partitioned(vec![1, 2, 3], |_, n| {
            total.fetch_add(n, Ordering::Relaxed);
        });
        assert_eq!(total.into_inner(), 6);
    }

    #[test]
    fn interleave_deals_round_robin() {
        assert_eq!(interleave(0..7, 3), vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }
}
