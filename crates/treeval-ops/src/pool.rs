//! Worker pool: the narrow interface the parallel fan-out path uses to
//! run disjoint chunks of work concurrently. A real production pool
//! (work-stealing, pinned threads, a thread-pool crate) is an external
//! collaborator and out of scope here; [`StdThreadPool`] is a minimal
//! default so the engine has something to run against without pulling
//! in another dependency.

/// A pool capable of running a batch of independent closures to
/// completion. Implementations decide how many of `jobs` run at once;
/// callers only rely on every job having completed when `join` returns.
pub trait WorkerPool {
    fn num_threads(&self) -> usize;

    /// Runs every job to completion, in any order, and waits for all of
    /// them before returning. Each job is `FnOnce` and runs exactly once.
    fn join<'a>(&self, jobs: Vec<Box<dyn FnOnce() + Send + 'a>>);
}

/// Scoped-thread pool backed by the standard library: spawns one thread
/// per job, bounded by `std::thread::available_parallelism`. Adequate
/// for the coarse-grained, CPU-bound sharding the collection operation
/// engine performs; a caller linking a real thread-pool crate can supply
/// its own [`WorkerPool`] instead.
pub struct StdThreadPool {
    threads: usize,
}

impl StdThreadPool {
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        StdThreadPool { threads }
    }

    pub fn with_threads(threads: usize) -> Self {
        StdThreadPool {
            threads: threads.max(1),
        }
    }
}

impl Default for StdThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for StdThreadPool {
    fn num_threads(&self) -> usize {
        self.threads
    }

    fn join<'a>(&self, jobs: Vec<Box<dyn FnOnce() + Send + 'a>>) {
        tracing::trace!(jobs = jobs.len(), threads = self.threads, "joining worker pool");
        std::thread::scope(|scope| {
            for job in jobs {
                scope.spawn(move || job());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_every_job_exactly_once() {
        let pool = StdThreadPool::with_threads(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<Box<dyn FnOnce() + Send>> = (0..10)
            .map(|_| {
                let counter = Arc::clone(&counter);
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            })
            .collect();
        pool.join(jobs);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
