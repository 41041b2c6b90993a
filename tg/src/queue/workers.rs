//! Worker pool metrics used for ETA estimates

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::config::QueueConfig;

use super::types::Eta;

/// Metrics supplied by the execution worker pool
pub trait WorkerPool: Send + Sync {
    /// Workers currently servicing the queue
    fn active_workers(&self) -> usize;

    /// Average minutes spent on one request
    fn average_service_minutes(&self) -> f64;
}

/// Worker pool with a configured service time and an adjustable size
#[derive(Debug)]
pub struct FixedWorkerPool {
    workers: AtomicUsize,
    average_service_minutes: f64,
}

impl FixedWorkerPool {
    pub fn new(workers: usize, average_service_minutes: f64) -> Self {
        debug!(workers, average_service_minutes, "FixedWorkerPool::new: called");
        Self {
            workers: AtomicUsize::new(workers),
            average_service_minutes,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.workers, config.average_service_minutes)
    }

    /// Workers coming online or going offline
    pub fn set_active_workers(&self, workers: usize) {
        debug!(workers, "FixedWorkerPool::set_active_workers: called");
        self.workers.store(workers, Ordering::SeqCst);
    }
}

impl WorkerPool for FixedWorkerPool {
    fn active_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    fn average_service_minutes(&self) -> f64 {
        self.average_service_minutes
    }
}

/// Estimate the wait for a 1-based queue position
///
/// `ceil(position / workers) * average_service_minutes`, or `WithinCycle`
/// when the position is already covered by the active workers.
pub fn estimate_eta(position: usize, pool: &dyn WorkerPool) -> Eta {
    let workers = pool.active_workers();
    if workers == 0 {
        return Eta::Unknown;
    }
    if position <= workers {
        return Eta::WithinCycle;
    }

    let cycles = position.div_ceil(workers);
    Eta::Minutes(cycles as f64 * pool.average_service_minutes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_cycle() {
        let pool = FixedWorkerPool::new(3, 2.0);
        assert_eq!(estimate_eta(1, &pool), Eta::WithinCycle);
        assert_eq!(estimate_eta(3, &pool), Eta::WithinCycle);
    }

    #[test]
    fn test_whole_cycles() {
        let pool = FixedWorkerPool::new(3, 2.0);
        assert_eq!(estimate_eta(4, &pool), Eta::Minutes(4.0));
        assert_eq!(estimate_eta(6, &pool), Eta::Minutes(4.0));
        assert_eq!(estimate_eta(7, &pool), Eta::Minutes(6.0));
    }

    #[test]
    fn test_no_workers() {
        let pool = FixedWorkerPool::new(0, 2.0);
        assert_eq!(estimate_eta(1, &pool), Eta::Unknown);
    }

    #[test]
    fn test_pool_resizes() {
        let pool = FixedWorkerPool::from_config(&QueueConfig::default());
        assert_eq!(pool.active_workers(), 1);
        pool.set_active_workers(4);
        assert_eq!(estimate_eta(4, &pool), Eta::WithinCycle);
    }
}
