//! Batch job processor
//!
//! Fetches a batch when the queue runs dry, otherwise processes one job.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{Job, JobHandler, JobSource};
use crate::error::Result;
use crate::metrics::{self, Counter, Meter, MetricRegistry};

/// Counter of fetched but not yet processed jobs
pub const PENDING_METRIC: &str = "jobs.pending";

/// Meter marked for every failed job
pub const FAILED_METRIC: &str = "jobs.failed";

/// Prefix of the per-(customer, job type) completion meters
pub const COMPLETED_PREFIX: &str = "jobs.completed";

/// Pause after an empty batch before asking again
const IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// What one call to [`JobProcessor::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Queue was empty; this many jobs were fetched
    Fetched(usize),
    Completed(Job),
    Failed(Job),
}

/// Decrements the pending counter when dropped, whatever happened to the job
struct PendingGuard<'a>(&'a Counter);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Producer/consumer loop over a FIFO job queue
pub struct JobProcessor<S, H> {
    registry: Arc<MetricRegistry>,
    batch_size: usize,
    source: S,
    handler: H,
    queue: VecDeque<Job>,
    pending: Arc<Counter>,
    failed: Arc<Meter>,
    completed: DashMap<Job, Arc<Meter>>,
}

impl<S, H> std::fmt::Debug for JobProcessor<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProcessor")
            .field("batch_size", &self.batch_size)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<S: JobSource, H: JobHandler> JobProcessor<S, H> {
    /// Create a processor recording into `registry`
    ///
    /// Fails if `jobs.pending` or `jobs.failed` already exist as another
    /// metric variant.
    pub fn new(
        registry: Arc<MetricRegistry>,
        batch_size: usize,
        source: S,
        handler: H,
    ) -> Result<Self> {
        let pending = registry.counter(PENDING_METRIC)?;
        let failed = registry.meter(FAILED_METRIC)?;

        Ok(Self {
            registry,
            batch_size: batch_size.max(1),
            source,
            handler,
            queue: VecDeque::with_capacity(batch_size),
            pending,
            failed,
            completed: DashMap::new(),
        })
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> &Counter {
        &self.pending
    }

    /// Completion meter for `job`'s (customer, job type) pair, created on first use
    pub fn completed_meter(&self, job: &Job) -> Result<Arc<Meter>> {
        if let Some(meter) = self.completed.get(job) {
            return Ok(Arc::clone(meter.value()));
        }
        let name = metrics::name(
            COMPLETED_PREFIX,
            &[job.customer.as_str(), job.job_type.as_str()],
        );
        let meter = self.registry.meter(&name)?;
        self.completed.insert(*job, Arc::clone(&meter));
        Ok(meter)
    }

    /// Run one iteration of the loop
    pub async fn step(&mut self) -> Result<StepOutcome> {
        let Some(job) = self.queue.pop_front() else {
            let batch = self.source.fetch(self.batch_size);
            let fetched = batch.len();
            self.queue.extend(batch);
            self.pending.inc_by(fetched as i64);
            debug!(fetched, "Fetched job batch");
            return Ok(StepOutcome::Fetched(fetched));
        };

        let outcome = {
            let _done = PendingGuard(&self.pending);
            match self.handler.handle(&job).await {
                Ok(()) => StepOutcome::Completed(job),
                Err(e) => {
                    warn!(job = %job, error = %e, "Job failed");
                    StepOutcome::Failed(job)
                }
            }
        };

        match outcome {
            StepOutcome::Completed(job) => self.completed_meter(&job)?.mark(),
            StepOutcome::Failed(_) => self.failed.mark(),
            StepOutcome::Fetched(_) => {}
        }
        Ok(outcome)
    }

    /// Run exactly `steps` iterations
    pub async fn run_steps(&mut self, steps: usize) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps);
        for _ in 0..steps {
            outcomes.push(self.step().await?);
        }
        Ok(outcomes)
    }

    /// Loop until `token` is cancelled
    pub async fn run(mut self, token: CancellationToken) -> Result<()> {
        info!(batch_size = self.batch_size, "Starting job processor");

        loop {
            let outcome = tokio::select! {
                _ = token.cancelled() => break,
                outcome = self.step() => outcome?,
            };

            if outcome == StepOutcome::Fetched(0) {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        info!(queued = self.queue.len(), "Job processor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{Customer, JobType, RandomJobSource, SimulatedHandler};
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn ok_handler(_: &Job) -> anyhow::Result<()> {
        Ok(())
    }

    /// Every pair once, then `Acme/Import` for the rest of the batch
    fn scripted_batch(batch_size: usize) -> Vec<Job> {
        let mut jobs: Vec<Job> = Customer::ALL
            .iter()
            .flat_map(|&c| JobType::ALL.iter().map(move |&t| Job::new(c, t)))
            .collect();
        while jobs.len() < batch_size {
            jobs.push(Job::new(Customer::Acme, JobType::Import));
        }
        jobs.truncate(batch_size);
        jobs
    }

    fn meter_count(registry: &MetricRegistry, name: &str) -> u64 {
        registry.meter(name).unwrap().count()
    }

    #[tokio::test]
    async fn test_batch_drains_to_zero() {
        let registry = Arc::new(MetricRegistry::new());
        let mut processor = JobProcessor::new(
            Arc::clone(&registry),
            50,
            scripted_batch,
            ok_handler,
        )
        .unwrap();

        assert_eq!(processor.step().await.unwrap(), StepOutcome::Fetched(50));
        assert_eq!(processor.pending().count(), 50);
        assert_eq!(processor.queued(), 50);

        processor.run_steps(50).await.unwrap();
        assert_eq!(processor.pending().count(), 0);
        assert_eq!(processor.queued(), 0);

        for customer in Customer::ALL {
            for job_type in JobType::ALL {
                let name = format!("jobs.completed.{}.{}", customer, job_type);
                let expected = if (customer, job_type) == (Customer::Acme, JobType::Import) {
                    42
                } else {
                    1
                };
                assert_eq!(meter_count(&registry, &name), expected, "{}", name);
            }
        }
        assert_eq!(meter_count(&registry, FAILED_METRIC), 0);
    }

    #[tokio::test]
    async fn test_counter_tracks_queue() {
        let registry = Arc::new(MetricRegistry::new());
        let mut processor =
            JobProcessor::new(registry, 5, scripted_batch, ok_handler).unwrap();

        for _ in 0..23 {
            processor.step().await.unwrap();
            assert_eq!(processor.pending().count(), processor.queued() as i64);
        }
    }

    #[tokio::test]
    async fn test_failure_still_decrements() {
        let registry = Arc::new(MetricRegistry::new());
        let source = |n: usize| vec![Job::new(Customer::Globex, JobType::Export); n];
        let handler = |job: &Job| -> anyhow::Result<()> { anyhow::bail!("cannot process {}", job) };
        let mut processor = JobProcessor::new(Arc::clone(&registry), 3, source, handler).unwrap();

        let outcomes = processor.run_steps(4).await.unwrap();
        assert_eq!(outcomes[0], StepOutcome::Fetched(3));
        assert!(outcomes[1..].iter().all(|o| matches!(o, StepOutcome::Failed(_))));

        assert_eq!(processor.pending().count(), 0);
        assert_eq!(meter_count(&registry, FAILED_METRIC), 3);
        assert!(registry.get("jobs.completed.globex.export").is_err());
    }

    #[tokio::test]
    async fn test_meters_are_cached() {
        let registry = Arc::new(MetricRegistry::new());
        let processor = JobProcessor::new(Arc::clone(&registry), 1, scripted_batch, ok_handler).unwrap();
        let job = Job::new(Customer::Initech, JobType::Report);

        let first = processor.completed_meter(&job).unwrap();
        let second = processor.completed_meter(&job).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("jobs.completed.initech.report").is_ok());
    }

    #[tokio::test]
    async fn test_name_conflict() {
        let registry = Arc::new(MetricRegistry::new());
        registry.meter(PENDING_METRIC).unwrap();
        let result = JobProcessor::new(registry, 1, scripted_batch, ok_handler);
        assert_matches!(result, Err(crate::error::Error::TypeMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let registry = Arc::new(MetricRegistry::new());
        let processor = JobProcessor::new(
            Arc::clone(&registry),
            10,
            RandomJobSource::seeded(42),
            SimulatedHandler::new(StdRng::seed_from_u64(42), Duration::from_millis(2), 0.1),
        )
        .unwrap();

        let token = CancellationToken::new();
        let task = tokio::spawn(processor.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        task.await.unwrap().unwrap();

        let mut completed: HashMap<String, u64> = HashMap::new();
        for (name, metric) in registry.snapshot() {
            if let crate::metrics::Metric::Meter(meter) = metric {
                if name.starts_with(COMPLETED_PREFIX) {
                    completed.insert(name, meter.count());
                }
            }
        }
        let done: u64 = completed.values().sum::<u64>() + meter_count(&registry, FAILED_METRIC);
        assert!(done > 0);

        let pending = registry.counter(PENDING_METRIC).unwrap().count();
        assert!((0..=10).contains(&pending));
    }
}
