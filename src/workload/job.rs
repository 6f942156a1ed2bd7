//! Jobs and where they come from

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Job
// =============================================================================

/// Kind of work a job represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobType {
    Import,
    Export,
    Report,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Import, JobType::Export, JobType::Report];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Import => "import",
            JobType::Export => "export",
            JobType::Report => "report",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer a job is billed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Customer {
    Acme,
    Globex,
    Initech,
}

impl Customer {
    pub const ALL: [Customer; 3] = [Customer::Acme, Customer::Globex, Customer::Initech];

    pub fn as_str(&self) -> &'static str {
        match self {
            Customer::Acme => "acme",
            Customer::Globex => "globex",
            Customer::Initech => "initech",
        }
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Job {
    pub customer: Customer,
    pub job_type: JobType,
}

impl Job {
    pub fn new(customer: Customer, job_type: JobType) -> Self {
        Self { customer, job_type }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.customer, self.job_type)
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Supplies batches of jobs
pub trait JobSource: Send {
    /// Up to `batch_size` jobs; an empty batch means nothing is available
    fn fetch(&mut self, batch_size: usize) -> Vec<Job>;
}

impl<F> JobSource for F
where
    F: FnMut(usize) -> Vec<Job> + Send,
{
    fn fetch(&mut self, batch_size: usize) -> Vec<Job> {
        self(batch_size)
    }
}

/// Uniformly random customers and job types
#[derive(Debug)]
pub struct RandomJobSource<R> {
    rng: R,
}

impl<R: Rng + Send> RandomJobSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomJobSource<StdRng> {
    /// Reproducible source
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng + Send> JobSource for RandomJobSource<R> {
    fn fetch(&mut self, batch_size: usize) -> Vec<Job> {
        (0..batch_size)
            .map(|_| {
                let customer = Customer::ALL[self.rng.gen_range(0..Customer::ALL.len())];
                let job_type = JobType::ALL[self.rng.gen_range(0..JobType::ALL.len())];
                Job::new(customer, job_type)
            })
            .collect()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Does the work for one job
#[async_trait]
pub trait JobHandler: Send {
    async fn handle(&mut self, job: &Job) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> JobHandler for F
where
    F: FnMut(&Job) -> anyhow::Result<()> + Send,
{
    async fn handle(&mut self, job: &Job) -> anyhow::Result<()> {
        self(job)
    }
}

/// Sleeps a random latency and fails at a configured rate
#[derive(Debug)]
pub struct SimulatedHandler<R> {
    rng: R,
    max_latency: Duration,
    failure_rate: f64,
}

impl<R: Rng + Send> SimulatedHandler<R> {
    /// `failure_rate` is clamped to `0.0..=1.0`, and NaN counts as `0.0`
    pub fn new(rng: R, max_latency: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            rng,
            max_latency,
            failure_rate,
        }
    }
}

impl SimulatedHandler<StdRng> {
    pub fn from_entropy(max_latency: Duration, failure_rate: f64) -> Self {
        Self::new(StdRng::from_entropy(), max_latency, failure_rate)
    }
}

#[async_trait]
impl<R: Rng + Send> JobHandler for SimulatedHandler<R> {
    async fn handle(&mut self, job: &Job) -> anyhow::Result<()> {
        let max_micros = self.max_latency.as_micros() as u64;
        let latency = if max_micros == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.rng.gen_range(0..=max_micros))
        };
        let fails = self.rng.gen_bool(self.failure_rate);

        tokio::time::sleep(latency).await;

        if fails {
            anyhow::bail!("simulated failure processing {}", job);
        }
        Ok(())
    }
}
