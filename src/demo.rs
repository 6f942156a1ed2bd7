//! Demo instruments wired up by the binary
//!
//! A gauge reporting a random request count and a probe that flips between
//! healthy and unhealthy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::health::{HealthCheck, HealthCheckResult};
use crate::metrics::Gauge;

/// Message carried by an unhealthy [`RandomHealthCheck`]
pub const UNHEALTHY_MESSAGE: &str = "Remote api is down!";

/// Gauge values are drawn from `0..RANDOM_GAUGE_BOUND`
pub const RANDOM_GAUGE_BOUND: i64 = 100;

type SharedRng = Arc<Mutex<Box<dyn RngCore + Send>>>;

fn shared_rng(rng: impl RngCore + Send + 'static) -> SharedRng {
    Arc::new(Mutex::new(Box::new(rng)))
}

/// Random integer in `0..100` on every read
#[derive(Clone)]
pub struct RandomGauge {
    rng: SharedRng,
}

impl RandomGauge {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: shared_rng(rng),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn value(&self) -> i64 {
        self.rng.lock().gen_range(0..RANDOM_GAUGE_BOUND)
    }

    /// Gauge reading this generator
    pub fn into_gauge(self) -> Gauge {
        Gauge::from_fn(move || self.value())
    }
}

enum Outcome {
    Random(SharedRng),
    Toggle(AtomicBool),
}

/// Probe that is healthy about half the time
pub struct RandomHealthCheck {
    outcome: Outcome,
}

impl RandomHealthCheck {
    /// Coin flip per check
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            outcome: Outcome::Random(shared_rng(rng)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Alternate healthy, unhealthy, healthy, ...
    pub fn alternating() -> Self {
        Self {
            outcome: Outcome::Toggle(AtomicBool::new(true)),
        }
    }
}

impl HealthCheck for RandomHealthCheck {
    fn check(&self) -> anyhow::Result<HealthCheckResult> {
        let healthy = match &self.outcome {
            Outcome::Random(rng) => rng.lock().gen_bool(0.5),
            Outcome::Toggle(next) => next.fetch_xor(true, Ordering::SeqCst),
        };

        Ok(if healthy {
            HealthCheckResult::healthy()
        } else {
            HealthCheckResult::unhealthy(UNHEALTHY_MESSAGE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::GaugeValue;

    #[test]
    fn test_random_gauge_range() {
        let gauge = RandomGauge::new(StdRng::seed_from_u64(3)).into_gauge();
        for _ in 0..200 {
            match gauge.value().unwrap() {
                GaugeValue::Integer(v) => assert!((0..RANDOM_GAUGE_BOUND).contains(&v)),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn test_random_gauge_is_reproducible() {
        let a = RandomGauge::new(StdRng::seed_from_u64(9));
        let b = RandomGauge::new(StdRng::seed_from_u64(9));
        let xs: Vec<i64> = (0..10).map(|_| a.value()).collect();
        let ys: Vec<i64> = (0..10).map(|_| b.value()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_alternating_check() {
        let check = RandomHealthCheck::alternating();
        let results: Vec<bool> = (0..4).map(|_| check.check().unwrap().healthy).collect();
        assert_eq!(results, vec![true, false, true, false]);

        let unhealthy = check.check().and_then(|_| check.check()).unwrap();
        assert_eq!(unhealthy.message.as_deref(), Some(UNHEALTHY_MESSAGE));
    }

    #[test]
    fn test_random_check_mixes() {
        let check = RandomHealthCheck::new(StdRng::seed_from_u64(11));
        let healthy = (0..200)
            .filter(|_| check.check().unwrap().healthy)
            .count();
        assert!(healthy > 0 && healthy < 200);
    }
}
