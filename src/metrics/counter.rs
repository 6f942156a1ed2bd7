//! Counter metric

use std::sync::atomic::{AtomicI64, Ordering};

/// Signed running sum
///
/// The value is exactly the sum of all increments minus all decrements since
/// creation. Callers are expected to pair every decrement with an earlier
/// increment, so a correctly used counter never reads negative.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    /// Create a new counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by n
    pub fn inc_by(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrement by 1
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrement by n
    pub fn dec_by(&self, n: i64) {
        self.value.fetch_sub(n, Ordering::Relaxed);
    }

    /// Get current value
    pub fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        assert_eq!(counter.count(), 0);

        counter.inc();
        assert_eq!(counter.count(), 1);

        counter.inc_by(10);
        assert_eq!(counter.count(), 11);

        counter.dec();
        counter.dec_by(10);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let counter = Arc::new(Counter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.inc_by(2);
                        counter.dec();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.count(), 8 * 1000);
    }

    proptest! {
        #[test]
        fn prop_count_is_algebraic_sum(ops in proptest::collection::vec((any::<bool>(), 0i64..1_000), 0..200)) {
            let counter = Counter::new();
            let mut expected = 0i64;
            for (increment, n) in ops {
                if increment {
                    counter.inc_by(n);
                    expected += n;
                } else {
                    counter.dec_by(n);
                    expected -= n;
                }
            }
            prop_assert_eq!(counter.count(), expected);
        }
    }
}
