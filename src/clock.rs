use std::time::{Duration, SystemTime};

/// Elapsed-time source consulted by the freshness evaluator. Swapping the
/// implementation makes age arithmetic deterministic in tests.
pub trait Clock: Send + Sync {
    fn since(&self, earlier: SystemTime) -> Duration;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn since(&self, earlier: SystemTime) -> Duration {
        SystemTime::now()
            .duration_since(earlier)
            .unwrap_or_default()
    }
}

/// Reports the same elapsed duration for every timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    elapsed: Duration,
}

impl FixedClock {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }
}

impl Clock for FixedClock {
    fn since(&self, _earlier: SystemTime) -> Duration {
        self.elapsed
    }
}
