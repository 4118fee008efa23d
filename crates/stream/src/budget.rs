use std::time::Duration;

/// Fixed wall-clock budget for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    period: Duration,
}

impl TickBudget {
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "tick period must be positive");
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Fraction of the budget used by a tick that took `elapsed`.
    /// Exceeds 1.0 for late ticks.
    pub fn load(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() / self.period.as_secs_f64()
    }

    /// Time left to sleep before the next tick, if any.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.period.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

impl Default for TickBudget {
    fn default() -> Self {
        Self::new(Duration::from_millis(125))
    }
}

/// Rolling tick-duration history for load reporting.
#[derive(Debug, Clone)]
pub struct TickTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "timer capacity must be positive");
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        let count = if self.filled { self.capacity } else { self.index };
        &self.history[..count]
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.recorded().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    /// Rolling average load against `budget`.
    pub fn load(&self, budget: &TickBudget) -> f64 {
        budget.load(self.average())
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(32)
    }
}
