//! Atomic counters for runtime observability.
//!
//! All counters use relaxed ordering; they are diagnostic only.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-runtime operation counters.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    /// Threads spawned through `create`.
    pub threads_created: AtomicU64,
    /// Threads whose exit value was consumed by `join`.
    pub threads_joined: AtomicU64,
    /// Successful `detach` calls.
    pub threads_detached: AtomicU64,
    /// Threads that reached the exited state (spawned or adopted).
    pub threads_exited: AtomicU64,
    /// `lock` calls that had to block.
    pub mutex_contended: AtomicU64,
    /// Condition waits entered (timed or not).
    pub cond_waits: AtomicU64,
    /// Timed waits that hit their deadline.
    pub cond_timeouts: AtomicU64,
    /// TLS destructor invocations.
    pub destructors_run: AtomicU64,
}

impl RuntimeMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threads_created: AtomicU64::new(0),
            threads_joined: AtomicU64::new(0),
            threads_detached: AtomicU64::new(0),
            threads_exited: AtomicU64::new(0),
            mutex_contended: AtomicU64::new(0),
            cond_waits: AtomicU64::new(0),
            cond_timeouts: AtomicU64::new(0),
            destructors_run: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            threads_created: Self::get(&self.threads_created),
            threads_joined: Self::get(&self.threads_joined),
            threads_detached: Self::get(&self.threads_detached),
            threads_exited: Self::get(&self.threads_exited),
            mutex_contended: Self::get(&self.mutex_contended),
            cond_waits: Self::get(&self.cond_waits),
            cond_timeouts: Self::get(&self.cond_timeouts),
            destructors_run: Self::get(&self.destructors_run),
        }
    }
}

/// Point-in-time copy of [`RuntimeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub threads_created: u64,
    pub threads_joined: u64,
    pub threads_detached: u64,
    pub threads_exited: u64,
    pub mutex_contended: u64,
    pub cond_waits: u64,
    pub cond_timeouts: u64,
    pub destructors_run: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Runtime Metrics:")?;
        writeln!(f, "  Threads created:  {}", self.threads_created)?;
        writeln!(f, "  Threads joined:   {}", self.threads_joined)?;
        writeln!(f, "  Threads detached: {}", self.threads_detached)?;
        writeln!(f, "  Threads exited:   {}", self.threads_exited)?;
        writeln!(f, "  Contended locks:  {}", self.mutex_contended)?;
        writeln!(f, "  Cond waits:       {}", self.cond_waits)?;
        writeln!(f, "  Cond timeouts:    {}", self.cond_timeouts)?;
        write!(f, "  Destructors run:  {}", self.destructors_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = RuntimeMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_is_visible_in_snapshot() {
        let m = RuntimeMetrics::new();
        RuntimeMetrics::inc(&m.threads_created);
        RuntimeMetrics::inc(&m.threads_created);
        RuntimeMetrics::inc(&m.cond_timeouts);
        let snap = m.snapshot();
        assert_eq!(snap.threads_created, 2);
        assert_eq!(snap.cond_timeouts, 1);
        assert_eq!(snap.threads_joined, 0);
    }

    #[test]
    fn display_lists_every_counter() {
        let text = RuntimeMetrics::new().snapshot().to_string();
        assert!(text.contains("Threads created"));
        assert!(text.contains("Destructors run"));
    }
}
