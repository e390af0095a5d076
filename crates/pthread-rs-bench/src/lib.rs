//! Shared sample bookkeeping for the pthread-rs benchmarks.
//!
//! Criterion drives the timing; [`BenchStats`] additionally keeps per-sample
//! ns/op figures so each bench can print one machine-readable summary line.

use std::time::Duration;

use pthread_rs_core::config::runtime_config;

#[derive(Default)]
pub struct BenchStats {
    samples_ns_per_op: Vec<f64>,
    total_iters: u64,
    total_ns: u128,
}

impl BenchStats {
    pub fn record(&mut self, iters: u64, dur: Duration) {
        let ns = dur.as_nanos();
        self.total_iters = self.total_iters.saturating_add(iters);
        self.total_ns = self.total_ns.saturating_add(ns);
        self.samples_ns_per_op.push(ns as f64 / iters.max(1) as f64);
    }

    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples_ns_per_op.len()
    }

    /// Summary line: `<TAG> bench=<label> samples=N p50_ns_op=.. p95_ns_op=..`.
    #[must_use]
    pub fn summary(&self, tag: &str, bench_label: &str) -> Option<String> {
        let mut samples = self.samples_ns_per_op.clone();
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let throughput_ops_s = if self.total_ns == 0 {
            0.0
        } else {
            (self.total_iters as f64) / (self.total_ns as f64 / 1e9)
        };
        Some(format!(
            "{tag} bench={bench_label} samples={} p50_ns_op={:.3} p95_ns_op={:.3} p99_ns_op={:.3} mean_ns_op={mean:.3} throughput_ops_s={throughput_ops_s:.3}",
            samples.len(),
            percentile_sorted(&samples, 0.50),
            percentile_sorted(&samples, 0.95),
            percentile_sorted(&samples, 0.99),
        ))
    }

    pub fn report(&self, tag: &str, bench_label: &str) {
        if let Some(line) = self.summary(tag, bench_label) {
            println!("{line}");
        }
    }
}

#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&p));
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Print the effective runtime configuration once per bench binary.
pub fn print_env_metadata_once(tag: &str) {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let cfg = runtime_config();
        println!(
            "{tag}_META max_threads={} keys_max={} destructor_iterations={} stack_size={}",
            cfg.max_threads,
            cfg.keys_max,
            cfg.destructor_iterations,
            cfg.stack_size.map_or_else(|| "<default>".to_string(), |s| s.to_string())
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_picks_nearest_rank() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&s, 0.0), 1.0);
        assert_eq!(percentile_sorted(&s, 0.5), 3.0);
        assert_eq!(percentile_sorted(&s, 1.0), 5.0);
        assert_eq!(percentile_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn summary_needs_samples() {
        let mut stats = BenchStats::default();
        assert!(stats.summary("T", "x").is_none());
        stats.record(10, Duration::from_nanos(100));
        stats.record(0, Duration::from_nanos(5));
        let line = stats.summary("T", "x").unwrap();
        assert!(line.starts_with("T bench=x samples=2 "));
        assert_eq!(stats.samples(), 2);
    }
}
