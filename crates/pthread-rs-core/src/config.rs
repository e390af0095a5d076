//! Runtime limits.
//!
//! Defaults can be overridden through the environment:
//! - `PTHREAD_RS_MAX_THREADS`: live spawned threads before `create` fails
//!   with `ResourceExhausted` (default 1024).
//! - `PTHREAD_RS_KEYS_MAX`: live TLS keys (default 1024).
//! - `PTHREAD_RS_DESTRUCTOR_ITERATIONS`: destructor passes at thread exit
//!   (default 4).
//! - `PTHREAD_RS_STACK_SIZE`: OS stack size in bytes for spawned threads
//!   (default: platform choice).
//!
//! Unparseable or zero values fall back to the default.

use std::sync::OnceLock;

/// Maximum number of live TLS keys, as in `<limits.h>`.
pub const PTHREAD_KEYS_MAX: usize = 1024;
/// Destructor passes run at thread exit, as in `<limits.h>`.
pub const PTHREAD_DESTRUCTOR_ITERATIONS: usize = 4;
/// Default cap on concurrently live spawned threads.
pub const DEFAULT_MAX_THREADS: usize = 1024;

/// Limits a [`crate::Runtime`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_threads: usize,
    pub keys_max: usize,
    pub destructor_iterations: usize,
    pub stack_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            keys_max: PTHREAD_KEYS_MAX,
            destructor_iterations: PTHREAD_DESTRUCTOR_ITERATIONS,
            stack_size: None,
        }
    }
}

impl RuntimeConfig {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).and_then(|v| parse_positive(&v));
        Self {
            max_threads: read("PTHREAD_RS_MAX_THREADS").unwrap_or(defaults.max_threads),
            keys_max: read("PTHREAD_RS_KEYS_MAX").unwrap_or(defaults.keys_max),
            destructor_iterations: read("PTHREAD_RS_DESTRUCTOR_ITERATIONS")
                .unwrap_or(defaults.destructor_iterations),
            stack_size: read("PTHREAD_RS_STACK_SIZE"),
        }
    }

    #[must_use]
    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    #[must_use]
    pub const fn with_keys_max(mut self, keys_max: usize) -> Self {
        self.keys_max = keys_max;
        self
    }

    #[must_use]
    pub const fn with_destructor_iterations(mut self, iterations: usize) -> Self {
        self.destructor_iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_stack_size(mut self, stack_size: Option<usize>) -> Self {
        self.stack_size = stack_size;
        self
    }
}

fn parse_positive(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(v) => Some(v),
    }
}

static GLOBAL_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Environment-derived config (read on first call, cached thereafter).
#[must_use]
pub fn runtime_config() -> RuntimeConfig {
    *GLOBAL_CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(cfg, RuntimeConfig::default());
        assert_eq!(cfg.keys_max, PTHREAD_KEYS_MAX);
        assert_eq!(cfg.destructor_iterations, PTHREAD_DESTRUCTOR_ITERATIONS);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[
            ("PTHREAD_RS_MAX_THREADS", "8"),
            ("PTHREAD_RS_KEYS_MAX", " 16 "),
            ("PTHREAD_RS_DESTRUCTOR_ITERATIONS", "2"),
            ("PTHREAD_RS_STACK_SIZE", "65536"),
        ]));
        assert_eq!(cfg.max_threads, 8);
        assert_eq!(cfg.keys_max, 16);
        assert_eq!(cfg.destructor_iterations, 2);
        assert_eq!(cfg.stack_size, Some(65536));
    }

    #[test]
    fn zero_and_garbage_fall_back() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[
            ("PTHREAD_RS_MAX_THREADS", "0"),
            ("PTHREAD_RS_KEYS_MAX", "lots"),
            ("PTHREAD_RS_STACK_SIZE", "-1"),
        ]));
        assert_eq!(cfg.max_threads, DEFAULT_MAX_THREADS);
        assert_eq!(cfg.keys_max, PTHREAD_KEYS_MAX);
        assert_eq!(cfg.stack_size, None);
    }

    #[test]
    fn builder_overrides() {
        let cfg = RuntimeConfig::default()
            .with_max_threads(3)
            .with_keys_max(2)
            .with_destructor_iterations(1)
            .with_stack_size(Some(1 << 20));
        assert_eq!(cfg.max_threads, 3);
        assert_eq!(cfg.keys_max, 2);
        assert_eq!(cfg.destructor_iterations, 1);
        assert_eq!(cfg.stack_size, Some(1 << 20));
    }
}
