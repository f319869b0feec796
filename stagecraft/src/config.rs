//! Worker pool configuration.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`PoolOptions::workers`].
pub const WORKERS_ENV: &str = "STAGECRAFT_WORKERS";

const DEFAULT_THREAD_NAME: &str = "stagecraft-worker";

/// Options for building a [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Number of worker threads.
    pub workers: usize,
    /// Thread name prefix; each thread is named `{thread_name}-{index}`.
    pub thread_name: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PoolOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("invalid pool options: {}", e)))?;
        options.sanitize()?;
        Ok(options)
    }

    /// Defaults with `STAGECRAFT_WORKERS` applied when set.
    pub fn from_env() -> PipelineResult<Self> {
        let mut options = Self::default();
        if let Ok(raw) = std::env::var(WORKERS_ENV) {
            options.workers = raw.trim().parse().map_err(|e| {
                PipelineError::Config(format!(
                    "{} must be an integer, got {:?}: {}",
                    WORKERS_ENV, raw, e
                ))
            })?;
        }
        options.sanitize()?;
        Ok(options)
    }

    pub fn sanitize(&self) -> PipelineResult<()> {
        if self.workers == 0 {
            return Err(PipelineError::Config(
                "pool must have at least one worker".into(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(PipelineError::Config("thread_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = PoolOptions::default();
        assert!(options.workers >= 1);
        assert_eq!(options.thread_name, "stagecraft-worker");
        options.sanitize().unwrap();
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let options = PoolOptions::from_json(r#"{"workers": 3}"#).unwrap();
        assert_eq!(options.workers, 3);
        assert_eq!(options.thread_name, "stagecraft-worker");
    }

    #[test]
    fn test_from_json_rejects_zero_workers() {
        let err = PoolOptions::from_json(r#"{"workers": 0}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = PoolOptions::from_json("{workers:").unwrap_err();
        assert!(err.to_string().contains("invalid pool options"));
    }

    #[test]
    fn test_from_env_reads_worker_override() {
        // SAFETY: no other test in this crate reads or writes STAGECRAFT_WORKERS.
        unsafe { std::env::set_var(WORKERS_ENV, " 3 ") };
        let options = PoolOptions::from_env().unwrap();
        assert_eq!(options.workers, 3);
        assert_eq!(options.thread_name, "stagecraft-worker");

        unsafe { std::env::set_var(WORKERS_ENV, "many") };
        let err = PoolOptions::from_env().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains(WORKERS_ENV));

        unsafe { std::env::set_var(WORKERS_ENV, "0") };
        assert!(PoolOptions::from_env().is_err());

        unsafe { std::env::remove_var(WORKERS_ENV) };
        let options = PoolOptions::from_env().unwrap();
        assert_eq!(options, PoolOptions::default());
    }

    #[test]
    fn test_sanitize_rejects_blank_name() {
        let options = PoolOptions {
            workers: 1,
            thread_name: "  ".into(),
        };
        assert!(options.sanitize().is_err());
    }
}
