use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverMetrics {
    pub index: usize,
    pub items: u64,
    /// `None` while the driver has not finished.
    pub duration_ms: Option<u128>,
}

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub drivers: Vec<DriverMetrics>,
}

impl RunMetrics {
    pub fn total_items(&self) -> u64 {
        self.drivers.iter().map(|driver| driver.items).sum()
    }

    /// Whether every driver has left its loop.
    pub fn finished(&self) -> bool {
        !self.drivers.is_empty() && self.drivers.iter().all(|d| d.duration_ms.is_some())
    }

    pub fn driver(&self, index: usize) -> Option<&DriverMetrics> {
        self.drivers.iter().find(|driver| driver.index == index)
    }
}

#[derive(Debug, Default)]
struct Timing {
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

/// Live counters for one driver loop, written by the driving thread.
#[derive(Debug)]
pub(crate) struct DriverProbe {
    index: usize,
    items: AtomicU64,
    timing: Mutex<Timing>,
}

impl DriverProbe {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            items: AtomicU64::new(0),
            timing: Mutex::new(Timing::default()),
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn start(&self) {
        self.timing.lock().started = Some(Instant::now());
    }

    pub(crate) fn record_item(&self) {
        self.items.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finish(&self) {
        let mut timing = self.timing.lock();
        timing.elapsed = timing.started.map(|started| started.elapsed());
    }

    pub(crate) fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.timing.lock().elapsed.is_some()
    }

    pub(crate) fn snapshot(&self) -> DriverMetrics {
        DriverMetrics {
            index: self.index,
            items: self.items(),
            duration_ms: self.timing.lock().elapsed.map(|d| d.as_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_snapshot() {
        let probe = DriverProbe::new(2);
        probe.start();
        probe.record_item();
        probe.record_item();
        assert!(!probe.is_finished());
        assert_eq!(probe.snapshot().duration_ms, None);

        probe.finish();
        let snapshot = probe.snapshot();
        assert_eq!(snapshot.index, 2);
        assert_eq!(snapshot.items, 2);
        assert!(snapshot.duration_ms.is_some());
    }

    #[test]
    fn test_run_metrics_totals() {
        let metrics = RunMetrics {
            drivers: vec![
                DriverMetrics {
                    index: 0,
                    items: 3,
                    duration_ms: Some(1),
                },
                DriverMetrics {
                    index: 1,
                    items: 4,
                    duration_ms: None,
                },
            ],
        };
        assert_eq!(metrics.total_items(), 7);
        assert!(!metrics.finished());
        assert_eq!(metrics.driver(1).map(|d| d.items), Some(4));
    }
}
