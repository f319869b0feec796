//! The per-thread driver loop.

use super::metrics::DriverProbe;
use crate::source::Source;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag shared by a pipeline and all of its children.
///
/// Checked before every pull. A driver blocked inside `Source::wait` sees the
/// stop only once the source wakes it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Pull from `source` and feed `consumer` until the source closes or `stop`
/// is raised.
///
/// At most one blocking `wait` per iteration. A panic from `consumer`
/// unwinds straight out of here; the caller's completion step is skipped.
pub(crate) fn drive<S: Source>(
    source: &mut S,
    consumer: &(dyn Fn(S::Item) + Send + Sync),
    stop: &StopHandle,
    probe: &DriverProbe,
) {
    tracing::trace!(driver = probe.index(), "driver loop started");
    probe.start();

    loop {
        if stop.is_stopped() {
            tracing::debug!(driver = probe.index(), "driver loop stopped early");
            break;
        }
        if !source.has_value() {
            source.wait();
        }
        if source.is_closed() {
            break;
        }
        consumer(source.get());
        probe.record_item();
    }

    probe.finish();
    tracing::trace!(
        driver = probe.index(),
        items = probe.items(),
        "driver loop finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IterSource;
    use parking_lot::Mutex;

    #[test]
    fn test_drive_delivers_in_order() {
        let seen = Mutex::new(Vec::new());
        let probe = DriverProbe::new(0);
        let mut source = IterSource::new(vec![3, 1, 2]);

        drive(&mut source, &|v: i32| seen.lock().push(v), &StopHandle::new(), &probe);

        assert_eq!(*seen.lock(), vec![3, 1, 2]);
        assert_eq!(probe.items(), 3);
        assert!(probe.is_finished());
    }

    #[test]
    fn test_drive_honours_stop_before_pull() {
        let stop = StopHandle::new();
        stop.stop();
        let probe = DriverProbe::new(0);
        let mut source = IterSource::new(0..10);

        drive(&mut source, &|_: i32| panic!("nothing should be consumed"), &stop, &probe);

        assert_eq!(probe.items(), 0);
        assert!(probe.is_finished());
    }

    #[test]
    fn test_consumer_can_stop_mid_stream() {
        let stop = StopHandle::new();
        let probe = DriverProbe::new(0);
        let mut source = IterSource::new(0..10);
        let signal = stop.clone();

        drive(
            &mut source,
            &move |v: i32| {
                if v == 3 {
                    signal.stop();
                }
            },
            &stop,
            &probe,
        );

        assert_eq!(probe.items(), 4);
    }
}
