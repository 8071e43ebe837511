//! Progress reporting for long-running lifecycle operations
//!
//! Operations report into nested bands: an update spends 35..95 of its range
//! on the nested install, which in turn spends 10..70 of *its* range on the
//! download. [`Monotonic`] sits between the bands and the caller so the
//! caller never sees progress go backwards and only sees 100 once the
//! operation has actually finished.

use std::sync::Mutex;

/// Receives `(percent, message)` updates, percent in `0.0..=100.0`
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: f32, message: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(f32, &str) + Send + Sync,
{
    fn report(&self, percent: f32, message: &str) {
        self(percent, message)
    }
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _percent: f32, _message: &str) {}
}

/// Highest value reported before [`Monotonic::complete`]
const CEILING_BEFORE_COMPLETE: f32 = 99.0;

/// Guards a caller's reporter: clamps, never decreases, withholds 100
pub(crate) struct Monotonic<'a> {
    inner: &'a dyn ProgressReporter,
    last: Mutex<f32>,
}

impl<'a> Monotonic<'a> {
    pub(crate) fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            last: Mutex::new(0.0),
        }
    }

    /// Report 100 with a final message
    pub(crate) fn complete(&self, message: &str) {
        if let Ok(mut last) = self.last.lock() {
            *last = 100.0;
        }
        self.inner.report(100.0, message);
    }
}

impl ProgressReporter for Monotonic<'_> {
    fn report(&self, percent: f32, message: &str) {
        let percent = if percent.is_nan() { 0.0 } else { percent };
        let value = {
            let Ok(mut last) = self.last.lock() else {
                return;
            };
            let value = percent.clamp(0.0, CEILING_BEFORE_COMPLETE).max(*last);
            *last = value;
            value
        };
        self.inner.report(value, message);
    }
}

/// Maps a local 0..100 range onto `start..end` of a parent reporter
#[derive(Clone, Copy)]
pub(crate) struct ProgressBand<'a> {
    sink: &'a dyn ProgressReporter,
    start: f32,
    end: f32,
}

impl<'a> ProgressBand<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressReporter) -> Self {
        Self {
            sink,
            start: 0.0,
            end: 100.0,
        }
    }

    /// Sub-band covering `start..end` of this band's local range
    pub(crate) fn sub(&self, start: f32, end: f32) -> ProgressBand<'a> {
        ProgressBand {
            sink: self.sink,
            start: self.map(start),
            end: self.map(end),
        }
    }

    pub(crate) fn report(&self, local_percent: f32, message: &str) {
        self.sink.report(self.map(local_percent), message);
    }

    fn map(&self, local_percent: f32) -> f32 {
        let fraction = local_percent.clamp(0.0, 100.0) / 100.0;
        self.start + (self.end - self.start) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<f32>>);

    impl ProgressReporter for Recorder {
        fn report(&self, percent: f32, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    impl Recorder {
        fn values(&self) -> Vec<f32> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_band_mapping_nests() {
        let recorder = Recorder::default();
        let band = ProgressBand::new(&recorder);
        let install = band.sub(35.0, 95.0);
        let download = install.sub(10.0, 70.0);

        download.report(0.0, "");
        download.report(100.0, "");
        install.report(100.0, "");

        assert_eq!(recorder.values(), vec![41.0, 77.0, 95.0]);
    }

    #[test]
    fn test_monotonic_never_decreases() {
        let recorder = Recorder::default();
        let monitor = Monotonic::new(&recorder);

        monitor.report(20.0, "");
        monitor.report(10.0, "");
        monitor.report(f32::NAN, "");
        monitor.report(50.0, "");

        assert_eq!(recorder.values(), vec![20.0, 20.0, 20.0, 50.0]);
    }

    #[test]
    fn test_monotonic_withholds_completion() {
        let recorder = Recorder::default();
        let monitor = Monotonic::new(&recorder);

        monitor.report(100.0, "");
        monitor.report(250.0, "");
        monitor.complete("done");

        assert_eq!(recorder.values(), vec![99.0, 99.0, 100.0]);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |percent: f32, message: &str| {
            seen.lock().unwrap().push((percent, message.to_string()));
        };
        ProgressBand::new(&reporter).report(50.0, "half");

        assert_eq!(seen.lock().unwrap()[0], (50.0, "half".to_string()));
    }
}
