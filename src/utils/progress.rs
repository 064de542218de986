// src/utils/progress.rs - Progress reporting for long analysis runs
//
// Two complementary surfaces: an optional fraction-complete callback
// invoked after each item is fully classified, and a single packed-atomic
// progress record that a concurrently-polling reader can snapshot without
// ever observing a torn update.
use log::warn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Invoked with the fraction of merchant items fully classified so far.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// (processed, total) packed into one AtomicU64: both halves always move
/// together, so readers polling from another thread see a consistent pair.
#[derive(Debug, Default)]
pub struct AtomicProgress(AtomicU64);

impl AtomicProgress {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn store(&self, processed: usize, total: usize) {
        let packed = ((processed as u64 & 0xFFFF_FFFF) << 32) | (total as u64 & 0xFFFF_FFFF);
        self.0.store(packed, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> (usize, usize) {
        let packed = self.0.load(Ordering::SeqCst);
        ((packed >> 32) as usize, (packed & 0xFFFF_FFFF) as usize)
    }

    pub fn fraction(&self) -> f64 {
        let (processed, total) = self.snapshot();
        if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64
        }
    }
}

/// Update the sink and fire the callback. A panicking callback is
/// contained and logged; it never aborts the run.
pub fn report_progress(
    sink: &AtomicProgress,
    callback: &Option<ProgressCallback>,
    processed: usize,
    total: usize,
) {
    sink.store(processed, total);
    if let Some(cb) = callback {
        let fraction = if total == 0 { 1.0 } else { processed as f64 / total as f64 };
        if catch_unwind(AssertUnwindSafe(|| cb(fraction))).is_err() {
            warn!("Progress callback panicked; continuing run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn packed_snapshot_round_trips() {
        let progress = AtomicProgress::new();
        progress.store(37, 120);
        assert_eq!(progress.snapshot(), (37, 120));
        assert!((progress.fraction() - 37.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_has_zero_fraction() {
        let progress = AtomicProgress::new();
        assert_eq!(progress.fraction(), 0.0);
    }

    #[test]
    fn callback_receives_fractions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let callback: ProgressCallback = Arc::new(move |fraction| {
            assert!((0.0..=1.0).contains(&fraction));
            calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let sink = AtomicProgress::new();
        report_progress(&sink, &Some(callback), 1, 4);
        report_progress(&sink, &None, 2, 4);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(sink.snapshot(), (2, 4));
    }

    #[test]
    fn panicking_callback_does_not_abort() {
        let callback: ProgressCallback = Arc::new(|_| panic!("listener bug"));
        let sink = AtomicProgress::new();
        report_progress(&sink, &Some(callback), 3, 4);
        assert_eq!(sink.snapshot(), (3, 4));
    }
}
