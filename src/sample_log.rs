//! Shared, append-only record of every sample produced in a run.
//!
//! One producer appends; any number of readers take copies. A single mutex
//! guards the whole sequence, so a snapshot is always a prefix of the final
//! log and never contains a half-written sample.

use crate::sample::Sample;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Default)]
pub struct SharedSampleLog {
    inner: Arc<Mutex<Vec<Sample>>>,
}

impl SharedSampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    // Samples are Copy and pushes cannot leave the Vec half-updated, so a
    // poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// Independent copy of everything appended so far, in append order.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().clone()
    }

    /// Copy of samples from index `from` onwards, for readers that track
    /// how far they have already consumed.
    pub fn snapshot_from(&self, from: usize) -> Vec<Sample> {
        let guard = self.lock();
        guard.get(from..).map(<[Sample]>::to_vec).unwrap_or_default()
    }

    /// Final copy for persistence. Same contract as [`snapshot`](Self::snapshot);
    /// the lock is still taken even though the producer should be done.
    pub fn export(&self) -> Vec<Sample> {
        self.snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn anomaly_count(&self) -> usize {
        self.lock().iter().filter(|s| s.is_anomaly).count()
    }
}

impl std::fmt::Debug for SharedSampleLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSampleLog")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn append_then_snapshot_preserves_order() {
        let log = SharedSampleLog::new();
        for i in 0..5 {
            log.append(Sample::now(i as f64, i == 3));
        }
        let snap = log.snapshot();
        let values: Vec<f64> = snap.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(log.anomaly_count(), 1);
        assert_eq!(log.export(), snap);
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let log = SharedSampleLog::new();
        log.append(Sample::now(1.0, false));
        let snap = log.snapshot();
        log.append(Sample::now(2.0, false));
        assert_eq!(snap.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn snapshot_from_handles_out_of_range() {
        let log = SharedSampleLog::new();
        for i in 0..3 {
            log.append(Sample::now(i as f64, false));
        }
        assert_eq!(log.snapshot_from(1).len(), 2);
        assert!(log.snapshot_from(3).is_empty());
        assert!(log.snapshot_from(10).is_empty());
    }

    #[test]
    fn concurrent_readers_see_growing_prefixes() {
        const APPENDS: usize = 2_000;
        let log = SharedSampleLog::new();
        let completed = std::sync::Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let log = log.clone();
                let completed = completed.clone();
                thread::spawn(move || {
                    let mut last_len = 0;
                    loop {
                        let floor = completed.load(Ordering::SeqCst);
                        let snap = log.snapshot();
                        assert!(
                            snap.len() >= floor,
                            "snapshot shorter than completed appends"
                        );
                        assert!(snap.len() >= last_len, "snapshot shrank");
                        for (i, s) in snap.iter().enumerate() {
                            assert_eq!(s.value, i as f64, "duplicated or reordered sample");
                        }
                        last_len = snap.len();
                        if floor == APPENDS {
                            break;
                        }
                    }
                })
            })
            .collect();

        for i in 0..APPENDS {
            log.append(Sample::now(i as f64, false));
            completed.store(i + 1, Ordering::SeqCst);
        }

        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(log.len(), APPENDS);
    }

    #[test]
    fn poisoned_lock_still_readable() {
        let log = SharedSampleLog::new();
        log.append(Sample::now(1.0, false));
        let clone = log.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        log.append(Sample::now(2.0, false));
        assert_eq!(log.len(), 2);
    }
}
