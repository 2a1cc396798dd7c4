use std::collections::HashMap;
use std::sync::Mutex;

use crate::lifecycle::sequence::{SequenceError, SequenceKey, SequenceStore};

/// Counter table keyed by `(training type, issuer, year, month)`.
///
/// The upsert, increment and read of a bucket happen under one lock, which
/// stands in for the database-level atomic increment.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<SequenceKey, u64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SequenceKey, u64>>, SequenceError> {
        self.counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("sequence mutex poisoned".to_string()))
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn increment(&self, key: &SequenceKey) -> Result<u64, SequenceError> {
        let mut counters = self.lock()?;
        let last_number = counters.entry(key.clone()).or_insert(0);
        *last_number = last_number
            .checked_add(1)
            .ok_or_else(|| SequenceError::Exhausted(key.clone()))?;
        Ok(*last_number)
    }

    fn current(&self, key: &SequenceKey) -> Result<Option<u64>, SequenceError> {
        Ok(self.lock()?.get(key).copied())
    }

    fn reset_for_new_period(&self, key: &SequenceKey) -> Result<(), SequenceError> {
        self.lock()?.insert(key.clone(), 0);
        Ok(())
    }

    fn release(&self, key: &SequenceKey, number: u64) -> Result<bool, SequenceError> {
        let mut counters = self.lock()?;
        match counters.get_mut(key) {
            Some(last_number) if *last_number == number && number > 0 => {
                *last_number -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::domain::TrainingTypeId;
    use crate::lifecycle::sequence::CertificateNumberGenerator;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn key(month: u32) -> SequenceKey {
        SequenceKey::new(TrainingTypeId(5), "DGCA", 2025, month).expect("valid key")
    }

    #[test]
    fn increment_creates_missing_bucket() {
        let store = InMemorySequenceStore::new();
        assert_eq!(store.current(&key(3)).expect("readable"), None);
        assert_eq!(store.increment(&key(3)).expect("increments"), 1);
        assert_eq!(store.increment(&key(3)).expect("increments"), 2);
        assert_eq!(store.current(&key(3)).expect("readable"), Some(2));
    }

    #[test]
    fn buckets_are_independent_per_period() {
        let store = InMemorySequenceStore::new();
        store.increment(&key(3)).expect("increments");
        store.increment(&key(3)).expect("increments");
        assert_eq!(store.increment(&key(4)).expect("increments"), 1);
    }

    #[test]
    fn reset_zeroes_bucket() {
        let store = InMemorySequenceStore::new();
        store.increment(&key(3)).expect("increments");
        store.reset_for_new_period(&key(3)).expect("resets");
        assert_eq!(store.current(&key(3)).expect("readable"), Some(0));
        assert_eq!(store.increment(&key(3)).expect("increments"), 1);
    }

    #[test]
    fn release_only_returns_the_last_number() {
        let store = InMemorySequenceStore::new();
        store.increment(&key(3)).expect("increments");
        store.increment(&key(3)).expect("increments");

        assert!(!store.release(&key(3), 1).expect("readable"));
        assert!(store.release(&key(3), 2).expect("readable"));
        assert_eq!(store.increment(&key(3)).expect("increments"), 2);
        assert!(!store.release(&key(4), 1).expect("readable"));
    }

    #[test]
    fn three_concurrent_calls_receive_one_two_three() {
        let generator = CertificateNumberGenerator::new(Arc::new(InMemorySequenceStore::new()));

        let numbers: BTreeSet<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let generator = generator.clone();
                    scope.spawn(move || {
                        generator
                            .next_number(TrainingTypeId(5), "DGCA", 2025, 3)
                            .expect("number issued")
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .collect()
        });

        assert_eq!(numbers, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn many_concurrent_calls_are_gapless() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 50;
        let generator = CertificateNumberGenerator::new(Arc::new(InMemorySequenceStore::new()));

        let issued: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let generator = generator.clone();
                    scope.spawn(move || {
                        (0..PER_THREAD)
                            .map(|_| {
                                generator
                                    .next_number(TrainingTypeId(5), "dgca", 2025, 3)
                                    .expect("number issued")
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("thread completes"))
                .collect()
        });

        let unique: BTreeSet<u64> = issued.iter().copied().collect();
        assert_eq!(issued.len() as u64, THREADS * PER_THREAD);
        assert_eq!(unique, (1..=THREADS * PER_THREAD).collect::<BTreeSet<_>>());
    }
}
