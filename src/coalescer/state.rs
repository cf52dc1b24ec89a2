use std::collections::{HashMap, HashSet};

use crate::variant_key::VariantKey;

/// The outcome `add()` reports to the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Newly buffered, or already buffered/processing from an earlier call.
    Queued { in_progress: bool, attempts: u32 },
    /// `retry_counts[key] >= R_max`; not buffered.
    RetryExceeded,
}

/// The in-memory state: the pending buffer, the two in-flight key
/// sets, and the retry counter. Every mutation happens under the coalescer's
/// single state lock; this type itself enforces no locking, it only
/// keeps the three scopes consistent with each other.
#[derive(Debug, Default)]
pub struct CoalescerState {
    buffer: Vec<VariantKey>,
    pending_keys: HashSet<VariantKey>,
    processing_keys: HashSet<VariantKey>,
    retry_counts: HashMap<VariantKey, u32>,
}

impl CoalescerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_count(&self, key: &VariantKey) -> u32 {
        self.retry_counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_in_flight(&self, key: &VariantKey) -> bool {
        self.pending_keys.contains(key) || self.processing_keys.contains(key)
    }

    /// `(in_flight, attempts)` for `poll`: reported independent of
    /// whether the key is currently buffered or mid-batch.
    pub fn status(&self, key: &VariantKey) -> (bool, u32) {
        (self.is_in_flight(key), self.retry_count(key))
    }

    /// Admission logic. Does not dispatch; the caller decides
    /// whether the resulting buffer length crosses `B_max`.
    pub fn admit(&mut self, key: VariantKey, retry_max: u32) -> Admission {
        let attempts = self.retry_count(&key);
        if attempts >= retry_max {
            return Admission::RetryExceeded;
        }

        if self.is_in_flight(&key) {
            return Admission::Queued {
                in_progress: true,
                attempts,
            };
        }

        self.pending_keys.insert(key.clone());
        self.buffer.push(key);
        Admission::Queued {
            in_progress: false,
            attempts,
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn in_progress_count(&self) -> usize {
        self.pending_keys.len() + self.processing_keys.len()
    }

    pub fn in_progress_keys(&self) -> Vec<String> {
        self.pending_keys
            .iter()
            .chain(self.processing_keys.iter())
            .map(|key| key.as_str().to_string())
            .collect()
    }

    /// Dispatch: snapshot and clear the buffer, moving every key from
    /// `pending_keys` to `processing_keys`. Returns an empty vec if there was
    /// nothing buffered; callers should treat that as "nothing to dispatch".
    pub fn take_batch(&mut self) -> Vec<VariantKey> {
        let batch = std::mem::take(&mut self.buffer);
        for key in &batch {
            self.pending_keys.remove(key);
            self.processing_keys.insert(key.clone());
        }
        batch
    }

    /// Completion callback on success: keys leave `processing_keys` and
    /// their retry counters are dropped entirely (a later re-submission of a
    /// previously-failed-then-succeeded key starts clean, though in practice
    /// success also lands the key in the cache so it never re-enters here).
    pub fn complete_success(&mut self, keys: &[VariantKey]) {
        for key in keys {
            self.processing_keys.remove(key);
            self.retry_counts.remove(key);
        }
    }

    /// Completion callback on failure: keys leave `processing_keys` and
    /// every key's retry counter is incremented by one.
    pub fn complete_failure(&mut self, keys: &[VariantKey]) {
        for key in keys {
            self.processing_keys.remove(key);
            *self.retry_counts.entry(key.clone()).or_insert(0) += 1;
        }
    }

    /// Drains the buffer for shutdown without touching `pending_keys`; the
    /// caller dispatches the result as one final batch.
    pub fn drain(&mut self) -> Vec<VariantKey> {
        self.take_batch()
    }
}
