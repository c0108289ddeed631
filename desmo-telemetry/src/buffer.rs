// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::data::Sample;
use desmo_common::MutexExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Hard cap on buffered samples; above it the oldest samples are dropped.
pub const MAX_BUFFER: usize = 10_000;

/// Thread-safe FIFO of pending samples with oldest-drop overflow.
///
/// Writers append under the mutex; a drain takes the whole contents
/// atomically, so any sample is observed by exactly one drain. The buffer is
/// process-wide and survives session churn; the coordinator clears it at
/// session start to discard residue from a crashed predecessor.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<VecDeque<Sample>>,
    dropped: AtomicU64,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn add(&self, sample: Sample) {
        let mut samples = self.samples.lock_or_panic();
        samples.push_back(sample);
        while samples.len() > MAX_BUFFER {
            samples.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a snapshot of the contents and atomically empty the buffer.
    pub fn drain(&self) -> Vec<Sample> {
        let mut samples = self.samples.lock_or_panic();
        samples.drain(..).collect()
    }

    pub fn clear(&self) {
        self.samples.lock_or_panic().clear();
    }

    pub fn is_not_empty(&self) -> bool {
        !self.samples.lock_or_panic().is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.lock_or_panic().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock_or_panic().is_empty()
    }

    /// Total samples discarded by overflow since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(ts: f64) -> Sample {
        Sample {
            ts,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_then_drain_preserves_order() {
        let buffer = SampleBuffer::new();
        for i in 0..100 {
            buffer.add(sample(i as f64));
        }
        assert_eq!(buffer.len(), 100);
        assert!(buffer.is_not_empty());

        let drained = buffer.drain();
        assert_eq!(drained.len(), 100);
        assert!(drained.windows(2).all(|w| w[0].ts < w[1].ts));
        assert_eq!(buffer.len(), 0);
        assert!(!buffer.is_not_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = SampleBuffer::new();
        let extra = 37;
        for i in 0..(MAX_BUFFER + extra) {
            buffer.add(sample(i as f64));
        }
        assert_eq!(buffer.len(), MAX_BUFFER);
        assert_eq!(buffer.dropped(), extra as u64);

        let drained = buffer.drain();
        assert_eq!(drained.len(), MAX_BUFFER);
        // The survivors are exactly the newest MAX_BUFFER samples, in order.
        assert_eq!(drained[0].ts, extra as f64);
        assert_eq!(drained[MAX_BUFFER - 1].ts, (MAX_BUFFER + extra - 1) as f64);
    }

    #[test]
    fn test_clear_discards_everything() {
        let buffer = SampleBuffer::new();
        buffer.add(sample(1.0));
        buffer.add(sample(2.0));
        buffer.clear();
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_concurrent_adds_and_drains_lose_nothing() {
        let buffer = Arc::new(SampleBuffer::new());
        let producers = 4;
        let per_producer = 1_000usize;

        let mut handles = Vec::new();
        for p in 0..producers {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..per_producer {
                    buffer.add(sample((p * per_producer + i) as f64));
                }
            }));
        }

        let drainer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    seen.extend(buffer.drain());
                    std::thread::yield_now();
                }
                seen
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        let mut seen = drainer.join().unwrap();
        seen.extend(buffer.drain());

        // Total adds stay below MAX_BUFFER, so nothing may be lost and
        // nothing observed twice.
        assert_eq!(seen.len(), producers * per_producer);
        let mut ids: Vec<u64> = seen.iter().map(|s| s.ts as u64).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), producers * per_producer);
        assert_eq!(buffer.dropped(), 0);
    }
}
