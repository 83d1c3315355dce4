//! Thread-safe PCM sample queue between a producer and a consumer.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A thread-safe queue of PCM samples bridging a producer (microphone capture
/// or remote audio decoder) and a consumer (network sender or speaker
/// playback).
///
/// The internal buffer is the only structure in a session touched from more
/// than one thread; every read-modify-write happens under the lock. `push`
/// never blocks. A bounded bridge drops the oldest samples on overflow so a
/// stalled consumer cannot grow memory without limit.
pub struct AudioBridge {
    frame_len: usize,
    max_samples: Option<usize>,
    buffer: Mutex<VecDeque<i16>>,
}

impl AudioBridge {
    /// Create an unbounded bridge with the given samples-per-unit for
    /// `drain`.
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            max_samples: None,
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a bridge bounded to `max_samples`; overflow drops the oldest
    /// samples first.
    pub fn bounded(frame_len: usize, max_samples: usize) -> Self {
        Self {
            frame_len,
            max_samples: Some(max_samples),
            buffer: Mutex::new(VecDeque::with_capacity(max_samples)),
        }
    }

    /// Samples per unit returned by `drain`.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Append samples at the tail. Never blocks.
    pub fn push(&self, samples: &[i16]) {
        let mut buffer = self.buffer.lock();
        buffer.extend(samples.iter().copied());
        if let Some(max) = self.max_samples {
            let overflow = buffer.len().saturating_sub(max);
            if overflow > 0 {
                buffer.drain(..overflow);
                tracing::warn!(dropped = overflow, "audio bridge overflow, dropping oldest samples");
            }
        }
    }

    /// Remove and return exactly `n` samples in FIFO order, for playback
    /// consumers that need fixed-size blocks.
    ///
    /// When fewer than `n` samples are buffered, returns an all-zero silence
    /// block of `n` samples and consumes nothing, so an audio device never
    /// stalls on underrun.
    pub fn pop(&self, n: usize) -> Vec<i16> {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= n {
            buffer.drain(..n).collect()
        } else {
            vec![0; n]
        }
    }

    /// Remove and return the next unit of up to `frame_len` samples, or
    /// `None` when empty. Non-blocking; for streaming-send consumers.
    pub fn drain(&self) -> Option<Vec<i16>> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            return None;
        }
        let take = buffer.len().min(self.frame_len);
        Some(buffer.drain(..take).collect())
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether the bridge holds no samples.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Discard all buffered samples.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}
