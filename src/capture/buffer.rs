//! Rolling buffer of recent audio chunks
//!
//! Bounded to the most recent N chunks; insertion evicts the oldest. The
//! recorder is the sole writer; wake-word checks read overlapping windows
//! without consuming anything.

use std::collections::VecDeque;

/// One encoded audio chunk
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic sequence number, starting at 0
    pub seq: u64,
    /// Encoded bytes
    pub data: Vec<u8>,
}

/// Bounded ring of the most recent chunks, in arrival order
#[derive(Debug)]
pub struct ChunkBuffer {
    chunks: VecDeque<AudioChunk>,
    capacity: usize,
    next_seq: u64,
}

impl ChunkBuffer {
    /// Create a buffer holding up to `capacity` chunks
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Append a chunk, evicting the oldest when full
    ///
    /// Returns the chunk's sequence number.
    pub fn push(&mut self, data: Vec<u8>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(AudioChunk { seq, data });
        seq
    }

    /// The most recent `n` chunk payloads in arrival order, or `None` if
    /// fewer than `n` chunks are buffered
    ///
    /// Non-destructive: the chunks stay buffered.
    #[must_use]
    pub fn latest_window(&self, n: usize) -> Option<Vec<Vec<u8>>> {
        if n == 0 || self.chunks.len() < n {
            return None;
        }
        Some(
            self.chunks
                .iter()
                .skip(self.chunks.len() - n)
                .map(|c| c.data.clone())
                .collect(),
        )
    }

    /// Number of buffered chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Configured capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered chunks, oldest first
    pub fn chunks(&self) -> impl Iterator<Item = &AudioChunk> {
        self.chunks.iter()
    }
}
