//! Bounded rolling window of recent game output.

use std::collections::VecDeque;
use std::fmt;

/// Default number of chunks retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 12;

/// Text the game produced between two read boundaries. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk(String);

impl OutputChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// FIFO of output chunks; the oldest entry is evicted once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    chunks: VecDeque<OutputChunk>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// A capacity of zero is raised to one so the latest chunk is always visible.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn append(&mut self, chunk: OutputChunk) {
        self.chunks.push_back(chunk);
        while self.chunks.len() > self.capacity {
            self.chunks.pop_front();
        }
    }

    /// The most recent `n` chunks, oldest first.
    pub fn window(&self, n: usize) -> impl DoubleEndedIterator<Item = &OutputChunk> {
        let skip = self.chunks.len().saturating_sub(n);
        self.chunks.iter().skip(skip)
    }

    /// The most recent `n` chunks joined by newlines.
    pub fn joined_window(&self, n: usize) -> String {
        self.window(n)
            .map(OutputChunk::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
