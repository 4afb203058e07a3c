//! Block reassembly buffers.
//!
//! Samples arrive in transport-sized chunks while the enhancement stages
//! need exact block sizes. A [`WindowBuffer`] fills a main area of the block
//! size; input past a full block is carried in a remainder area and seeds
//! the next cycle.

/// Reassembles fixed-size blocks from arbitrarily sized chunks.
///
/// Each [`push`](WindowBuffer::push) hands out at most one full block.
/// Nothing is dropped or duplicated: samples not yet handed out stay in
/// the main area or the remainder.
#[derive(Debug, Clone)]
pub struct WindowBuffer<T> {
    capacity: usize,
    block: Vec<T>,
    remainder: Vec<T>,
}

impl<T: Copy> WindowBuffer<T> {
    /// Create a buffer producing blocks of `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "block size must be non-zero");
        Self {
            capacity,
            block: Vec::with_capacity(capacity),
            remainder: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples held and not yet handed out.
    pub fn buffered(&self) -> usize {
        self.block.len() + self.remainder.len()
    }

    /// Append `input`; return a full block if one completed.
    ///
    /// When the main area is empty the carried remainder is copied in first.
    /// Input that does not fit goes to the remainder.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_core::audio::WindowBuffer;
    ///
    /// let mut buffer = WindowBuffer::new(4);
    /// assert_eq!(buffer.push(&[1, 2, 3]), None);
    /// assert_eq!(buffer.push(&[4, 5]), Some(vec![1, 2, 3, 4]));
    /// assert_eq!(buffer.buffered(), 1);
    /// ```
    pub fn push(&mut self, input: &[T]) -> Option<Vec<T>> {
        if self.block.is_empty() && !self.remainder.is_empty() {
            let take = self.remainder.len().min(self.capacity);
            self.block.extend(self.remainder.drain(..take));
        }

        let space = self.capacity - self.block.len();
        if input.len() < space {
            self.block.extend_from_slice(input);
            return None;
        }

        self.block.extend_from_slice(&input[..space]);
        self.remainder.extend_from_slice(&input[space..]);
        let full = std::mem::replace(&mut self.block, Vec::with_capacity(self.capacity));
        Some(full)
    }

    /// Drop all buffered samples.
    pub fn clear(&mut self) {
        self.block.clear();
        self.remainder.clear();
    }
}

/// Two lock-stepped window buffers for paired streams.
///
/// Yields `(first, second)` blocks only when both sides have a full block,
/// keeping the pairing aligned even if chunk sizes differ.
#[derive(Debug, Clone)]
pub struct PairedWindow<T> {
    first: WindowBuffer<T>,
    second: WindowBuffer<T>,
    ready_first: Vec<Vec<T>>,
    ready_second: Vec<Vec<T>>,
}

impl<T: Copy> PairedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            first: WindowBuffer::new(capacity),
            second: WindowBuffer::new(capacity),
            ready_first: Vec::new(),
            ready_second: Vec::new(),
        }
    }

    /// Append one chunk to each side; return a block pair if one completed.
    pub fn push(&mut self, first: &[T], second: &[T]) -> Option<(Vec<T>, Vec<T>)> {
        if let Some(block) = self.first.push(first) {
            self.ready_first.push(block);
        }
        if let Some(block) = self.second.push(second) {
            self.ready_second.push(block);
        }
        if self.ready_first.is_empty() || self.ready_second.is_empty() {
            return None;
        }
        Some((self.ready_first.remove(0), self.ready_second.remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fill_emits_immediately() {
        let mut buffer = WindowBuffer::new(3);
        assert_eq!(buffer.push(&[1, 2, 3]), Some(vec![1, 2, 3]));
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_remainder_seeds_next_block() {
        let mut buffer = WindowBuffer::new(4);
        assert_eq!(buffer.push(&[1, 2, 3, 4, 5, 6]), Some(vec![1, 2, 3, 4]));
        assert_eq!(buffer.buffered(), 2);
        assert_eq!(buffer.push(&[7]), None);
        assert_eq!(buffer.push(&[8, 9]), Some(vec![5, 6, 7, 8]));
        assert_eq!(buffer.buffered(), 1);
    }

    #[test]
    fn test_one_block_per_push_even_for_large_chunks() {
        let mut buffer = WindowBuffer::new(2);
        assert_eq!(buffer.push(&[1, 2, 3, 4, 5]), Some(vec![1, 2]));
        assert_eq!(buffer.push(&[]), Some(vec![3, 4]));
        assert_eq!(buffer.push(&[]), None);
        assert_eq!(buffer.push(&[6]), Some(vec![5, 6]));
    }

    #[test]
    fn test_clear() {
        let mut buffer = WindowBuffer::new(4);
        buffer.push(&[1, 2, 3, 4, 5]);
        buffer.clear();
        assert_eq!(buffer.buffered(), 0);
        assert_eq!(buffer.push(&[9, 9, 9]), None);
    }

    #[test]
    fn test_stethoscope_frame_sizes() {
        // 60-sample chunks into 256-sample blocks
        let mut buffer = WindowBuffer::new(256);
        let chunk: Vec<i16> = (0..60).collect();
        let emitted = (0..64).filter_map(|_| buffer.push(&chunk)).count();
        assert_eq!(emitted, 15);
        assert_eq!(buffer.buffered(), 64 * 60 - 15 * 256);
    }

    #[test]
    fn test_paired_window_keeps_alignment() {
        let mut paired = PairedWindow::new(4);
        assert_eq!(paired.push(&[1, 2], &[10, 20]), None);
        assert_eq!(
            paired.push(&[3, 4], &[30, 40]),
            Some((vec![1, 2, 3, 4], vec![10, 20, 30, 40]))
        );

        // uneven sides still pair block n with block n
        let mut paired = PairedWindow::new(2);
        assert_eq!(paired.push(&[1, 2], &[]), None);
        assert_eq!(paired.push(&[3, 4], &[10]), None);
        assert_eq!(paired.push(&[], &[20, 30]), Some((vec![1, 2], vec![10, 20])));
    }
}
