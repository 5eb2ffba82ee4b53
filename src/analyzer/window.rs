//! Sliding analysis window over the most recent samples of a channel.
//!
//! New samples overwrite the oldest once the window is full, so the window
//! always holds the latest `capacity` samples.  Unlike a queue, reading the
//! window does not consume it: the next block slides it forward.
//!
//! # Example
//!
//! ```rust
//! use pitch_tap::analyzer::SampleWindow;
//!
//! let mut win = SampleWindow::new(4);
//! win.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items → capacity 4 → oldest dropped
//! let mut out = Vec::new();
//! win.copy_ordered(&mut out);
//! assert_eq!(out, vec![2.0, 3.0, 4.0, 5.0]);
//! ```

// ---------------------------------------------------------------------------
// SampleWindow
// ---------------------------------------------------------------------------

/// A fixed-capacity circular window.
///
/// Generic over `T: Copy + Default`, though the analyzers use
/// `SampleWindow<f32>` exclusively.  Never allocates beyond its initial
/// capacity.
pub struct SampleWindow<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> SampleWindow<T> {
    /// Create an empty window holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SampleWindow capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Slide the window forward by `data`.
    ///
    /// Only the last `capacity` items of `data` can survive, so longer
    /// blocks skip straight to their tail.
    pub fn push_slice(&mut self, data: &[T]) {
        let skip = data.len().saturating_sub(self.capacity);
        for &item in &data[skip..] {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Replace the contents of `out` with the stored samples, oldest first.
    pub fn copy_ordered(&self, out: &mut Vec<T>) {
        out.clear();
        if self.len < self.capacity {
            // Never wrapped: valid data starts at 0.
            out.extend_from_slice(&self.buf[..self.len]);
        } else {
            // Full: the oldest sample sits where the next write would go.
            out.extend_from_slice(&self.buf[self.write_pos..]);
            out.extend_from_slice(&self.buf[..self.write_pos]);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once `capacity` samples have been pushed.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(win: &SampleWindow<f32>) -> Vec<f32> {
        let mut out = Vec::new();
        win.copy_ordered(&mut out);
        out
    }

    #[test]
    fn partial_window_keeps_insertion_order() {
        let mut win = SampleWindow::new(8);
        win.push_slice(&[1.0_f32, 2.0, 3.0]);
        assert_eq!(win.len(), 3);
        assert!(!win.is_full());
        assert_eq!(ordered(&win), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn overflow_slides_oldest_out() {
        let mut win = SampleWindow::new(3);
        win.push_slice(&[1.0_f32, 2.0, 3.0]);
        win.push_slice(&[4.0, 5.0]);
        assert!(win.is_full());
        assert_eq!(ordered(&win), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn block_longer_than_capacity_keeps_tail() {
        let mut win = SampleWindow::new(4);
        win.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(ordered(&win), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn reading_does_not_consume() {
        let mut win = SampleWindow::new(4);
        win.push_slice(&[1.0_f32, 2.0]);
        let _ = ordered(&win);
        assert_eq!(win.len(), 2);
        assert_eq!(ordered(&win), vec![1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "SampleWindow capacity must be > 0")]
    fn zero_capacity_panics() {
        let _win: SampleWindow<f32> = SampleWindow::new(0);
    }
}
