//! Non-interleaved PCM block as delivered to a tap.
//!
//! An [`AudioBuffer`] holds one `Vec<f32>` per channel plus the number of
//! valid frames.  Graph nodes hand these to the tap block on the render
//! thread; the tap may shorten `frame_length` but never touches the samples.
//!
//! # Example
//!
//! ```rust
//! use pitch_tap::audio::AudioBuffer;
//!
//! let mut buf = AudioBuffer::new(vec![vec![0.0; 8], vec![0.0; 8]], 48_000);
//! buf.truncate(4);
//! assert_eq!(buf.frame_length(), 4);
//! assert_eq!(buf.channel(1).len(), 4);
//! ```

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// A block of de-interleaved `f32` samples, one sub-vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    /// Sample rate of this block in Hz.
    sample_rate: u32,
    /// Number of valid frames (≤ the shortest channel).
    frame_length: usize,
}

impl AudioBuffer {
    /// Wrap per-channel sample vectors.
    ///
    /// `frame_length` starts at the length of the shortest channel so that
    /// every channel slice is always in bounds.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frame_length = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            channels,
            sample_rate,
            frame_length,
        }
    }

    /// Build a buffer from interleaved samples (`[L, R, L, R, …]`).
    ///
    /// A trailing partial frame is ignored.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        if channel_count == 0 {
            return Self::new(Vec::new(), sample_rate);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &sample) in channels.iter_mut().zip(frame) {
                ch.push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    /// Limit the number of valid frames to `max_frames`.
    ///
    /// Never grows the buffer: asking for more frames than are stored is a
    /// no-op.
    pub fn truncate(&mut self, max_frames: usize) {
        self.frame_length = self.frame_length.min(max_frames);
    }

    /// Number of channels in this block.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of valid frames per channel.
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The valid samples of channel `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= channel_count()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][..self.frame_length]
    }

    /// Iterate over the valid samples of every channel, in channel order.
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.channels.iter().map(|ch| &ch[..self.frame_length])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioBuffer>();
    }

    #[test]
    fn frame_length_is_shortest_channel() {
        let buf = AudioBuffer::new(vec![vec![0.0; 10], vec![0.0; 7]], 44_100);
        assert_eq!(buf.frame_length(), 7);
        assert_eq!(buf.channel(0).len(), 7);
    }

    #[test]
    fn truncate_never_grows() {
        let mut buf = AudioBuffer::new(vec![vec![1.0; 16]], 44_100);
        buf.truncate(4096);
        assert_eq!(buf.frame_length(), 16);

        buf.truncate(8);
        assert_eq!(buf.frame_length(), 8);
        assert_eq!(buf.channel(0), &[1.0; 8]);
    }

    #[test]
    fn from_interleaved_splits_channels() {
        let buf = AudioBuffer::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0], 2, 48_000);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.channel(0), &[1.0, 2.0]);
        assert_eq!(buf.channel(1), &[-1.0, -2.0]);
        assert_eq!(buf.sample_rate(), 48_000);
    }

    #[test]
    fn from_interleaved_zero_channels_is_empty() {
        let buf = AudioBuffer::from_interleaved(&[1.0, 2.0], 0, 48_000);
        assert_eq!(buf.channel_count(), 0);
        assert_eq!(buf.frame_length(), 0);
    }

    #[test]
    fn channels_iterator_respects_truncation() {
        let mut buf = AudioBuffer::new(vec![vec![0.5; 6], vec![0.25; 6]], 48_000);
        buf.truncate(2);
        let lens: Vec<usize> = buf.channels().map(<[f32]>::len).collect();
        assert_eq!(lens, vec![2, 2]);
    }
}
