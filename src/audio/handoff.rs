// Sample handoff - lock-free transfer from the capture thread
//
// The capture callback must never block or allocate, and the detection
// loop only cares about the most recent window of audio. A single SPSC
// ring buffer (rtrb) carries raw mono samples:
//
// - SampleProducer: owned by the capture callback, pushes what fits and
//   counts the overflow instead of waiting
// - SampleWindow: owned by the detection side, drains everything pending
//   into a rolling window of the latest `window_size` samples
//
// Frames that arrive faster than the loop ticks are simply overwritten in
// the rolling window; stale audio is never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

/// Default ring capacity: one second at 48 kHz
pub const DEFAULT_RING_CAPACITY: usize = 48_000;

/// Create a connected producer/window pair
///
/// # Panics
/// Panics if `capacity` or `window_size` is 0
pub fn sample_handoff(capacity: usize, window_size: usize) -> (SampleProducer, SampleWindow) {
    assert!(capacity > 0, "capacity must be greater than 0");
    assert!(window_size > 0, "window_size must be greater than 0");

    let (producer, consumer) = RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));

    (
        SampleProducer {
            producer,
            dropped: Arc::clone(&dropped),
        },
        SampleWindow {
            consumer,
            window: vec![0.0; window_size],
            write_pos: 0,
            filled: 0,
            fresh: 0,
            dropped,
        },
    )
}

/// Real-time side of the handoff
pub struct SampleProducer {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

impl SampleProducer {
    /// Push the first channel of interleaved frames; returns how many fit
    ///
    /// `convert` maps device samples to f32. Samples are written straight
    /// into the ring, so nothing is allocated on the capture thread.
    pub fn push_interleaved<T, F>(&mut self, data: &[T], channels: usize, convert: F) -> usize
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        self.push_iter(
            frames,
            data.chunks_exact(channels).map(|frame| convert(frame[0])),
        )
    }

    fn push_iter<I: Iterator<Item = f32>>(&mut self, count: usize, iter: I) -> usize {
        let writable = count.min(self.producer.slots());
        let written = match self.producer.write_chunk_uninit(writable) {
            Ok(chunk) => chunk.fill_from_iter(iter),
            Err(_) => 0,
        };
        if written < count {
            self.dropped
                .fetch_add((count - written) as u64, Ordering::Relaxed);
        }
        written
    }
}

/// Detection side of the handoff
pub struct SampleWindow {
    consumer: Consumer<f32>,
    window: Vec<f32>,
    write_pos: usize,
    filled: usize,
    fresh: usize,
    dropped: Arc<AtomicU64>,
}

impl SampleWindow {
    /// Samples lost because the ring was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Move everything pending into the rolling window
    ///
    /// Returns the number of samples drained.
    pub fn drain(&mut self) -> usize {
        let available = self.consumer.slots();
        if available == 0 {
            return 0;
        }
        let chunk = match self.consumer.read_chunk(available) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };

        let size = self.window.len();
        let (first, second) = chunk.as_slices();
        for &sample in first.iter().chain(second.iter()) {
            self.window[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % size;
        }
        chunk.commit_all();

        self.filled = (self.filled + available).min(size);
        self.fresh = self.fresh.saturating_add(available);
        available
    }

    /// Latest full window in chronological order
    ///
    /// Returns `None` until the window has been filled once, and when no new
    /// samples arrived since the previous call.
    pub fn latest_frame(&mut self) -> Option<Vec<f32>> {
        self.drain();
        if self.filled < self.window.len() || self.fresh == 0 {
            return None;
        }
        self.fresh = 0;

        let mut frame = Vec::with_capacity(self.window.len());
        frame.extend_from_slice(&self.window[self.write_pos..]);
        frame.extend_from_slice(&self.window[..self.write_pos]);
        Some(frame)
    }
}
