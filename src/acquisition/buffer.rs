//! Lock-free ring buffer for scaled electrode samples
//!
//! Single producer (the probe's polling thread), any number of consumers.
//! Appends never block; a full buffer drops the new frame and counts an overflow.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One buffered read: every packet returned by a single FIFO read
#[derive(Debug, Clone)]
pub struct SampleFrame {
    /// Scaled samples in microvolts, packet-major (`channels` values per packet)
    pub samples: Vec<f32>,
    /// Number of channels per packet
    pub channels: u16,
    /// Hardware timestamp of each packet
    pub timestamps: Vec<u32>,
    /// Auxiliary/event code of the first packet
    pub event_code: u64,
    /// Index of the first packet since acquisition start
    pub sample_number: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl SampleFrame {
    pub fn new(
        samples: Vec<f32>,
        channels: u16,
        timestamps: Vec<u32>,
        event_code: u64,
        sample_number: u64,
        sequence: u32,
    ) -> Self {
        Self {
            samples,
            channels,
            timestamps,
            event_code,
            sample_number,
            sequence,
        }
    }

    /// Get number of packets in this frame
    pub fn packet_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Samples of one packet
    pub fn packet(&self, index: usize) -> Option<&[f32]> {
        let channels = self.channels as usize;
        self.samples.get(index * channels..(index + 1) * channels)
    }

    /// Get frame duration in microseconds
    pub fn duration_us(&self, sample_rate: u32) -> u64 {
        (self.packet_count() as u64 * 1_000_000) / sample_rate as u64
    }
}

/// Lock-free ring buffer for sample frames
pub struct RingBuffer {
    queue: ArrayQueue<SampleFrame>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a frame into the buffer
    /// Returns false if buffer is full (overflow)
    pub fn push(&self, frame: SampleFrame) -> bool {
        match self.queue.push(frame) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a frame from the buffer
    /// Returns None if buffer is empty (underrun)
    pub fn pop(&self) -> Option<SampleFrame> {
        match self.queue.pop() {
            Some(frame) => Some(frame),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Try to pop without counting underrun
    pub fn try_pop(&self) -> Option<SampleFrame> {
        self.queue.pop()
    }

    /// Drain every buffered frame
    pub fn drain(&self) -> Vec<SampleFrame> {
        let mut frames = Vec::with_capacity(self.queue.len());
        while let Some(frame) = self.queue.pop() {
            frames.push(frame);
        }
        frames
    }

    /// Discard buffered frames and reset statistics
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
        self.reset_stats();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.overflow_count.store(0, Ordering::Relaxed);
        self.underrun_count.store(0, Ordering::Relaxed);
    }

    /// Get fill level as fraction of capacity
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }
}

/// Thread-safe handle to a ring buffer
pub type SharedRingBuffer = Arc<RingBuffer>;

/// Create a new shared ring buffer
pub fn create_shared_buffer(capacity: usize) -> SharedRingBuffer {
    Arc::new(RingBuffer::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u32) -> SampleFrame {
        SampleFrame::new(vec![0.0; 384 * 2], 384, vec![sequence * 2, sequence * 2 + 1], 0, 0, sequence)
    }

    #[test]
    fn test_ring_buffer_basic() {
        let buffer = RingBuffer::new(4);

        assert!(buffer.push(frame(0)));
        assert!(buffer.push(frame(1)));
        assert_eq!(buffer.len(), 2);

        let popped = buffer.pop().unwrap();
        assert_eq!(popped.sequence, 0);

        let popped = buffer.pop().unwrap();
        assert_eq!(popped.sequence, 1);

        assert!(buffer.is_empty());
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.underrun_count(), 1);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let buffer = RingBuffer::new(2);
        assert!(buffer.push(frame(0)));
        assert!(buffer.push(frame(1)));
        assert!(!buffer.push(frame(2)));
        assert_eq!(buffer.overflow_count(), 1);
        assert_eq!(buffer.fill_level(), 1.0);
        assert_eq!(buffer.try_pop().unwrap().sequence, 0);
    }

    #[test]
    fn test_clear() {
        let buffer = RingBuffer::new(4);
        buffer.push(frame(0));
        buffer.push(frame(1));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.underrun_count(), 0);
    }

    #[test]
    fn test_frame_packets() {
        let f = frame(3);
        assert_eq!(f.packet_count(), 2);
        assert_eq!(f.packet(1).map(|p| p.len()), Some(384));
        assert!(f.packet(2).is_none());
        assert_eq!(f.duration_us(30_000), 66);
    }
}
