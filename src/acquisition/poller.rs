//! Polling step of the acquisition loop
//!
//! [`Poller`] owns everything one read needs and knows nothing about threads;
//! [`crate::acquisition::AcquisitionEngine`] drives it from a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::acquisition::buffer::{SampleFrame, SharedRingBuffer};
use crate::acquisition::monitor::AcquisitionMonitor;
use crate::constants::{MICROVOLTS_PER_BIT, NUM_CHANNELS};
use crate::hardware::{ErrorCode, FifoStatus, NeuropixApi, NpResult, PacketInfo, ProbeAddress};

/// Producer of raw electrode packets for a single probe
pub trait PacketSource: Send {
    /// Blocking read of up to `info.len()` packets into `info`/`data`
    fn read_packets(&mut self, info: &mut [PacketInfo], data: &mut [i16]) -> NpResult<usize>;

    fn fifo_status(&mut self) -> NpResult<FifoStatus>;
}

/// Packet source backed by the hardware boundary
#[derive(Clone)]
pub struct ProbeLink {
    api: Arc<dyn NeuropixApi>,
    address: ProbeAddress,
}

impl ProbeLink {
    pub fn new(api: Arc<dyn NeuropixApi>, address: ProbeAddress) -> Self {
        Self { api, address }
    }
}

impl PacketSource for ProbeLink {
    fn read_packets(&mut self, info: &mut [PacketInfo], data: &mut [i16]) -> NpResult<usize> {
        self.api.read_packets(self.address, info, data)
    }

    fn fifo_status(&mut self) -> NpResult<FifoStatus> {
        self.api.fifo_status(self.address)
    }
}

/// Convert a raw ADC code to microvolts
#[inline]
pub fn scale_sample(raw: i16) -> f32 {
    raw as f32 * MICROVOLTS_PER_BIT
}

/// Result of one polling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A frame of `packets` packets was appended (or dropped on overflow)
    Frame { packets: usize, written: bool },
    /// The read succeeded but returned no packets
    Empty,
    /// Stop was requested while the read was blocked; packets were discarded
    Discarded,
    /// The read failed; nothing was appended
    ReadFailed(ErrorCode),
}

/// One probe's polling state
pub struct Poller<S: PacketSource> {
    source: S,
    buffer: SharedRingBuffer,
    monitor: Arc<AcquisitionMonitor>,
    info: Vec<PacketInfo>,
    data: Vec<i16>,
    sample_number: u64,
    sequence: u32,
}

impl<S: PacketSource> Poller<S> {
    pub fn new(
        source: S,
        buffer: SharedRingBuffer,
        monitor: Arc<AcquisitionMonitor>,
        packets_per_read: usize,
    ) -> Self {
        let packets = packets_per_read.max(1);
        Self {
            source,
            buffer,
            monitor,
            info: vec![PacketInfo::default(); packets],
            data: vec![0; packets * NUM_CHANNELS],
            sample_number: 0,
            sequence: 0,
        }
    }

    /// Packets appended since this poller was created
    pub fn sample_number(&self) -> u64 {
        self.sample_number
    }

    /// Perform one read and deliver its result
    ///
    /// `running` is checked after the blocking read so a stop request that
    /// arrives during the read never results in an append.
    pub fn poll_once(&mut self, running: &AtomicBool) -> PollOutcome {
        let count = match self.source.read_packets(&mut self.info, &mut self.data) {
            Ok(count) => count.min(self.info.len()),
            Err(code) => {
                debug!("Packet read failed: {}", code);
                self.monitor.record_read_failure(code);
                return PollOutcome::ReadFailed(code);
            }
        };

        if !running.load(Ordering::Acquire) {
            return PollOutcome::Discarded;
        }

        let outcome = if count == 0 {
            PollOutcome::Empty
        } else {
            let written = self.deliver(count);
            PollOutcome::Frame { packets: count, written }
        };

        match self.source.fifo_status() {
            Ok(status) => self.monitor.set_fill_fraction(status.fill_fraction()),
            Err(code) => debug!("FIFO status query failed: {}", code),
        }

        outcome
    }

    /// Poll until `running` is cleared
    pub fn run(mut self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            self.poll_once(&running);
        }
    }

    fn deliver(&mut self, count: usize) -> bool {
        let headers = &self.info[..count];
        let samples: Vec<f32> = self.data[..count * NUM_CHANNELS]
            .iter()
            .map(|&raw| scale_sample(raw))
            .collect();
        let timestamps: Vec<u32> = headers.iter().map(|h| h.timestamp).collect();
        let event_code = headers[0].event_code();
        let last_timestamp = headers[count - 1].timestamp;

        let frame = SampleFrame::new(
            samples,
            NUM_CHANNELS as u16,
            timestamps,
            event_code,
            self.sample_number,
            self.sequence,
        );

        self.sample_number += count as u64;
        self.sequence = self.sequence.wrapping_add(1);

        let written = self.buffer.push(frame);
        self.monitor.record_packets(count, last_timestamp);
        self.monitor.record_frame(written);
        written
    }
}
