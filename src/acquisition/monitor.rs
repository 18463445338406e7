//! Per-probe acquisition diagnostics
//!
//! Written by the polling thread, read by anyone. Every field is an atomic so
//! readers never contend with the producer.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::hardware::ErrorCode;

/// Shared counters for one probe's polling loop
#[derive(Debug, Default)]
pub struct AcquisitionMonitor {
    /// FIFO fill fraction stored as `f32` bits
    fill_bits: AtomicU32,
    packets_read: AtomicU64,
    frames_written: AtomicU64,
    frames_dropped: AtomicU64,
    read_failures: AtomicU64,
    /// Vendor code of the last failed read, 0 if none
    last_error: AtomicI32,
    last_timestamp: AtomicU32,
}

/// Point-in-time copy of [`AcquisitionMonitor`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub fill_fraction: f32,
    pub packets_read: u64,
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub read_failures: u64,
    pub last_error: Option<i32>,
    pub last_timestamp: u32,
}

impl AcquisitionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter; called before a new run
    pub fn reset(&self) {
        self.fill_bits.store(0f32.to_bits(), Ordering::Relaxed);
        self.packets_read.store(0, Ordering::Relaxed);
        self.frames_written.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.read_failures.store(0, Ordering::Relaxed);
        self.last_error.store(0, Ordering::Relaxed);
        self.last_timestamp.store(0, Ordering::Relaxed);
    }

    /// Current FIFO fill fraction in [0.0, 1.0]
    pub fn fill_fraction(&self) -> f32 {
        f32::from_bits(self.fill_bits.load(Ordering::Relaxed))
    }

    pub fn set_fill_fraction(&self, fraction: f32) {
        let clamped = if fraction.is_nan() { 1.0 } else { fraction.clamp(0.0, 1.0) };
        self.fill_bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn record_packets(&self, count: usize, last_timestamp: u32) {
        self.packets_read.fetch_add(count as u64, Ordering::Relaxed);
        self.last_timestamp.store(last_timestamp, Ordering::Relaxed);
    }

    pub fn record_frame(&self, written: bool) {
        if written {
            self.frames_written.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_read_failure(&self, code: ErrorCode) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        self.last_error.store(code.code(), Ordering::Relaxed);
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> AcquisitionStats {
        let last_error = self.last_error.load(Ordering::Relaxed);
        AcquisitionStats {
            fill_fraction: self.fill_fraction(),
            packets_read: self.packets_read.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            last_error: (last_error != 0).then_some(last_error),
            last_timestamp: self.last_timestamp.load(Ordering::Relaxed),
        }
    }
}
