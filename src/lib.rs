//! # Neuropixels 2.0 Acquisition
//!
//! Continuous acquisition from multiple Neuropixels 2.0 probes attached through
//! basestation hardware.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         FLEET CONTROLLER (fleet)                            │
//! │   discovery · sync master · per-slot fill · start/stop · file recording     │
//! │                                                                             │
//! │  ┌───────────────────────────────┐   ┌───────────────────────────────┐      │
//! │  │ Basestation slot 2            │   │ Basestation slot 3            │      │
//! │  │ (basestation)                 │   │ (basestation)                 │      │
//! │  │  arm · trigger · sync role    │   │  arm · trigger · sync role    │      │
//! │  │  ┌──────────┐  ┌──────────┐   │   │  ┌──────────┐  ┌──────────┐   │      │
//! │  │  │ Probe    │  │ Probe    │   │   │  │ Probe    │  │ Probe    │   │      │
//! │  │  │ p1 d1    │  │ p2 d1    │   │   │  │ p1 d1    │  │ p1 d2    │   │      │
//! │  │  │ ┌──────┐ │  │ ┌──────┐ │   │   │  │ ┌──────┐ │  │ ┌──────┐ │   │      │
//! │  │  │ │Poller│ │  │ │Poller│ │   │   │  │ │Poller│ │  │ │Poller│ │   │      │
//! │  │  │ │Thread│ │  │ │Thread│ │   │   │  │ │Thread│ │  │ │Thread│ │   │      │
//! │  │  │ └──┬───┘ │  │ └──┬───┘ │   │   │  │ └──┬───┘ │  │ └──┬───┘ │   │      │
//! │  │  └────┼─────┘  └────┼─────┘   │   │  └────┼─────┘  └────┼─────┘   │      │
//! │  └───────┼─────────────┼─────────┘   └───────┼─────────────┼─────────┘      │
//! └──────────┼─────────────┼─────────────────────┼─────────────┼────────────────┘
//!            │  readPacket │ (hardware)          │             │
//!            ▼             ▼                     ▼             ▼
//!      ┌──────────┐  ┌──────────┐          ┌──────────┐  ┌──────────┐
//!      │  Ring    │  │  Ring    │          │  Ring    │  │  Ring    │
//!      │  Buffer  │  │  Buffer  │          │  Buffer  │  │  Buffer  │
//!      └────┬─────┘  └────┬─────┘          └────┬─────┘  └────┬─────┘
//!           └─────────────┴──────────┬──────────┴─────────────┘
//!                                    ▼
//!                    recording / visualization consumers
//! ```
//!
//! Configuration flows downward (fleet → basestation → probe → [`hardware::NeuropixApi`]);
//! samples flow upward through one polling thread per probe into that probe's ring buffer.

pub mod acquisition;
pub mod basestation;
pub mod config;
pub mod error;
pub mod fleet;
pub mod hardware;
pub mod mapping;
pub mod probe;
pub mod protocol;
pub mod topology;
pub mod ui;

pub use error::{Error, Result};

/// Hardware and probe constants
pub mod constants {
    /// Number of basestation slots addressable through the slot mask
    pub const MAX_NUM_SLOTS: u8 = 32;

    /// Headstage ports per basestation
    pub const NUM_PORTS: u8 = 4;

    /// Probe docks per headstage
    pub const NUM_DOCKS: u8 = 2;

    /// Recording channels per probe
    pub const NUM_CHANNELS: usize = 384;

    /// Electrodes on a single-shank 2.0 probe
    pub const NUM_ELECTRODES: usize = 1280;

    /// Electrode banks per shank
    pub const NUM_BANKS: usize = 4;

    /// Packets requested per FIFO read
    pub const SAMPLE_COUNT: usize = 64;

    /// Sample rate of the electrode data stream (Hz)
    pub const SAMPLE_RATE: u32 = 30_000;

    /// Probes with a serial number below this value are simulated or ghost entries
    pub const MIN_PROBE_SERIAL: u64 = 19_000_000_000;

    /// Microvolts per ADC code
    pub const MICROVOLTS_PER_BIT: f32 = 100.0 / 8192.0;

    /// Internal reference electrodes, one per bank
    pub const REF_ELECTRODES: [usize; 4] = [128, 508, 888, 1252];

    /// Sync output frequencies supported by the basestation (Hz)
    pub const SYNC_FREQUENCIES_HZ: [u32; 2] = [1, 10];

    /// Default ring buffer capacity (in frames)
    pub const RING_BUFFER_CAPACITY: usize = 10_000;

    /// Bounded wait when joining a polling thread (ms)
    pub const STOP_TIMEOUT_MS: u64 = 1_000;

    /// Default HTTP port for the control API
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
}
