//! Acquisition engine module

pub mod buffer;
pub mod engine;
pub mod monitor;
pub mod poller;

pub use buffer::{create_shared_buffer, RingBuffer, SampleFrame, SharedRingBuffer};
pub use engine::{AcquisitionEngine, EngineState};
pub use monitor::{AcquisitionMonitor, AcquisitionStats};
pub use poller::{scale_sample, PacketSource, PollOutcome, Poller, ProbeLink};
