//! Hardware boundary module

pub mod api;
pub mod simulated;
pub mod types;

pub use api::NeuropixApi;
pub use simulated::{ApiCall, CallKind, FaultScope, SimulatedApi, SimulatedBasestation, SimulatedProbe};
pub use types::{
    ElectrodeBank, ErrorCode, FifoStatus, NpResult, OpMode, PacketInfo, ProbeAddress,
    ReferenceType, SyncSource, VersionInfo,
};
