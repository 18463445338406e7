//! Error types for the acquisition system

use thiserror::Error;

use crate::hardware::{ErrorCode, ProbeAddress};

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A vendor call returned a non-success code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {code}")]
pub struct HardwareError {
    pub operation: &'static str,
    pub code: ErrorCode,
}

impl HardwareError {
    pub fn new(operation: &'static str, code: ErrorCode) -> Self {
        Self { operation, code }
    }
}

/// Attach the failing operation name to a vendor result
pub trait HardwareContext<T> {
    fn context(self, operation: &'static str) -> std::result::Result<T, HardwareError>;
}

impl<T> HardwareContext<T> for std::result::Result<T, ErrorCode> {
    fn context(self, operation: &'static str) -> std::result::Result<T, HardwareError> {
        self.map_err(|code| HardwareError::new(operation, code))
    }
}

/// Device topology errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Probe not found: {0}")]
    UnknownProbe(ProbeAddress),

    #[error("Basestation not found in slot {0}")]
    UnknownSlot(u8),

    #[error("Sync frequency index {index} out of range ({available} available)")]
    InvalidSyncFrequency { index: usize, available: usize },

    #[error("No basestations with probes were found")]
    NoBasestations,
}

/// Electrode mapping errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Electrode mask has {actual} entries, expected {expected}")]
    MaskLength { expected: usize, actual: usize },

    #[error("Electrode {0} out of range")]
    ElectrodeOutOfRange(usize),

    #[error("Electrode {electrode} resolved to invalid bank index {bank}")]
    InvalidBank { electrode: usize, bank: usize },

    #[error("Invalid reference index {0}")]
    InvalidReference(usize),
}

/// Acquisition engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No ring buffer allocated for {0}")]
    NoBuffer(ProbeAddress),

    #[error("Failed to spawn polling thread: {0}")]
    ThreadSpawn(String),

    #[error("Polling thread for {address} did not stop within {timeout_ms} ms")]
    JoinTimeout { address: ProbeAddress, timeout_ms: u64 },

    #[error("Polling thread for {0} panicked")]
    ThreadPanicked(ProbeAddress),

    #[error("Polling thread for {0} from a previous run has not exited yet")]
    PreviousRunActive(ProbeAddress),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_context() {
        let result: std::result::Result<(), ErrorCode> = Err(ErrorCode::Timeout);
        let err = result.context("arm").unwrap_err();
        assert_eq!(err.operation, "arm");
        assert_eq!(err.to_string(), "arm failed: timeout (error code 8)");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = TopologyError::UnknownSlot(7).into();
        assert!(matches!(err, Error::Topology(TopologyError::UnknownSlot(7))));
        assert_eq!(err.to_string(), "Topology error: Basestation not found in slot 7");
    }
}
