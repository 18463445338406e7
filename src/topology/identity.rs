//! Identity metadata shared by every physical unit

use tracing::warn;

use crate::error::{HardwareContext, HardwareError};
use crate::hardware::{NeuropixApi, NpResult, VersionInfo};

/// Serial, part number and version of one unit
///
/// Queries that fail leave their field at its default and are recorded in
/// `errors`; partial identities are normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceIdentity {
    pub serial_number: u64,
    pub part_number: String,
    pub version: Option<VersionInfo>,
    pub errors: Vec<HardwareError>,
}

impl DeviceIdentity {
    /// Dotted version string, empty when unknown
    pub fn version_string(&self) -> String {
        self.version.map(|v| v.to_string()).unwrap_or_default()
    }

    /// Keep the value of a successful query, record a failed one
    pub fn record<T: Default>(&mut self, operation: &'static str, result: NpResult<T>) -> T {
        match result.context(operation) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}", e);
                self.errors.push(e);
                T::default()
            }
        }
    }

    /// Like [`DeviceIdentity::record`] but keeps "missing" distinct from default
    pub fn record_optional<T>(&mut self, operation: &'static str, result: NpResult<T>) -> Option<T> {
        match result.context(operation) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}", e);
                self.errors.push(e);
                None
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A physical unit that exposes identity metadata
pub trait HasIdentity {
    /// Query the vendor metadata for this unit, replacing any previous values
    fn get_info(&mut self, api: &dyn NeuropixApi);

    fn identity(&self) -> &DeviceIdentity;
}
