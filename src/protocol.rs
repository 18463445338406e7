//! Records exchanged with the UI and the recording pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acquisition::AcquisitionStats;
use crate::basestation::SyncRole;
use crate::constants::NUM_ELECTRODES;
use crate::error::MappingError;
use crate::hardware::ProbeAddress;
use crate::mapping::MappingReport;
use crate::probe::ProbeStatus;

/// Identity of one unit, as strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial_number: u64,
    pub part_number: String,
    pub version: String,
}

/// One probe in the topology tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub address: ProbeAddress,
    pub status: ProbeStatus,
    pub selected: bool,
    pub probe: DeviceInfo,
    pub headstage: DeviceInfo,
    pub flex: DeviceInfo,
    /// Reference index (0 = external, 1 = tip, 2..=5 = internal A..D)
    pub reference: usize,
    pub enabled_electrodes: usize,
    pub fill_fraction: f32,
}

/// One basestation in the topology tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasestationInfo {
    pub slot: u8,
    pub boot_version: String,
    pub connect_board: DeviceInfo,
    pub connect_board_boot_version: String,
    pub sync_role: SyncRole,
    pub saving_directory: Option<PathBuf>,
    pub fill_percentage: f32,
    pub probes: Vec<ProbeInfo>,
}

/// Complete fleet topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetInfo {
    pub api_version: String,
    pub sync_master: Option<u8>,
    pub basestations: Vec<BasestationInfo>,
}

/// Live status of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatusReport {
    pub address: ProbeAddress,
    pub status: ProbeStatus,
    pub selected: bool,
    pub stats: AcquisitionStats,
}

/// Fill percentage of one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFill {
    pub slot: u8,
    pub fill_percentage: f32,
}

/// An active file-stream recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub number: u32,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub files: Vec<PathBuf>,
}

/// Fleet-wide status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub acquiring: bool,
    pub running_probes: usize,
    pub probe_count: usize,
    pub recording: Option<RecordingInfo>,
    pub fill: Vec<SlotFill>,
    pub uptime_seconds: u64,
}

/// Electrodes to enable on a probe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMaskRequest {
    pub electrodes: Vec<usize>,
}

impl ChannelMaskRequest {
    /// Per-electrode enable mask
    pub fn to_mask(&self) -> Result<Vec<bool>, MappingError> {
        electrodes_to_mask(&self.electrodes)
    }
}

/// Build a per-electrode mask from a list of enabled electrodes
pub fn electrodes_to_mask(electrodes: &[usize]) -> Result<Vec<bool>, MappingError> {
    let mut mask = vec![false; NUM_ELECTRODES];
    for &electrode in electrodes {
        *mask
            .get_mut(electrode)
            .ok_or(MappingError::ElectrodeOutOfRange(electrode))? = true;
    }
    Ok(mask)
}

/// Result of a channel mask application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub routed_channels: usize,
    pub enabled_electrodes: Vec<usize>,
    pub failed_calls: usize,
    pub commit_error: Option<String>,
}

impl From<&MappingReport> for MappingSummary {
    fn from(report: &MappingReport) -> Self {
        Self {
            routed_channels: report.map.routed_channels(),
            enabled_electrodes: report.map.enabled_electrodes(),
            failed_calls: report.reset_failures.len() + report.select_failures.len(),
            commit_error: report.commit.as_ref().err().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingRequest {
    /// Defaults to the configured recording root
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub slot: u8,
    /// Drive the sync clock instead of listening on the SMA input
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub frequency_index: usize,
}

/// Saved per-probe configuration replayed on session reload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    pub address: ProbeAddress,
    pub enabled_electrodes: Vec<usize>,
    pub reference: usize,
}
