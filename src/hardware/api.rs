//! Vendor call boundary
//!
//! Every call returns its outcome directly; there is no shared "last error"
//! state, so calls issued concurrently from several polling threads cannot
//! observe each other's results.

use std::path::Path;

use crate::hardware::types::{
    ElectrodeBank, FifoStatus, NpResult, OpMode, PacketInfo, ProbeAddress, ReferenceType,
    SyncSource, VersionInfo,
};

/// Synchronous access to basestations, headstages, flexes and probes.
///
/// Implementations must tolerate concurrent `read_packets`/`fifo_status`
/// calls for different probes.
pub trait NeuropixApi: Send + Sync {
    /// Version of the vendor library
    fn api_version(&self) -> NpResult<VersionInfo>;

    /// Bit `n` set means a basestation is present in slot `n`
    fn available_slots(&self) -> NpResult<u32>;

    fn open_basestation(&self, slot: u8) -> NpResult<()>;
    fn close_basestation(&self, slot: u8) -> NpResult<()>;

    fn basestation_boot_version(&self, slot: u8) -> NpResult<VersionInfo>;
    fn bsc_boot_version(&self, slot: u8) -> NpResult<VersionInfo>;
    fn bsc_version(&self, slot: u8) -> NpResult<VersionInfo>;
    fn bsc_serial_number(&self, slot: u8) -> NpResult<u64>;
    fn bsc_part_number(&self, slot: u8) -> NpResult<String>;

    fn open_probe(&self, address: ProbeAddress) -> NpResult<()>;
    fn close_port(&self, slot: u8, port: u8) -> NpResult<()>;

    fn headstage_version(&self, slot: u8, port: u8) -> NpResult<VersionInfo>;
    fn headstage_serial_number(&self, slot: u8, port: u8) -> NpResult<u64>;
    fn headstage_part_number(&self, slot: u8, port: u8) -> NpResult<String>;

    fn flex_version(&self, address: ProbeAddress) -> NpResult<VersionInfo>;
    fn flex_part_number(&self, address: ProbeAddress) -> NpResult<String>;

    fn probe_serial_number(&self, address: ProbeAddress) -> NpResult<u64>;
    fn probe_part_number(&self, address: ProbeAddress) -> NpResult<String>;

    fn init_probe(&self, address: ProbeAddress) -> NpResult<()>;
    fn set_operating_mode(&self, address: ProbeAddress, mode: OpMode) -> NpResult<()>;
    fn set_headstage_led(&self, slot: u8, port: u8, enabled: bool) -> NpResult<()>;

    /// Route `channel` to the electrode of `bank`; [`ElectrodeBank::None`] disconnects it
    fn select_electrode(
        &self,
        address: ProbeAddress,
        channel: u16,
        shank: u8,
        bank: ElectrodeBank,
    ) -> NpResult<()>;

    fn set_reference(
        &self,
        address: ProbeAddress,
        channel: u16,
        shank: u8,
        reference: ReferenceType,
        bank: ElectrodeBank,
    ) -> NpResult<()>;

    /// Commit pending electrode/reference settings to the probe
    fn write_probe_configuration(&self, address: ProbeAddress, read_check: bool) -> NpResult<()>;

    fn arm(&self, slot: u8) -> NpResult<()>;
    fn set_software_trigger(&self, slot: u8) -> NpResult<()>;

    fn set_sync_master(&self, slot: u8) -> NpResult<()>;
    fn set_sync_source(&self, slot: u8, source: SyncSource) -> NpResult<()>;
    fn set_sync_frequency(&self, slot: u8, hz: u32) -> NpResult<()>;

    /// Blocking read of up to `info.len()` packets.
    ///
    /// `data` receives `NUM_CHANNELS` codes per packet. Returns the number of
    /// packets actually read.
    fn read_packets(
        &self,
        address: ProbeAddress,
        info: &mut [PacketInfo],
        data: &mut [i16],
    ) -> NpResult<usize>;

    fn fifo_status(&self, address: ProbeAddress) -> NpResult<FifoStatus>;

    fn set_file_stream(&self, slot: u8, path: &Path) -> NpResult<()>;
    fn enable_file_stream(&self, slot: u8, enabled: bool) -> NpResult<()>;
}
