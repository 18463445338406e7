//! In-process implementation of the hardware boundary
//!
//! Stands in for the vendor library when no basestation hardware is
//! attached: serves deterministic electrode packets once a slot has been
//! triggered, records every configuration call, and lets callers inject
//! error codes into chosen calls.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::constants::{NUM_CHANNELS, SAMPLE_COUNT, SAMPLE_RATE};
use crate::hardware::api::NeuropixApi;
use crate::hardware::types::{
    ElectrodeBank, ErrorCode, FifoStatus, NpResult, OpMode, PacketInfo, ProbeAddress,
    ReferenceType, SyncSource, VersionInfo,
};

/// Depth of the simulated on-device FIFO (packets)
const FIFO_DEPTH: usize = 4096;

/// A probe plugged into a simulated headstage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedProbe {
    pub port: u8,
    pub dock: u8,
    pub serial_number: u64,
}

/// A simulated basestation and the probes behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBasestation {
    pub slot: u8,
    pub probes: Vec<SimulatedProbe>,
}

/// Configuration call recorded by the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    OpenBasestation { slot: u8 },
    CloseBasestation { slot: u8 },
    OpenProbe(ProbeAddress),
    ClosePort { slot: u8, port: u8 },
    InitProbe(ProbeAddress),
    SetOperatingMode(ProbeAddress, OpMode),
    SetHeadstageLed { slot: u8, port: u8, enabled: bool },
    SelectElectrode { address: ProbeAddress, channel: u16, bank: ElectrodeBank },
    SetReference { address: ProbeAddress, channel: u16, reference: ReferenceType, bank: ElectrodeBank },
    WriteProbeConfiguration(ProbeAddress),
    Arm { slot: u8 },
    SoftwareTrigger { slot: u8 },
    SetSyncMaster { slot: u8 },
    SetSyncSource { slot: u8, source: SyncSource },
    SetSyncFrequency { slot: u8, hz: u32 },
    SetFileStream { slot: u8, path: PathBuf },
    EnableFileStream { slot: u8, enabled: bool },
}

/// Vendor call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    AvailableSlots,
    OpenBasestation,
    BasestationBootVersion,
    BscBootVersion,
    BscVersion,
    BscSerialNumber,
    BscPartNumber,
    OpenProbe,
    HeadstageVersion,
    HeadstageSerialNumber,
    HeadstagePartNumber,
    FlexVersion,
    FlexPartNumber,
    ProbeSerialNumber,
    ProbePartNumber,
    InitProbe,
    SetOperatingMode,
    SetHeadstageLed,
    SelectElectrode,
    SetReference,
    WriteProbeConfiguration,
    Arm,
    SoftwareTrigger,
    SetSyncMaster,
    SetSyncSource,
    SetSyncFrequency,
    ReadPackets,
    FifoStatus,
    SetFileStream,
    EnableFileStream,
}

/// Which units an injected fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    Any,
    Slot(u8),
    /// Port-level calls match on slot and port only
    Probe(ProbeAddress),
}

#[derive(Debug, Clone)]
struct Fault {
    kind: CallKind,
    scope: FaultScope,
    code: ErrorCode,
    remaining: Option<usize>,
}

/// Unit a call is addressed to
#[derive(Debug, Clone, Copy)]
struct Target {
    slot: Option<u8>,
    port: Option<u8>,
    dock: Option<u8>,
}

impl Target {
    fn none() -> Self {
        Self { slot: None, port: None, dock: None }
    }

    fn slot(slot: u8) -> Self {
        Self { slot: Some(slot), port: None, dock: None }
    }

    fn port(slot: u8, port: u8) -> Self {
        Self { slot: Some(slot), port: Some(port), dock: None }
    }

    fn probe(address: ProbeAddress) -> Self {
        Self { slot: Some(address.slot), port: Some(address.port), dock: Some(address.dock) }
    }

    fn matches(&self, scope: FaultScope) -> bool {
        match scope {
            FaultScope::Any => true,
            FaultScope::Slot(slot) => self.slot == Some(slot),
            FaultScope::Probe(address) => {
                self.slot == Some(address.slot)
                    && self.port == Some(address.port)
                    && self.dock.map_or(true, |dock| dock == address.dock)
            }
        }
    }
}

/// Per-probe stream and routing state
struct ProbeStream {
    next_timestamp: u32,
    pending_routing: Vec<ElectrodeBank>,
    committed_routing: Vec<ElectrodeBank>,
    fifo_override: Option<FifoStatus>,
}

impl ProbeStream {
    fn new() -> Self {
        Self {
            next_timestamp: 0,
            pending_routing: vec![ElectrodeBank::None; NUM_CHANNELS],
            committed_routing: vec![ElectrodeBank::None; NUM_CHANNELS],
            fifo_override: None,
        }
    }
}

#[derive(Default)]
struct SimState {
    open_slots: HashSet<u8>,
    open_probes: HashSet<ProbeAddress>,
    streams: HashMap<ProbeAddress, ProbeStream>,
    triggered: HashSet<u8>,
    file_streams: HashMap<u8, (PathBuf, bool)>,
    calls: Vec<ApiCall>,
    faults: Vec<Fault>,
}

impl SimState {
    /// Consume a matching fault, if any
    fn fault(&mut self, kind: CallKind, target: Target) -> NpResult<()> {
        let position = self
            .faults
            .iter()
            .position(|f| f.kind == kind && target.matches(f.scope));

        let Some(index) = position else {
            return Ok(());
        };

        let code = self.faults[index].code;
        if let Some(remaining) = self.faults[index].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.faults.remove(index);
            }
        }
        Err(code)
    }

    fn require_slot(&self, slot: u8) -> NpResult<()> {
        if self.open_slots.contains(&slot) {
            Ok(())
        } else {
            Err(ErrorCode::NotOpen)
        }
    }

    fn require_probe(&self, address: ProbeAddress) -> NpResult<()> {
        if self.open_probes.contains(&address) {
            Ok(())
        } else {
            Err(ErrorCode::NotOpen)
        }
    }
}

/// Simulated vendor library
pub struct SimulatedApi {
    rig: Vec<SimulatedBasestation>,
    packet_interval: Duration,
    state: Mutex<SimState>,
    packets_served: AtomicU64,
}

impl SimulatedApi {
    /// Create a simulator for the given rig
    pub fn new(rig: Vec<SimulatedBasestation>) -> Self {
        // One read worth of packets at the electrode sample rate
        let interval_us = SAMPLE_COUNT as u64 * 1_000_000 / SAMPLE_RATE as u64;
        Self {
            rig,
            packet_interval: Duration::from_micros(interval_us),
            state: Mutex::new(SimState::default()),
            packets_served: AtomicU64::new(0),
        }
    }

    /// Rig of `slots.len()` basestations with `probes_per_slot` valid probes each
    pub fn with_rig(slots: &[u8], probes_per_slot: usize) -> Self {
        let rig = slots
            .iter()
            .map(|&slot| SimulatedBasestation {
                slot,
                probes: (0..probes_per_slot.min(8))
                    .map(|i| SimulatedProbe {
                        port: (i / 2) as u8 + 1,
                        dock: (i % 2) as u8 + 1,
                        serial_number: 19_000_000_000 + slot as u64 * 100 + i as u64,
                    })
                    .collect(),
            })
            .collect();
        Self::new(rig)
    }

    /// Override how long each blocking read takes
    pub fn with_packet_interval(mut self, interval: Duration) -> Self {
        self.packet_interval = interval;
        self
    }

    /// Make `kind` calls on `scope` fail with `code`, `times` times or forever
    pub fn inject_fault(&self, kind: CallKind, scope: FaultScope, code: ErrorCode, times: Option<usize>) {
        self.state.lock().faults.push(Fault { kind, scope, code, remaining: times });
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Report a fixed FIFO occupancy for a probe
    pub fn set_fifo_status(&self, address: ProbeAddress, status: FifoStatus) {
        let mut state = self.state.lock();
        state
            .streams
            .entry(address)
            .or_insert_with(ProbeStream::new)
            .fifo_override = Some(status);
    }

    /// All configuration calls issued so far
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of recorded calls satisfying `predicate`
    pub fn count_calls<F: Fn(&ApiCall) -> bool>(&self, predicate: F) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Routing committed by the last successful configuration write
    pub fn committed_routing(&self, address: ProbeAddress) -> Option<Vec<ElectrodeBank>> {
        self.state
            .lock()
            .streams
            .get(&address)
            .map(|s| s.committed_routing.clone())
    }

    pub fn is_triggered(&self, slot: u8) -> bool {
        self.state.lock().triggered.contains(&slot)
    }

    /// File stream target and enable flag of a slot
    pub fn file_stream(&self, slot: u8) -> Option<(PathBuf, bool)> {
        self.state.lock().file_streams.get(&slot).cloned()
    }

    /// Total packets handed out by `read_packets`
    pub fn packets_served(&self) -> u64 {
        self.packets_served.load(Ordering::Relaxed)
    }

    fn find_probe(&self, address: ProbeAddress) -> Option<&SimulatedProbe> {
        self.rig
            .iter()
            .find(|bs| bs.slot == address.slot)
            .and_then(|bs| {
                bs.probes
                    .iter()
                    .find(|p| p.port == address.port && p.dock == address.dock)
            })
    }

    fn port_populated(&self, slot: u8, port: u8) -> bool {
        self.rig
            .iter()
            .filter(|bs| bs.slot == slot)
            .flat_map(|bs| bs.probes.iter())
            .any(|p| p.port == port)
    }

    /// Record a configuration call after its fault check
    fn configure(&self, kind: CallKind, target: Target, call: ApiCall) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(kind, target)?;
        if let Some(slot) = target.slot {
            state.require_slot(slot)?;
        }
        state.calls.push(call);
        Ok(())
    }

    /// Metadata query after its fault check
    fn query<T>(&self, kind: CallKind, target: Target, value: impl FnOnce() -> NpResult<T>) -> NpResult<T> {
        let mut state = self.state.lock();
        state.fault(kind, target)?;
        if let Some(slot) = target.slot {
            state.require_slot(slot)?;
        }
        drop(state);
        value()
    }

    fn sample_value(channel: usize, timestamp: u32) -> i16 {
        ((timestamp as i64 + channel as i64 * 16) % 1024 - 512) as i16
    }
}

impl NeuropixApi for SimulatedApi {
    fn api_version(&self) -> NpResult<VersionInfo> {
        Ok(VersionInfo::new(3, 0))
    }

    fn available_slots(&self) -> NpResult<u32> {
        self.state.lock().fault(CallKind::AvailableSlots, Target::none())?;
        Ok(self
            .rig
            .iter()
            .filter(|bs| bs.slot < 32)
            .fold(0u32, |mask, bs| mask | (1 << bs.slot)))
    }

    fn open_basestation(&self, slot: u8) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::OpenBasestation, Target::slot(slot))?;
        if !self.rig.iter().any(|bs| bs.slot == slot) {
            return Err(ErrorCode::NoLink);
        }
        if !state.open_slots.insert(slot) {
            return Err(ErrorCode::AlreadyOpen);
        }
        state.calls.push(ApiCall::OpenBasestation { slot });
        Ok(())
    }

    fn close_basestation(&self, slot: u8) -> NpResult<()> {
        let mut state = self.state.lock();
        state.require_slot(slot)?;
        state.open_slots.remove(&slot);
        state.triggered.remove(&slot);
        state.calls.push(ApiCall::CloseBasestation { slot });
        Ok(())
    }

    fn basestation_boot_version(&self, slot: u8) -> NpResult<VersionInfo> {
        self.query(CallKind::BasestationBootVersion, Target::slot(slot), || {
            Ok(VersionInfo::with_build(2, 1, 169))
        })
    }

    fn bsc_boot_version(&self, slot: u8) -> NpResult<VersionInfo> {
        self.query(CallKind::BscBootVersion, Target::slot(slot), || {
            Ok(VersionInfo::with_build(3, 2, 176))
        })
    }

    fn bsc_version(&self, slot: u8) -> NpResult<VersionInfo> {
        self.query(CallKind::BscVersion, Target::slot(slot), || Ok(VersionInfo::new(1, 0)))
    }

    fn bsc_serial_number(&self, slot: u8) -> NpResult<u64> {
        self.query(CallKind::BscSerialNumber, Target::slot(slot), || {
            Ok(2_000_000 + slot as u64)
        })
    }

    fn bsc_part_number(&self, slot: u8) -> NpResult<String> {
        self.query(CallKind::BscPartNumber, Target::slot(slot), || {
            Ok("NP2_QBSC_00".to_string())
        })
    }

    fn open_probe(&self, address: ProbeAddress) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::OpenProbe, Target::probe(address))?;
        state.require_slot(address.slot)?;
        if self.find_probe(address).is_none() {
            return Err(ErrorCode::NoLink);
        }
        state.open_probes.insert(address);
        state.streams.entry(address).or_insert_with(ProbeStream::new);
        state.calls.push(ApiCall::OpenProbe(address));
        Ok(())
    }

    fn close_port(&self, slot: u8, port: u8) -> NpResult<()> {
        let mut state = self.state.lock();
        state.require_slot(slot)?;
        state.open_probes.retain(|a| !(a.slot == slot && a.port == port));
        state.calls.push(ApiCall::ClosePort { slot, port });
        Ok(())
    }

    fn headstage_version(&self, slot: u8, port: u8) -> NpResult<VersionInfo> {
        self.query(CallKind::HeadstageVersion, Target::port(slot, port), || {
            if self.port_populated(slot, port) {
                Ok(VersionInfo::new(1, 0))
            } else {
                Err(ErrorCode::NoLink)
            }
        })
    }

    fn headstage_serial_number(&self, slot: u8, port: u8) -> NpResult<u64> {
        self.query(CallKind::HeadstageSerialNumber, Target::port(slot, port), || {
            if self.port_populated(slot, port) {
                Ok(20_000_000 + slot as u64 * 10 + port as u64)
            } else {
                Err(ErrorCode::NoLink)
            }
        })
    }

    fn headstage_part_number(&self, slot: u8, port: u8) -> NpResult<String> {
        self.query(CallKind::HeadstagePartNumber, Target::port(slot, port), || {
            if self.port_populated(slot, port) {
                Ok("NPNH_HS_30".to_string())
            } else {
                Err(ErrorCode::NoLink)
            }
        })
    }

    fn flex_version(&self, address: ProbeAddress) -> NpResult<VersionInfo> {
        self.query(CallKind::FlexVersion, Target::probe(address), || {
            self.find_probe(address)
                .map(|_| VersionInfo::new(1, 0))
                .ok_or(ErrorCode::NoLink)
        })
    }

    fn flex_part_number(&self, address: ProbeAddress) -> NpResult<String> {
        self.query(CallKind::FlexPartNumber, Target::probe(address), || {
            self.find_probe(address)
                .map(|_| "NPNH_FLEX_00".to_string())
                .ok_or(ErrorCode::NoLink)
        })
    }

    fn probe_serial_number(&self, address: ProbeAddress) -> NpResult<u64> {
        self.query(CallKind::ProbeSerialNumber, Target::probe(address), || {
            self.find_probe(address)
                .map(|p| p.serial_number)
                .ok_or(ErrorCode::NoLink)
        })
    }

    fn probe_part_number(&self, address: ProbeAddress) -> NpResult<String> {
        self.query(CallKind::ProbePartNumber, Target::probe(address), || {
            self.find_probe(address)
                .map(|_| "NP2000".to_string())
                .ok_or(ErrorCode::NoLink)
        })
    }

    fn init_probe(&self, address: ProbeAddress) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::InitProbe, Target::probe(address))?;
        state.require_probe(address)?;
        state.calls.push(ApiCall::InitProbe(address));
        Ok(())
    }

    fn set_operating_mode(&self, address: ProbeAddress, mode: OpMode) -> NpResult<()> {
        self.configure(
            CallKind::SetOperatingMode,
            Target::probe(address),
            ApiCall::SetOperatingMode(address, mode),
        )
    }

    fn set_headstage_led(&self, slot: u8, port: u8, enabled: bool) -> NpResult<()> {
        self.configure(
            CallKind::SetHeadstageLed,
            Target::port(slot, port),
            ApiCall::SetHeadstageLed { slot, port, enabled },
        )
    }

    fn select_electrode(
        &self,
        address: ProbeAddress,
        channel: u16,
        _shank: u8,
        bank: ElectrodeBank,
    ) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::SelectElectrode, Target::probe(address))?;
        state.require_probe(address)?;
        if channel as usize >= NUM_CHANNELS {
            return Err(ErrorCode::WrongChannel);
        }
        if let Some(stream) = state.streams.get_mut(&address) {
            stream.pending_routing[channel as usize] = bank;
        }
        state.calls.push(ApiCall::SelectElectrode { address, channel, bank });
        Ok(())
    }

    fn set_reference(
        &self,
        address: ProbeAddress,
        channel: u16,
        _shank: u8,
        reference: ReferenceType,
        bank: ElectrodeBank,
    ) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::SetReference, Target::probe(address))?;
        state.require_probe(address)?;
        if channel as usize >= NUM_CHANNELS {
            return Err(ErrorCode::WrongChannel);
        }
        if reference == ReferenceType::Internal && bank == ElectrodeBank::None {
            return Err(ErrorCode::WrongIntRef);
        }
        state.calls.push(ApiCall::SetReference { address, channel, reference, bank });
        Ok(())
    }

    fn write_probe_configuration(&self, address: ProbeAddress, _read_check: bool) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::WriteProbeConfiguration, Target::probe(address))?;
        state.require_probe(address)?;
        if let Some(stream) = state.streams.get_mut(&address) {
            stream.committed_routing = stream.pending_routing.clone();
        }
        state.calls.push(ApiCall::WriteProbeConfiguration(address));
        Ok(())
    }

    fn arm(&self, slot: u8) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::Arm, Target::slot(slot))?;
        state.require_slot(slot)?;
        state.triggered.remove(&slot);
        for (_, stream) in state.streams.iter_mut().filter(|(a, _)| a.slot == slot) {
            stream.next_timestamp = 0;
        }
        state.calls.push(ApiCall::Arm { slot });
        Ok(())
    }

    fn set_software_trigger(&self, slot: u8) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::SoftwareTrigger, Target::slot(slot))?;
        state.require_slot(slot)?;
        state.triggered.insert(slot);
        state.calls.push(ApiCall::SoftwareTrigger { slot });
        Ok(())
    }

    fn set_sync_master(&self, slot: u8) -> NpResult<()> {
        self.configure(CallKind::SetSyncMaster, Target::slot(slot), ApiCall::SetSyncMaster { slot })
    }

    fn set_sync_source(&self, slot: u8, source: SyncSource) -> NpResult<()> {
        self.configure(
            CallKind::SetSyncSource,
            Target::slot(slot),
            ApiCall::SetSyncSource { slot, source },
        )
    }

    fn set_sync_frequency(&self, slot: u8, hz: u32) -> NpResult<()> {
        self.configure(
            CallKind::SetSyncFrequency,
            Target::slot(slot),
            ApiCall::SetSyncFrequency { slot, hz },
        )
    }

    fn read_packets(
        &self,
        address: ProbeAddress,
        info: &mut [PacketInfo],
        data: &mut [i16],
    ) -> NpResult<usize> {
        // The blocking part of the read happens outside the state lock
        thread::sleep(self.packet_interval);

        let mut state = self.state.lock();
        state.fault(CallKind::ReadPackets, Target::probe(address))?;
        state.require_probe(address)?;
        if !state.triggered.contains(&address.slot) {
            return Ok(0);
        }

        let count = info.len().min(data.len() / NUM_CHANNELS);
        let stream = state.streams.entry(address).or_insert_with(ProbeStream::new);

        for (packet, header) in info.iter_mut().take(count).enumerate() {
            let timestamp = stream.next_timestamp;
            stream.next_timestamp = stream.next_timestamp.wrapping_add(1);

            // Half-second sync pulse on the first auxiliary input
            let sync_high = (timestamp / (SAMPLE_RATE / 2)) % 2 == 1;
            *header = PacketInfo {
                timestamp,
                status: if sync_high { 1 << 6 } else { 0 },
                payload_length: NUM_CHANNELS as u16,
            };

            let codes = &mut data[packet * NUM_CHANNELS..(packet + 1) * NUM_CHANNELS];
            for (channel, code) in codes.iter_mut().enumerate() {
                *code = Self::sample_value(channel, timestamp);
            }
        }

        self.packets_served.fetch_add(count as u64, Ordering::Relaxed);
        Ok(count)
    }

    fn fifo_status(&self, address: ProbeAddress) -> NpResult<FifoStatus> {
        let mut state = self.state.lock();
        state.fault(CallKind::FifoStatus, Target::probe(address))?;
        state.require_probe(address)?;
        let status = state
            .streams
            .get(&address)
            .and_then(|s| s.fifo_override)
            .unwrap_or(FifoStatus { packets_available: 0, headroom: FIFO_DEPTH });
        Ok(status)
    }

    fn set_file_stream(&self, slot: u8, path: &Path) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::SetFileStream, Target::slot(slot))?;
        state.require_slot(slot)?;
        state.file_streams.insert(slot, (path.to_path_buf(), false));
        state.calls.push(ApiCall::SetFileStream { slot, path: path.to_path_buf() });
        Ok(())
    }

    fn enable_file_stream(&self, slot: u8, enabled: bool) -> NpResult<()> {
        let mut state = self.state.lock();
        state.fault(CallKind::EnableFileStream, Target::slot(slot))?;
        state.require_slot(slot)?;
        match state.file_streams.get_mut(&slot) {
            Some(stream) => stream.1 = enabled,
            None if enabled => return Err(ErrorCode::FileOpenError),
            None => {}
        }
        state.calls.push(ApiCall::EnableFileStream { slot, enabled });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ProbeAddress {
        ProbeAddress::new(2, 1, 1)
    }

    fn open_rig() -> SimulatedApi {
        let api = SimulatedApi::with_rig(&[2], 1).with_packet_interval(Duration::ZERO);
        api.open_basestation(2).unwrap();
        api.open_probe(address()).unwrap();
        api
    }

    #[test]
    fn test_slot_mask() {
        let api = SimulatedApi::with_rig(&[0, 3, 31], 1);
        assert_eq!(api.available_slots().unwrap(), (1 << 0) | (1 << 3) | (1 << 31));
    }

    #[test]
    fn test_no_packets_before_trigger() {
        let api = open_rig();
        let mut info = vec![PacketInfo::default(); SAMPLE_COUNT];
        let mut data = vec![0i16; SAMPLE_COUNT * NUM_CHANNELS];

        assert_eq!(api.read_packets(address(), &mut info, &mut data).unwrap(), 0);

        api.arm(2).unwrap();
        api.set_software_trigger(2).unwrap();
        assert_eq!(api.read_packets(address(), &mut info, &mut data).unwrap(), SAMPLE_COUNT);
    }

    #[test]
    fn test_timestamps_increase_and_reset_on_arm() {
        let api = open_rig();
        api.arm(2).unwrap();
        api.set_software_trigger(2).unwrap();

        let mut info = vec![PacketInfo::default(); SAMPLE_COUNT];
        let mut data = vec![0i16; SAMPLE_COUNT * NUM_CHANNELS];
        let mut last = None;
        for _ in 0..3 {
            let n = api.read_packets(address(), &mut info, &mut data).unwrap();
            for header in &info[..n] {
                if let Some(prev) = last {
                    assert!(header.timestamp > prev);
                }
                last = Some(header.timestamp);
            }
        }

        api.arm(2).unwrap();
        api.set_software_trigger(2).unwrap();
        api.read_packets(address(), &mut info, &mut data).unwrap();
        assert_eq!(info[0].timestamp, 0);
    }

    #[test]
    fn test_fault_injection_counts_down() {
        let api = open_rig();
        api.inject_fault(CallKind::InitProbe, FaultScope::Probe(address()), ErrorCode::Timeout, Some(2));

        assert_eq!(api.init_probe(address()), Err(ErrorCode::Timeout));
        assert_eq!(api.init_probe(address()), Err(ErrorCode::Timeout));
        assert!(api.init_probe(address()).is_ok());
    }

    #[test]
    fn test_fault_scope() {
        let api = SimulatedApi::with_rig(&[2, 3], 1);
        api.inject_fault(CallKind::OpenBasestation, FaultScope::Slot(3), ErrorCode::NoLink, None);

        assert!(api.open_basestation(2).is_ok());
        assert_eq!(api.open_basestation(3), Err(ErrorCode::NoLink));
    }

    #[test]
    fn test_commit_copies_pending_routing() {
        let api = open_rig();
        api.select_electrode(address(), 5, 0, ElectrodeBank::C).unwrap();
        assert_eq!(api.committed_routing(address()).unwrap()[5], ElectrodeBank::None);

        api.write_probe_configuration(address(), false).unwrap();
        assert_eq!(api.committed_routing(address()).unwrap()[5], ElectrodeBank::C);
    }

    #[test]
    fn test_calls_require_open_handles() {
        let api = SimulatedApi::with_rig(&[2], 1);
        assert_eq!(api.arm(2), Err(ErrorCode::NotOpen));
        assert_eq!(api.init_probe(address()), Err(ErrorCode::NotOpen));
    }
}
