//! Basestation orchestrator
//!
//! Owns the probes behind one hardware slot and drives their shared
//! lifecycle: initialization, arming, the basestation-wide software trigger,
//! sync role and file streaming.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AcquisitionConfig;
use crate::constants::SYNC_FREQUENCIES_HZ;
use crate::error::{Error, HardwareContext, HardwareError, Result, TopologyError};
use crate::hardware::{NeuropixApi, ProbeAddress, SyncSource, VersionInfo};
use crate::mapping::{MappingReport, ReferenceSelection};
use crate::probe::{Probe, ProbeStatus};
use crate::topology::{discover_probes, ConnectBoard, DeviceIdentity, HasIdentity};

/// Role of a basestation on the sync line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum SyncRole {
    /// Follows the fleet's sync master
    #[default]
    Follower,
    /// Master, sync taken from the SMA line input
    Input,
    /// Master, driving the sync clock at `hz`
    Output { hz: u32 },
}

impl SyncRole {
    pub fn is_master(&self) -> bool {
        !matches!(self, SyncRole::Follower)
    }
}

/// One basestation and its probes
pub struct Basestation {
    slot: u8,
    api: Arc<dyn NeuropixApi>,
    settings: AcquisitionConfig,
    identity: DeviceIdentity,
    connect_board: ConnectBoard,
    probes: Vec<Probe>,
    probes_initialized: bool,
    sync_role: SyncRole,
    saving_directory: Option<PathBuf>,
    file_stream: Option<PathBuf>,
    closed: bool,
}

impl Basestation {
    /// Open the basestation in `slot` and discover its probes
    pub fn open(api: Arc<dyn NeuropixApi>, slot: u8, settings: AcquisitionConfig) -> std::result::Result<Self, HardwareError> {
        api.open_basestation(slot).context("open basestation")?;

        let mut basestation = Self {
            slot,
            api: api.clone(),
            settings,
            identity: DeviceIdentity::default(),
            connect_board: ConnectBoard::new(slot),
            probes: Vec::new(),
            probes_initialized: false,
            sync_role: SyncRole::default(),
            saving_directory: None,
            file_stream: None,
            closed: false,
        };

        basestation.get_info(api.as_ref());
        basestation.connect_board.get_info(api.as_ref());
        basestation.probes = discover_probes(&api, slot);

        info!(
            "Opened basestation in slot {} with {} probes",
            slot,
            basestation.probes.len()
        );
        Ok(basestation)
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Boot firmware version of the basestation
    pub fn boot_version(&self) -> Option<VersionInfo> {
        self.identity.version
    }

    pub fn connect_board(&self) -> &ConnectBoard {
        &self.connect_board
    }

    pub fn settings(&self) -> &AcquisitionConfig {
        &self.settings
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn probes_mut(&mut self) -> &mut [Probe] {
        &mut self.probes
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn probe(&self, address: ProbeAddress) -> Option<&Probe> {
        self.probes.iter().find(|p| p.address() == address)
    }

    pub fn probe_mut(&mut self, address: ProbeAddress) -> Option<&mut Probe> {
        self.probes.iter_mut().find(|p| p.address() == address)
    }

    /// Initialize every probe; one failure does not stop its siblings
    pub fn init(&mut self) -> Vec<(ProbeAddress, HardwareError)> {
        let mut failures = Vec::new();
        for probe in &self.probes {
            if let Err(e) = probe.init() {
                warn!("Probe {}: {}", probe.address(), e);
                failures.push((probe.address(), e));
            }
        }
        failures
    }

    /// One-shot probe setup, then arm
    ///
    /// The per-probe setup runs on the first call only; every call arms.
    pub fn initialize_probes(&mut self) -> std::result::Result<(), HardwareError> {
        if !self.probes_initialized {
            for probe in &self.probes {
                if probe.prepare().is_empty() {
                    info!("Probe {} ready", probe.address());
                }
            }
            self.probes_initialized = true;
        }
        self.arm()
    }

    /// Arm the basestation and mark its connected probes armed
    pub fn arm(&mut self) -> std::result::Result<(), HardwareError> {
        self.api.arm(self.slot).context("arm")?;
        for probe in self.probes.iter_mut().filter(|p| p.status().is_connected()) {
            if let Err(e) = probe.mark_armed() {
                warn!("Probe {}: {}", probe.address(), e);
            }
        }
        Ok(())
    }

    /// Start every armed probe's polling thread, then trigger
    ///
    /// Each probe's buffer is cleared before its thread starts. The trigger
    /// is issued once for the whole basestation.
    pub fn start_acquisition(&mut self) -> Result<()> {
        let packets_per_read = self.settings.packets_per_read;
        let mut first_error: Option<Error> = None;
        let mut started = 0;

        for probe in self.probes.iter_mut() {
            if probe.status() != ProbeStatus::Armed {
                warn!("Probe {} is {}, not starting", probe.address(), probe.status());
                continue;
            }
            match probe.start(packets_per_read) {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!("Probe {}: {}", probe.address(), e);
                    first_error.get_or_insert(e.into());
                }
            }
        }

        self.api
            .set_software_trigger(self.slot)
            .context("software trigger")?;
        info!("Slot {}: triggered {} probes", self.slot, started);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every polling thread, then re-arm
    ///
    /// Teardown always runs to completion; the first failure is returned.
    pub fn stop_acquisition(&mut self) -> Result<()> {
        let timeout = self.settings.stop_timeout();
        let mut first_error: Option<Error> = None;

        for probe in self.probes.iter_mut() {
            if let Err(e) = probe.stop(timeout) {
                warn!("Probe {}: {}", probe.address(), e);
                first_error.get_or_insert(e.into());
            }
        }

        if let Err(e) = self.arm() {
            warn!("Slot {}: {}", self.slot, e);
            first_error.get_or_insert(e.into());
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of probes with a running polling thread
    pub fn running_probes(&self) -> usize {
        self.probes.iter().filter(|p| p.is_running()).count()
    }

    /// Highest FIFO fill fraction across this basestation's probes
    pub fn fill_percentage(&self) -> f32 {
        self.probes
            .iter()
            .map(|p| p.fill_fraction())
            .fold(0.0, f32::max)
    }

    /// Become sync master with the SMA line as input
    pub fn set_sync_as_input(&mut self) -> std::result::Result<(), HardwareError> {
        self.api.set_sync_master(self.slot).context("set sync master")?;
        self.api
            .set_sync_source(self.slot, SyncSource::Sma)
            .context("set sync source")?;
        self.sync_role = SyncRole::Input;
        info!("Slot {} is sync master (SMA input)", self.slot);
        Ok(())
    }

    /// Become sync master driving the clock at `sync_frequencies()[index]`
    pub fn set_sync_as_output(&mut self, index: usize) -> Result<()> {
        let hz = *SYNC_FREQUENCIES_HZ
            .get(index)
            .ok_or(TopologyError::InvalidSyncFrequency {
                index,
                available: SYNC_FREQUENCIES_HZ.len(),
            })?;

        self.api.set_sync_master(self.slot).context("set sync master")?;
        self.api
            .set_sync_source(self.slot, SyncSource::Clock)
            .context("set sync source")?;
        self.api
            .set_sync_frequency(self.slot, hz)
            .context("set sync frequency")?;
        self.sync_role = SyncRole::Output { hz };
        info!("Slot {} is sync master ({} Hz output)", self.slot, hz);
        Ok(())
    }

    /// Drop back to follower without touching hardware
    pub fn clear_sync_role(&mut self) {
        self.sync_role = SyncRole::Follower;
    }

    pub fn sync_role(&self) -> SyncRole {
        self.sync_role
    }

    /// Supported sync output frequencies (Hz)
    pub fn sync_frequencies(&self) -> &'static [u32] {
        &SYNC_FREQUENCIES_HZ
    }

    /// Route `mask` on one of this basestation's probes
    pub fn set_channels(&mut self, address: ProbeAddress, mask: &[bool]) -> Result<MappingReport> {
        let probe = self
            .probe_mut(address)
            .ok_or(TopologyError::UnknownProbe(address))?;
        Ok(probe.select_electrodes(mask)?)
    }

    /// Apply a reference on one of this basestation's probes
    pub fn set_reference(&mut self, address: ProbeAddress, reference: ReferenceSelection) -> Result<()> {
        let probe = self
            .probe_mut(address)
            .ok_or(TopologyError::UnknownProbe(address))?;
        probe
            .set_reference(reference)
            .map_err(|failures| match failures.into_iter().next() {
                Some(e) => Error::Hardware(e),
                None => Error::Config("reference failed".to_string()),
            })
    }

    pub fn saving_directory(&self) -> Option<&Path> {
        self.saving_directory.as_deref()
    }

    pub fn set_saving_directory(&mut self, directory: Option<PathBuf>) {
        self.saving_directory = directory;
    }

    /// Stream this basestation's raw data to `path`
    pub fn start_file_stream(&mut self, path: &Path) -> std::result::Result<(), HardwareError> {
        self.api
            .set_file_stream(self.slot, path)
            .context("set file stream")?;
        self.api
            .enable_file_stream(self.slot, true)
            .context("enable file stream")?;
        self.file_stream = Some(path.to_path_buf());
        info!("Slot {} streaming to {}", self.slot, path.display());
        Ok(())
    }

    pub fn stop_file_stream(&mut self) -> std::result::Result<(), HardwareError> {
        if self.file_stream.take().is_none() {
            return Ok(());
        }
        self.api
            .enable_file_stream(self.slot, false)
            .context("disable file stream")
    }

    pub fn file_stream(&self) -> Option<&Path> {
        self.file_stream.as_deref()
    }

    /// Stop acquisition, close every probe port and the basestation handle
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let timeout = self.settings.stop_timeout();
        for probe in self.probes.iter_mut() {
            if let Err(e) = probe.stop(timeout) {
                warn!("Probe {}: {}", probe.address(), e);
            }
        }
        if let Err(e) = self.stop_file_stream() {
            warn!("Slot {}: {}", self.slot, e);
        }

        let ports: BTreeSet<u8> = self.probes.iter().map(|p| p.address().port).collect();
        for port in ports {
            if let Err(e) = self.api.close_port(self.slot, port).context("close port") {
                warn!("Slot {} port {}: {}", self.slot, port, e);
            }
        }
        if let Err(e) = self.api.close_basestation(self.slot).context("close basestation") {
            warn!("Slot {}: {}", self.slot, e);
        }
        info!("Closed basestation in slot {}", self.slot);
    }
}

impl HasIdentity for Basestation {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        identity.version =
            identity.record_optional("basestation boot version", api.basestation_boot_version(self.slot));
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

impl Drop for Basestation {
    fn drop(&mut self) {
        self.close();
    }
}
