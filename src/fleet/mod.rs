//! Fleet controller
//!
//! Owns every discovered basestation and exposes a single (slot, port, dock)
//! addressing scheme to the UI and the recording pipeline.

pub mod recording;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::acquisition::SharedRingBuffer;
use crate::basestation::Basestation;
use crate::config::AppConfig;
use crate::error::{Error, HardwareContext, MappingError, Result, TopologyError};
use crate::hardware::{NeuropixApi, ProbeAddress};
use crate::mapping::{MappingReport, ReferenceSelection};
use crate::probe::{Probe, ProbeStatus};
use crate::protocol::{
    electrodes_to_mask, FleetInfo, ProbeSettings, ProbeStatusReport, RecordingInfo, SlotFill,
    SystemStatus,
};
use crate::topology::{self, ApiInfo, HasIdentity};

pub use recording::{recording_file_name, recording_path, RecordingSession};

/// All basestations of one acquisition rig
pub struct Fleet {
    api: Arc<dyn NeuropixApi>,
    config: AppConfig,
    api_info: ApiInfo,
    basestations: Vec<Basestation>,
    sync_master: Option<u8>,
    acquiring: bool,
    recording: RecordingSession,
    created: Instant,
}

impl Fleet {
    /// Enumerate slots and open every basestation found
    pub fn discover(api: Arc<dyn NeuropixApi>, config: AppConfig) -> Result<Self> {
        let mut api_info = ApiInfo::new();
        api_info.get_info(api.as_ref());
        info!("Neuropixels API version {}", api_info.identity().version_string());

        let slot_mask = api.available_slots().context("scan basestations")?;
        let mut basestations = topology::discover(&api, slot_mask, &config.acquisition);

        for basestation in basestations.iter_mut() {
            let directory = config.saving_directory(basestation.slot()).map(Path::to_path_buf);
            basestation.set_saving_directory(directory);
        }

        Ok(Self {
            api,
            config,
            api_info,
            basestations,
            sync_master: None,
            acquiring: false,
            recording: RecordingSession::new(),
            created: Instant::now(),
        })
    }

    /// Initialize every basestation and prepare its probes for acquisition
    ///
    /// The first basestation with probes becomes sync master and its first
    /// probe is selected. Each probe gets its own ring buffer.
    pub fn open_connection(&mut self) -> Result<()> {
        let capacity = self.config.acquisition.ring_buffer_capacity;
        let mut master: Option<u8> = None;

        for basestation in self.basestations.iter_mut() {
            for (address, e) in basestation.init() {
                warn!("Probe {} failed to initialize: {}", address, e);
            }
            if basestation.probe_count() == 0 {
                continue;
            }

            if master.is_none() {
                let result = if self.config.sync.output {
                    basestation.set_sync_as_output(self.config.sync.frequency_index)
                } else {
                    basestation.set_sync_as_input().map_err(Error::from)
                };
                if let Err(e) = result {
                    warn!("Slot {}: sync setup failed: {}", basestation.slot(), e);
                }
                master = Some(basestation.slot());
                if let Some(first) = basestation.probes().first() {
                    first.set_selected(true);
                }
            }

            for probe in basestation.probes_mut() {
                probe.allocate_buffer(capacity);
            }

            if let Err(e) = basestation.initialize_probes() {
                warn!("Slot {}: {}", basestation.slot(), e);
            }
        }

        self.sync_master = master;
        match master {
            Some(slot) => {
                info!(
                    "Connected {} probes on {} basestations; slot {} is sync master",
                    self.probe_count(),
                    self.basestations.len(),
                    slot
                );
                Ok(())
            }
            None => Err(TopologyError::NoBasestations.into()),
        }
    }

    pub fn api(&self) -> &Arc<dyn NeuropixApi> {
        &self.api
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn basestations(&self) -> &[Basestation] {
        &self.basestations
    }

    pub fn basestation(&self, slot: u8) -> Option<&Basestation> {
        self.basestations.iter().find(|b| b.slot() == slot)
    }

    pub fn basestation_mut(&mut self, slot: u8) -> Option<&mut Basestation> {
        self.basestations.iter_mut().find(|b| b.slot() == slot)
    }

    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.basestations.iter().flat_map(|b| b.probes().iter())
    }

    pub fn probe(&self, address: ProbeAddress) -> Option<&Probe> {
        self.basestation(address.slot).and_then(|b| b.probe(address))
    }

    pub fn probe_count(&self) -> usize {
        self.basestations.iter().map(|b| b.probe_count()).sum()
    }

    /// Status of a probe; unknown addresses read as disconnected
    pub fn probe_status(&self, address: ProbeAddress) -> ProbeStatus {
        self.probe(address)
            .map(|p| p.status())
            .unwrap_or(ProbeStatus::Disconnected)
    }

    pub fn is_selected(&self, address: ProbeAddress) -> bool {
        self.probe(address).map(|p| p.is_selected()).unwrap_or(false)
    }

    /// Select one probe, clearing any previous selection
    pub fn set_selected(&mut self, address: ProbeAddress) -> Result<()> {
        if self.probe(address).is_none() {
            warn!("Cannot select unknown probe {}", address);
            return Err(TopologyError::UnknownProbe(address).into());
        }
        for probe in self.probes() {
            probe.set_selected(probe.address() == address);
        }
        Ok(())
    }

    pub fn selected_probe(&self) -> Option<ProbeAddress> {
        self.probes().find(|p| p.is_selected()).map(|p| p.address())
    }

    /// Highest FIFO fill fraction on `slot`; 0.0 for an unknown slot
    pub fn fill_percentage(&self, slot: u8) -> f32 {
        self.basestation(slot)
            .map(|b| b.fill_percentage())
            .unwrap_or(0.0)
    }

    /// Start every basestation; one failure does not stop the others
    pub fn start_acquisition(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        for basestation in self.basestations.iter_mut() {
            if let Err(e) = basestation.start_acquisition() {
                error!("Slot {}: failed to start: {}", basestation.slot(), e);
                first_error.get_or_insert(e);
            }
        }
        self.acquiring = true;
        info!("Acquisition started on {} probes", self.running_probe_count());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every basestation; teardown always visits all of them
    pub fn stop_acquisition(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        for basestation in self.basestations.iter_mut() {
            if let Err(e) = basestation.stop_acquisition() {
                error!("Slot {}: failed to stop cleanly: {}", basestation.slot(), e);
                first_error.get_or_insert(e);
            }
        }
        self.acquiring = false;
        info!("Acquisition stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    pub fn running_probe_count(&self) -> usize {
        self.basestations.iter().map(|b| b.running_probes()).sum()
    }

    /// Open one file stream per basestation with probes
    pub fn start_recording(&mut self, root: &Path) -> Result<RecordingInfo> {
        if self.recording.active().is_some() {
            self.stop_recording()?;
        }

        let number = self.recording.next_number();
        let mut files = Vec::new();
        let mut first_error: Option<Error> = None;

        for basestation in self.basestations.iter_mut().filter(|b| b.probe_count() > 0) {
            let path = recording_path(root, basestation.saving_directory(), basestation.slot(), number);
            let result = match path.parent().map_or(Ok(()), std::fs::create_dir_all) {
                Ok(()) => basestation.start_file_stream(&path).map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            match result {
                Ok(()) => files.push(path),
                Err(e) => {
                    error!("Slot {}: recording not started: {}", basestation.slot(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if files.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        info!("Recording {} started: {} files", number, files.len());
        Ok(self.recording.begin(root, files))
    }

    /// Start a recording under the configured root
    pub fn start_recording_default(&mut self) -> Result<RecordingInfo> {
        let root = self.config.recording.root.clone();
        self.start_recording(&root)
    }

    /// Close every file stream
    pub fn stop_recording(&mut self) -> Result<Option<RecordingInfo>> {
        let mut first_error: Option<Error> = None;
        for basestation in self.basestations.iter_mut() {
            if let Err(e) = basestation.stop_file_stream() {
                warn!("Slot {}: {}", basestation.slot(), e);
                first_error.get_or_insert(e.into());
            }
        }

        let finished = self.recording.end();
        if let Some(info) = &finished {
            info!("Recording {} stopped", info.number);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(finished),
        }
    }

    pub fn recording(&self) -> Option<&RecordingInfo> {
        self.recording.active()
    }

    pub fn set_saving_directory(&mut self, slot: u8, directory: Option<PathBuf>) -> Result<()> {
        let basestation = self
            .basestation_mut(slot)
            .ok_or(TopologyError::UnknownSlot(slot))?;
        basestation.set_saving_directory(directory);
        Ok(())
    }

    /// Route an electrode enable mask on one probe
    pub fn select_electrodes(&mut self, address: ProbeAddress, mask: &[bool]) -> Result<MappingReport> {
        self.basestation_mut(address.slot)
            .ok_or(TopologyError::UnknownProbe(address))?
            .set_channels(address, mask)
    }

    pub fn set_reference(&mut self, address: ProbeAddress, reference: ReferenceSelection) -> Result<()> {
        self.basestation_mut(address.slot)
            .ok_or(TopologyError::UnknownProbe(address))?
            .set_reference(address, reference)
    }

    /// Apply a reference given in index form (0 = external, 1 = tip, 2..=5 = internal A..D)
    pub fn set_reference_index(&mut self, address: ProbeAddress, index: usize) -> Result<()> {
        let reference =
            ReferenceSelection::from_index(index).ok_or(MappingError::InvalidReference(index))?;
        self.set_reference(address, reference)
    }

    /// Make `slot` the sync master with the SMA line as input
    pub fn set_sync_input(&mut self, slot: u8) -> Result<()> {
        self.basestation_mut(slot)
            .ok_or(TopologyError::UnknownSlot(slot))?
            .set_sync_as_input()?;
        self.replace_master(slot);
        Ok(())
    }

    /// Make `slot` the sync master driving the clock
    pub fn set_sync_output(&mut self, slot: u8, frequency_index: usize) -> Result<()> {
        self.basestation_mut(slot)
            .ok_or(TopologyError::UnknownSlot(slot))?
            .set_sync_as_output(frequency_index)?;
        self.replace_master(slot);
        Ok(())
    }

    pub fn sync_master(&self) -> Option<u8> {
        self.sync_master
    }

    fn replace_master(&mut self, slot: u8) {
        for basestation in self.basestations.iter_mut().filter(|b| b.slot() != slot) {
            if basestation.sync_role().is_master() {
                info!("Slot {} is no longer sync master", basestation.slot());
                basestation.clear_sync_role();
            }
        }
        self.sync_master = Some(slot);
    }

    /// Destination buffer of a probe
    pub fn buffer(&self, address: ProbeAddress) -> Option<SharedRingBuffer> {
        self.probe(address).and_then(|p| p.buffer().cloned())
    }

    pub fn probe_report(&self, address: ProbeAddress) -> Option<ProbeStatusReport> {
        self.probe(address).map(|p| ProbeStatusReport {
            address,
            status: p.status(),
            selected: p.is_selected(),
            stats: p.stats(),
        })
    }

    pub fn info(&self) -> FleetInfo {
        FleetInfo {
            api_version: self.api_info.identity().version_string(),
            sync_master: self.sync_master,
            basestations: self
                .basestations
                .iter()
                .map(topology::basestation_info)
                .collect(),
        }
    }

    pub fn info_string(&self) -> String {
        topology::format_info(&self.info())
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            acquiring: self.acquiring,
            running_probes: self.running_probe_count(),
            probe_count: self.probe_count(),
            recording: self.recording.active().cloned(),
            fill: self
                .basestations
                .iter()
                .map(|b| SlotFill {
                    slot: b.slot(),
                    fill_percentage: b.fill_percentage(),
                })
                .collect(),
            uptime_seconds: self.created.elapsed().as_secs(),
        }
    }

    /// Replay saved channel masks and references
    ///
    /// Every entry is attempted; failures are returned per probe.
    pub fn apply_saved_settings(&mut self, settings: &[ProbeSettings]) -> Vec<(ProbeAddress, Error)> {
        let mut failures = Vec::new();

        for entry in settings {
            let address = entry.address;
            let mask = match electrodes_to_mask(&entry.enabled_electrodes) {
                Ok(mask) => mask,
                Err(e) => {
                    failures.push((address, e.into()));
                    continue;
                }
            };

            if let Err(e) = self.select_electrodes(address, &mask) {
                warn!("Probe {}: saved channel map not applied: {}", address, e);
                failures.push((address, e));
                continue;
            }
            if let Err(e) = self.set_reference_index(address, entry.reference) {
                warn!("Probe {}: saved reference not applied: {}", address, e);
                failures.push((address, e));
            }
        }

        info!(
            "Applied saved settings for {} of {} probes",
            settings.len() - failures.len(),
            settings.len()
        );
        failures
    }

    /// Stop acquisition and recording, then close all hardware
    pub fn close(&mut self) {
        if self.acquiring {
            if let Err(e) = self.stop_acquisition() {
                error!("Teardown: {}", e);
            }
        }
        if self.recording.active().is_some() {
            if let Err(e) = self.stop_recording() {
                error!("Teardown: {}", e);
            }
        }
        for basestation in self.basestations.iter_mut() {
            basestation.close();
        }
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        self.close();
    }
}
