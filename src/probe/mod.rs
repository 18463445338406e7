//! Probe entity
//!
//! A probe is addressed by (slot, port, dock) and owns its headstage and flex
//! identities, its channel routing, its destination buffer and its
//! acquisition engine.

pub mod status;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::acquisition::{
    create_shared_buffer, AcquisitionEngine, AcquisitionStats, EngineState, ProbeLink,
    SharedRingBuffer,
};
use crate::error::{AcquisitionError, HardwareContext, HardwareError, MappingError};
use crate::hardware::{NeuropixApi, OpMode, ProbeAddress};
use crate::mapping::{ChannelMap, ElectrodeMapper, MappingReport, ReferenceSelection};
use crate::topology::{DeviceIdentity, Flex, HasIdentity, Headstage};

pub use status::{ProbeEvent, ProbeStatus};

/// Status fields that external callers may read concurrently
#[derive(Debug, Default)]
struct ProbeState {
    status: ProbeStatus,
    selected: bool,
}

/// A single Neuropixels 2.0 probe
pub struct Probe {
    address: ProbeAddress,
    shank: u8,
    api: Arc<dyn NeuropixApi>,
    identity: DeviceIdentity,
    headstage: Headstage,
    flex: Flex,
    state: Mutex<ProbeState>,
    channel_map: ChannelMap,
    reference: ReferenceSelection,
    engine: AcquisitionEngine,
    buffer: Option<SharedRingBuffer>,
}

impl Probe {
    /// Open the probe handle and read its identity
    pub fn open(api: Arc<dyn NeuropixApi>, address: ProbeAddress) -> Result<Self, HardwareError> {
        api.open_probe(address).context("open probe")?;

        let mut probe = Self {
            address,
            shank: 0,
            api: api.clone(),
            identity: DeviceIdentity::default(),
            headstage: Headstage::new(address.slot, address.port),
            flex: Flex::new(address),
            state: Mutex::new(ProbeState::default()),
            channel_map: ChannelMap::new(),
            reference: ReferenceSelection::default(),
            engine: AcquisitionEngine::new(address),
            buffer: None,
        };

        probe.get_info(api.as_ref());
        probe.headstage.get_info(api.as_ref());
        probe.flex.get_info(api.as_ref());
        probe.apply_event(ProbeEvent::Opened);
        Ok(probe)
    }

    pub fn address(&self) -> ProbeAddress {
        self.address
    }

    pub fn serial_number(&self) -> u64 {
        self.identity.serial_number
    }

    pub fn headstage(&self) -> &Headstage {
        &self.headstage
    }

    pub fn flex(&self) -> &Flex {
        &self.flex
    }

    pub fn status(&self) -> ProbeStatus {
        self.state.lock().status
    }

    pub fn is_selected(&self) -> bool {
        self.state.lock().selected
    }

    pub fn set_selected(&self, selected: bool) {
        self.state.lock().selected = selected;
    }

    /// Initialize the probe hardware; Connecting → Connected
    pub fn init(&self) -> Result<(), HardwareError> {
        self.api.init_probe(self.address).context("init probe")?;
        self.apply_event(ProbeEvent::Initialized);
        info!("Initialized probe {} (serial {})", self.address, self.serial_number());
        Ok(())
    }

    /// Recording mode, headstage LED off, counters zeroed
    ///
    /// Returns every call that failed; the remaining steps still run.
    pub fn prepare(&self) -> Vec<HardwareError> {
        let mut failures = Vec::new();

        if let Err(e) = self
            .api
            .set_operating_mode(self.address, OpMode::Recording)
            .context("set operating mode")
        {
            failures.push(e);
        }
        if let Err(e) = self
            .api
            .set_headstage_led(self.address.slot, self.address.port, false)
            .context("set headstage led")
        {
            failures.push(e);
        }
        self.engine.monitor().reset();

        for e in &failures {
            warn!("{}: {}", self.address, e);
        }
        failures
    }

    /// Record that the basestation has been armed
    pub fn mark_armed(&mut self) -> Result<(), AcquisitionError> {
        self.engine.arm()?;
        self.apply_event(ProbeEvent::Armed);
        Ok(())
    }

    /// Allocate (or replace) the destination ring buffer
    pub fn allocate_buffer(&mut self, capacity: usize) -> SharedRingBuffer {
        let buffer = create_shared_buffer(capacity);
        self.buffer = Some(buffer.clone());
        buffer
    }

    pub fn buffer(&self) -> Option<&SharedRingBuffer> {
        self.buffer.as_ref()
    }

    /// Start the polling thread; the buffer is cleared first
    pub fn start(&mut self, packets_per_read: usize) -> Result<(), AcquisitionError> {
        let buffer = self
            .buffer
            .clone()
            .ok_or(AcquisitionError::NoBuffer(self.address))?;
        let source = ProbeLink::new(self.api.clone(), self.address);

        self.engine.start(source, buffer, packets_per_read)?;
        self.apply_event(ProbeEvent::Started);
        Ok(())
    }

    /// Stop the polling thread within `timeout`
    pub fn stop(&mut self, timeout: Duration) -> Result<(), AcquisitionError> {
        let was_running = self.engine.state() == EngineState::Running;
        let result = self.engine.stop(timeout);
        if was_running {
            self.apply_event(ProbeEvent::Stopped);
        }
        result
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// FIFO fill fraction in [0.0, 1.0]
    pub fn fill_fraction(&self) -> f32 {
        self.engine.fill_fraction()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.engine.stats()
    }

    /// Route the electrodes enabled in `mask`
    ///
    /// The in-memory map is replaced whenever the mask is valid, even if some
    /// hardware calls failed.
    pub fn select_electrodes(&mut self, mask: &[bool]) -> Result<MappingReport, MappingError> {
        let report = ElectrodeMapper::new(self.api.as_ref(), self.address, self.shank).apply(mask)?;
        self.channel_map = report.map.clone();
        Ok(report)
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Apply a reference to every channel
    pub fn set_reference(&mut self, reference: ReferenceSelection) -> Result<(), Vec<HardwareError>> {
        self.reference = reference;
        reference.apply(self.api.as_ref(), self.address, self.shank)
    }

    pub fn reference(&self) -> ReferenceSelection {
        self.reference
    }

    /// Move to the next status; invalid transitions are logged and ignored
    fn apply_event(&self, event: ProbeEvent) {
        let mut state = self.state.lock();
        match state.status.transition(event) {
            Ok(next) => {
                debug!("{}: {} -> {}", self.address, state.status, next);
                state.status = next;
            }
            Err(e) => warn!("{}: {}", self.address, e),
        }
    }
}

impl HasIdentity for Probe {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        identity.serial_number = identity.record("probe serial number", api.probe_serial_number(self.address));
        identity.part_number = identity.record("probe part number", api.probe_part_number(self.address));
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}
