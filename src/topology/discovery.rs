//! Hardware enumeration

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::basestation::Basestation;
use crate::config::AcquisitionConfig;
use crate::constants::{MAX_NUM_SLOTS, MIN_PROBE_SERIAL, NUM_DOCKS, NUM_PORTS};
use crate::error::HardwareContext;
use crate::hardware::{NeuropixApi, ProbeAddress};
use crate::probe::Probe;

/// Slots whose bit is set in an enumeration mask, ascending
pub fn slots_in_mask(mask: u32) -> impl Iterator<Item = u8> {
    (0..MAX_NUM_SLOTS).filter(move |slot| mask & (1u32 << slot) != 0)
}

/// Probes below the minimum serial are simulated or ghost entries
pub fn is_valid_serial(serial_number: u64) -> bool {
    serial_number >= MIN_PROBE_SERIAL
}

/// Open every basestation in `slot_mask`
///
/// A basestation that fails to open is skipped; its siblings are still opened.
pub fn discover(
    api: &Arc<dyn NeuropixApi>,
    slot_mask: u32,
    settings: &AcquisitionConfig,
) -> Vec<Basestation> {
    let mut basestations = Vec::new();

    for slot in slots_in_mask(slot_mask) {
        match Basestation::open(api.clone(), slot, settings.clone()) {
            Ok(basestation) => basestations.push(basestation),
            Err(e) => warn!("Slot {}: {}", slot, e),
        }
    }

    info!("Discovered {} basestations", basestations.len());
    basestations
}

/// Open every (port, dock) pair of an open basestation
pub fn discover_probes(api: &Arc<dyn NeuropixApi>, slot: u8) -> Vec<Probe> {
    let mut probes = Vec::new();

    for port in 1..=NUM_PORTS {
        let kept_before = probes.len();
        let mut rejected = false;

        for dock in 1..=NUM_DOCKS {
            let address = ProbeAddress::new(slot, port, dock);
            let probe = match Probe::open(api.clone(), address) {
                Ok(probe) => probe,
                Err(e) => {
                    debug!("{}: {}", address, e);
                    continue;
                }
            };

            if is_valid_serial(probe.serial_number()) {
                info!("Found probe {} (serial {})", address, probe.serial_number());
                probes.push(probe);
            } else {
                warn!(
                    "Ignoring probe {} with invalid serial number {}",
                    address,
                    probe.serial_number()
                );
                rejected = true;
            }
        }

        // Ports with kept probes are closed by the basestation
        if rejected && probes.len() == kept_before {
            if let Err(e) = api.close_port(slot, port).context("close port") {
                warn!("Slot {} port {}: {}", slot, port, e);
            }
        }
    }

    probes
}
