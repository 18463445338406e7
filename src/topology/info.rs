//! Structured and human readable topology summaries

use std::fmt::Write;

use crate::basestation::{Basestation, SyncRole};
use crate::probe::Probe;
use crate::protocol::{BasestationInfo, DeviceInfo, FleetInfo, ProbeInfo};
use crate::topology::identity::{DeviceIdentity, HasIdentity};

impl From<&DeviceIdentity> for DeviceInfo {
    fn from(identity: &DeviceIdentity) -> Self {
        Self {
            serial_number: identity.serial_number,
            part_number: identity.part_number.clone(),
            version: identity.version_string(),
        }
    }
}

pub fn probe_info(probe: &Probe) -> ProbeInfo {
    ProbeInfo {
        address: probe.address(),
        status: probe.status(),
        selected: probe.is_selected(),
        probe: probe.identity().into(),
        headstage: probe.headstage().identity().into(),
        flex: probe.flex().identity().into(),
        reference: probe.reference().index(),
        enabled_electrodes: probe.channel_map().enabled_electrodes().len(),
        fill_fraction: probe.fill_fraction(),
    }
}

pub fn basestation_info(basestation: &Basestation) -> BasestationInfo {
    BasestationInfo {
        slot: basestation.slot(),
        boot_version: basestation.identity().version_string(),
        connect_board: basestation.connect_board().identity().into(),
        connect_board_boot_version: basestation
            .connect_board()
            .boot_version
            .map(|v| v.to_string())
            .unwrap_or_default(),
        sync_role: basestation.sync_role(),
        saving_directory: basestation.saving_directory().map(|p| p.to_path_buf()),
        fill_percentage: basestation.fill_percentage(),
        probes: basestation.probes().iter().map(probe_info).collect(),
    }
}

/// Multi-line summary for status displays and logs
pub fn format_info(info: &FleetInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "API version: {}", info.api_version);

    for bs in &info.basestations {
        let _ = writeln!(out);
        let _ = writeln!(out, "Basestation slot {}", bs.slot);
        let _ = writeln!(out, "  Firmware version: {}", bs.boot_version);
        let _ = writeln!(out, "  BSC firmware version: {}", bs.connect_board_boot_version);
        let _ = writeln!(out, "  BSC version: {}", bs.connect_board.version);
        let _ = writeln!(out, "  BSC serial number: {}", bs.connect_board.serial_number);
        let _ = writeln!(out, "  BSC part number: {}", bs.connect_board.part_number);
        let sync = match bs.sync_role {
            SyncRole::Follower => "follower".to_string(),
            SyncRole::Input => "master (SMA input)".to_string(),
            SyncRole::Output { hz } => format!("master ({} Hz output)", hz),
        };
        let _ = writeln!(out, "  Sync: {}", sync);

        for probe in &bs.probes {
            let _ = writeln!(
                out,
                "  Probe port {} dock {} ({}{})",
                probe.address.port,
                probe.address.dock,
                probe.status,
                if probe.selected { ", selected" } else { "" }
            );
            let _ = writeln!(out, "    Serial number: {}", probe.probe.serial_number);
            let _ = writeln!(out, "    Part number: {}", probe.probe.part_number);
            let _ = writeln!(
                out,
                "    Headstage: {} serial {} version {}",
                probe.headstage.part_number, probe.headstage.serial_number, probe.headstage.version
            );
            let _ = writeln!(
                out,
                "    Flex: {} version {}",
                probe.flex.part_number, probe.flex.version
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcquisitionConfig;
    use crate::hardware::{NeuropixApi, SimulatedApi};
    use std::sync::Arc;

    #[test]
    fn test_info_tree_and_string() {
        let api: Arc<dyn NeuropixApi> = Arc::new(SimulatedApi::with_rig(&[2], 2));
        let bs = Basestation::open(api, 2, AcquisitionConfig::default()).unwrap();

        let info = FleetInfo {
            api_version: "3.0".to_string(),
            sync_master: None,
            basestations: vec![basestation_info(&bs)],
        };
        assert_eq!(info.basestations[0].boot_version, "2.1.169");
        assert_eq!(info.basestations[0].probes.len(), 2);
        assert_eq!(info.basestations[0].probes[1].probe.serial_number, 19_000_000_201);

        let text = format_info(&info);
        assert!(text.starts_with("API version: 3.0\n"));
        assert!(text.contains("Basestation slot 2"));
        assert!(text.contains("Probe port 1 dock 2 (connecting)"));
        assert!(text.contains("Flex: NPNH_FLEX_00 version 1.0"));
    }
}
