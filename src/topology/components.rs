//! Sub-units of a basestation and of a probe

use crate::hardware::{NeuropixApi, ProbeAddress, VersionInfo};
use crate::topology::identity::{DeviceIdentity, HasIdentity};

/// Version of the vendor library itself
#[derive(Debug, Clone, Default)]
pub struct ApiInfo {
    identity: DeviceIdentity,
}

impl ApiInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HasIdentity for ApiInfo {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        identity.version = identity.record_optional("api version", api.api_version());
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

/// Connect board (BSC) of a basestation
#[derive(Debug, Clone)]
pub struct ConnectBoard {
    pub slot: u8,
    /// Boot firmware version of the connect board
    pub boot_version: Option<VersionInfo>,
    identity: DeviceIdentity,
}

impl ConnectBoard {
    pub fn new(slot: u8) -> Self {
        Self {
            slot,
            boot_version: None,
            identity: DeviceIdentity::default(),
        }
    }
}

impl HasIdentity for ConnectBoard {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        self.boot_version = identity.record_optional("bsc boot version", api.bsc_boot_version(self.slot));
        identity.version = identity.record_optional("bsc version", api.bsc_version(self.slot));
        identity.serial_number = identity.record("bsc serial number", api.bsc_serial_number(self.slot));
        identity.part_number = identity.record("bsc part number", api.bsc_part_number(self.slot));
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

/// Headstage a probe is docked on
#[derive(Debug, Clone)]
pub struct Headstage {
    pub slot: u8,
    pub port: u8,
    identity: DeviceIdentity,
}

impl Headstage {
    pub fn new(slot: u8, port: u8) -> Self {
        Self {
            slot,
            port,
            identity: DeviceIdentity::default(),
        }
    }
}

impl HasIdentity for Headstage {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        identity.version = identity.record_optional("headstage version", api.headstage_version(self.slot, self.port));
        identity.serial_number =
            identity.record("headstage serial number", api.headstage_serial_number(self.slot, self.port));
        identity.part_number =
            identity.record("headstage part number", api.headstage_part_number(self.slot, self.port));
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

/// Flex cable between headstage and probe
#[derive(Debug, Clone)]
pub struct Flex {
    pub address: ProbeAddress,
    identity: DeviceIdentity,
}

impl Flex {
    pub fn new(address: ProbeAddress) -> Self {
        Self {
            address,
            identity: DeviceIdentity::default(),
        }
    }
}

impl HasIdentity for Flex {
    fn get_info(&mut self, api: &dyn NeuropixApi) {
        let mut identity = DeviceIdentity::default();
        identity.version = identity.record_optional("flex version", api.flex_version(self.address));
        identity.part_number = identity.record("flex part number", api.flex_part_number(self.address));
        self.identity = identity;
    }

    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{CallKind, ErrorCode, FaultScope, SimulatedApi};

    #[test]
    fn test_connect_board_info() {
        let api = SimulatedApi::with_rig(&[4], 1);
        api.open_basestation(4).unwrap();

        let mut bsc = ConnectBoard::new(4);
        bsc.get_info(&api);
        assert_eq!(bsc.identity().part_number, "NP2_QBSC_00");
        assert_eq!(bsc.identity().version_string(), "1.0");
        assert_eq!(bsc.boot_version.map(|v| v.to_string()), Some("3.2.176".to_string()));
        assert!(bsc.identity().is_complete());
    }

    #[test]
    fn test_partial_headstage_info() {
        let api = SimulatedApi::with_rig(&[0], 1);
        api.open_basestation(0).unwrap();
        api.inject_fault(CallKind::HeadstageSerialNumber, FaultScope::Any, ErrorCode::IicError, None);

        let mut headstage = Headstage::new(0, 1);
        headstage.get_info(&api);
        assert_eq!(headstage.identity().serial_number, 0);
        assert_eq!(headstage.identity().part_number, "NPNH_HS_30");
        assert_eq!(headstage.identity().errors.len(), 1);
    }

    #[test]
    fn test_api_info() {
        let api = SimulatedApi::with_rig(&[], 0);
        let mut info = ApiInfo::new();
        info.get_info(&api);
        assert_eq!(info.identity().version_string(), "3.0");
    }
}
