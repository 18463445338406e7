//! Device topology module

pub mod components;
pub mod discovery;
pub mod identity;
pub mod info;

pub use components::{ApiInfo, ConnectBoard, Flex, Headstage};
pub use discovery::{discover, discover_probes, is_valid_serial, slots_in_mask};
pub use identity::{DeviceIdentity, HasIdentity};
pub use info::{basestation_info, format_info, probe_info};
