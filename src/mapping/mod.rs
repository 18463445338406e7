//! Electrode-channel mapping module

pub mod bank;
pub mod channel_map;
pub mod mapper;
pub mod reference;

pub use bank::{electrode_for_channel, electrode_site, Bank, ElectrodeSite};
pub use channel_map::ChannelMap;
pub use mapper::{ElectrodeMapper, MappingPlan, MappingReport};
pub use reference::ReferenceSelection;
