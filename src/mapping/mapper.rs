//! Applies an electrode enable mask to a probe
//!
//! The mask is validated and fully resolved before the first hardware call, so
//! an invalid mask never leaves a probe half-configured. Hardware is then
//! driven in three steps: every channel disconnected, one select per enabled
//! electrode, a single configuration commit.

use tracing::{debug, info, warn};

use crate::constants::{NUM_CHANNELS, NUM_ELECTRODES};
use crate::error::{HardwareContext, HardwareError, MappingError};
use crate::hardware::{ElectrodeBank, NeuropixApi, ProbeAddress};
use crate::mapping::bank::{electrode_site, ElectrodeSite};
use crate::mapping::channel_map::ChannelMap;

/// Fully resolved routing for one mask
#[derive(Debug, Clone)]
pub struct MappingPlan {
    pub map: ChannelMap,
    /// Select calls in issue order
    pub selections: Vec<ElectrodeSite>,
}

/// Outcome of applying a plan to hardware
#[derive(Debug, Clone)]
pub struct MappingReport {
    /// In-memory routing; kept even when hardware calls failed
    pub map: ChannelMap,
    pub reset_failures: Vec<(u16, HardwareError)>,
    pub select_failures: Vec<(ElectrodeSite, HardwareError)>,
    pub commit: Result<(), HardwareError>,
}

impl MappingReport {
    /// True when every hardware call succeeded
    pub fn is_clean(&self) -> bool {
        self.reset_failures.is_empty() && self.select_failures.is_empty() && self.commit.is_ok()
    }
}

/// Electrode router for one probe
pub struct ElectrodeMapper<'a> {
    api: &'a dyn NeuropixApi,
    address: ProbeAddress,
    shank: u8,
}

impl<'a> ElectrodeMapper<'a> {
    pub fn new(api: &'a dyn NeuropixApi, address: ProbeAddress, shank: u8) -> Self {
        Self { api, address, shank }
    }

    /// Resolve a per-electrode mask without touching hardware
    pub fn plan(mask: &[bool]) -> Result<MappingPlan, MappingError> {
        if mask.len() != NUM_ELECTRODES {
            return Err(MappingError::MaskLength {
                expected: NUM_ELECTRODES,
                actual: mask.len(),
            });
        }

        let mut map = ChannelMap::new();
        let mut selections = Vec::new();
        for (electrode, _) in mask.iter().enumerate().filter(|(_, &on)| on) {
            let site = electrode_site(electrode)?;
            map.insert(site);
            selections.push(site);
        }

        Ok(MappingPlan { map, selections })
    }

    /// Route `mask` onto the probe
    ///
    /// Returns `Err` only for an invalid mask, in which case no hardware call
    /// was made. Hardware failures are collected in the report.
    pub fn apply(&self, mask: &[bool]) -> Result<MappingReport, MappingError> {
        let plan = Self::plan(mask)?;

        for (channel, sites) in plan.map.conflicts() {
            let electrodes: Vec<usize> = sites.iter().map(|s| s.electrode).collect();
            warn!(
                "{}: channel {} has {} enabled electrodes {:?}; electrode {} is active",
                self.address,
                channel,
                sites.len(),
                electrodes,
                electrodes.last().copied().unwrap_or_default()
            );
        }

        let reset_failures = self.disconnect_all();

        let mut select_failures = Vec::new();
        for site in &plan.selections {
            let result = self
                .api
                .select_electrode(self.address, site.channel as u16, self.shank, site.bank.hardware())
                .context("select electrode");
            match result {
                Ok(()) => debug!(
                    "{}: electrode {} -> channel {} bank {}",
                    self.address, site.electrode, site.channel, site.bank
                ),
                Err(e) => {
                    warn!("{}: electrode {}: {}", self.address, site.electrode, e);
                    select_failures.push((*site, e));
                }
            }
        }

        let commit = self
            .api
            .write_probe_configuration(self.address, false)
            .context("write probe configuration");
        match &commit {
            Ok(()) => info!(
                "{}: routed {} electrodes onto {} channels",
                self.address,
                plan.selections.len(),
                plan.map.routed_channels()
            ),
            Err(e) => warn!("{}: {}", self.address, e),
        }

        Ok(MappingReport {
            map: plan.map,
            reset_failures,
            select_failures,
            commit,
        })
    }

    /// Disconnect every channel from all banks
    fn disconnect_all(&self) -> Vec<(u16, HardwareError)> {
        let mut failures = Vec::new();
        for channel in 0..NUM_CHANNELS as u16 {
            if let Err(e) = self
                .api
                .select_electrode(self.address, channel, self.shank, ElectrodeBank::None)
                .context("disconnect channel")
            {
                failures.push((channel, e));
            }
        }
        if !failures.is_empty() {
            warn!(
                "{}: {} channels failed to disconnect",
                self.address,
                failures.len()
            );
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ApiCall, CallKind, ErrorCode, FaultScope, SimulatedApi};
    use crate::mapping::bank::Bank;

    fn address() -> ProbeAddress {
        ProbeAddress::new(0, 1, 1)
    }

    fn open_api() -> SimulatedApi {
        let api = SimulatedApi::with_rig(&[0], 1);
        api.open_basestation(0).unwrap();
        api.open_probe(address()).unwrap();
        api.clear_calls();
        api
    }

    fn mask_of(electrodes: &[usize]) -> Vec<bool> {
        let mut mask = vec![false; NUM_ELECTRODES];
        for &e in electrodes {
            mask[e] = true;
        }
        mask
    }

    #[test]
    fn test_single_electrode() {
        let api = open_api();
        let mapper = ElectrodeMapper::new(&api, address(), 0);

        let report = mapper.apply(&mask_of(&[0])).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.map.electrodes(0), vec![0]);

        let selects = api.count_calls(|c| {
            matches!(c, ApiCall::SelectElectrode { channel: 0, bank: ElectrodeBank::A, .. })
        });
        assert_eq!(selects, 1);

        let disconnects = api.count_calls(|c| {
            matches!(c, ApiCall::SelectElectrode { bank: ElectrodeBank::None, .. })
        });
        assert_eq!(disconnects, NUM_CHANNELS);

        let commits = api.count_calls(|c| matches!(c, ApiCall::WriteProbeConfiguration(_)));
        assert_eq!(commits, 1);
    }

    #[test]
    fn test_reset_precedes_selects() {
        let api = open_api();
        ElectrodeMapper::new(&api, address(), 0)
            .apply(&mask_of(&[10, 400]))
            .unwrap();

        let calls = api.calls();
        let first_select = calls
            .iter()
            .position(|c| matches!(c, ApiCall::SelectElectrode { bank, .. } if *bank != ElectrodeBank::None))
            .unwrap();
        assert_eq!(first_select, NUM_CHANNELS);
        assert!(matches!(calls.last(), Some(ApiCall::WriteProbeConfiguration(_))));
    }

    #[test]
    fn test_invalid_mask_makes_no_calls() {
        let api = open_api();
        let err = ElectrodeMapper::new(&api, address(), 0)
            .apply(&[true; 12])
            .unwrap_err();
        assert_eq!(err, MappingError::MaskLength { expected: NUM_ELECTRODES, actual: 12 });
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_round_trip_one_per_channel() {
        // One electrode per channel, cycling through the banks
        let mask: Vec<bool> = (0..NUM_ELECTRODES)
            .map(|e| {
                let site = electrode_site(e).unwrap();
                let wanted = Bank::from_index(site.channel % 3).unwrap();
                site.bank == wanted
            })
            .collect();

        let plan = ElectrodeMapper::plan(&mask).unwrap();
        assert_eq!(plan.map.routed_channels(), NUM_CHANNELS);
        assert_eq!(plan.map.conflicts().count(), 0);
        assert_eq!(plan.map.to_mask(), mask);
    }

    #[test]
    fn test_commit_failure_keeps_map() {
        let api = open_api();
        api.inject_fault(
            CallKind::WriteProbeConfiguration,
            FaultScope::Probe(address()),
            ErrorCode::ReadbackError,
            Some(1),
        );

        let report = ElectrodeMapper::new(&api, address(), 0)
            .apply(&mask_of(&[5, 700]))
            .unwrap();
        assert_eq!(report.commit.as_ref().unwrap_err().code, ErrorCode::ReadbackError);
        assert_eq!(report.map.enabled_electrodes(), vec![5, 700]);

        // Whatever hardware committed is covered by the in-memory map
        let committed = api.committed_routing(address()).unwrap();
        let routing = report.map.bank_routing();
        for (channel, bank) in committed.iter().enumerate() {
            if *bank != ElectrodeBank::None {
                assert_eq!(routing[channel], *bank);
            }
        }
    }

    #[test]
    fn test_committed_routing_matches_map() {
        let api = open_api();
        let report = ElectrodeMapper::new(&api, address(), 0)
            .apply(&mask_of(&[1, 385, 1200]))
            .unwrap();
        assert_eq!(api.committed_routing(address()).unwrap(), report.map.bank_routing());
    }

    #[test]
    fn test_select_failures_do_not_abort() {
        let api = open_api();
        // The first select call is the channel 0 disconnect
        api.inject_fault(
            CallKind::SelectElectrode,
            FaultScope::Any,
            ErrorCode::WrongChannel,
            Some(1),
        );
        let report = ElectrodeMapper::new(&api, address(), 0)
            .apply(&mask_of(&[2, 3]))
            .unwrap();
        assert_eq!(report.reset_failures.len(), 1);
        assert!(report.select_failures.is_empty());
        assert!(report.commit.is_ok());
        assert_eq!(
            api.count_calls(|c| matches!(c, ApiCall::SelectElectrode { bank: ElectrodeBank::A, .. })),
            2
        );
    }
}
