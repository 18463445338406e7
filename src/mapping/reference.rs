//! Channel reference selection

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::constants::{NUM_CHANNELS, REF_ELECTRODES};
use crate::error::{HardwareContext, HardwareError};
use crate::hardware::{ElectrodeBank, NeuropixApi, ProbeAddress, ReferenceType};
use crate::mapping::bank::Bank;

/// Reference applied to every channel of a probe
///
/// Index form: 0 = external, 1 = tip, 2..=5 = internal reference in bank A..D.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceSelection {
    #[default]
    External,
    Tip,
    Internal(Bank),
}

impl ReferenceSelection {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ReferenceSelection::External),
            1 => Some(ReferenceSelection::Tip),
            n => Bank::from_index(n - 2).map(ReferenceSelection::Internal),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ReferenceSelection::External => 0,
            ReferenceSelection::Tip => 1,
            ReferenceSelection::Internal(bank) => bank.index() + 2,
        }
    }

    pub fn reference_type(&self) -> ReferenceType {
        match self {
            ReferenceSelection::External => ReferenceType::External,
            ReferenceSelection::Tip => ReferenceType::Tip,
            ReferenceSelection::Internal(_) => ReferenceType::Internal,
        }
    }

    /// Bank argument of the set-reference call
    pub fn bank(&self) -> ElectrodeBank {
        match self {
            ReferenceSelection::Internal(bank) => bank.hardware(),
            _ => ElectrodeBank::None,
        }
    }

    /// Electrode used as internal reference, if any
    pub fn electrode(&self) -> Option<usize> {
        match self {
            ReferenceSelection::Internal(bank) => Some(REF_ELECTRODES[bank.index()]),
            _ => None,
        }
    }

    /// Set the reference on every channel, then commit once
    ///
    /// Per-channel failures are collected; the commit is attempted regardless.
    pub fn apply(
        &self,
        api: &dyn NeuropixApi,
        address: ProbeAddress,
        shank: u8,
    ) -> Result<(), Vec<HardwareError>> {
        let mut failures = Vec::new();
        for channel in 0..NUM_CHANNELS as u16 {
            if let Err(e) = api
                .set_reference(address, channel, shank, self.reference_type(), self.bank())
                .context("set reference")
            {
                failures.push(e);
            }
        }

        if let Err(e) = api
            .write_probe_configuration(address, false)
            .context("write probe configuration")
        {
            failures.push(e);
        }

        if failures.is_empty() {
            info!("{}: reference set to {}", address, self);
            Ok(())
        } else {
            warn!(
                "{}: reference {} applied with {} failures, first: {}",
                address,
                self,
                failures.len(),
                failures[0]
            );
            Err(failures)
        }
    }
}

impl fmt::Display for ReferenceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSelection::External => write!(f, "external"),
            ReferenceSelection::Tip => write!(f, "tip"),
            ReferenceSelection::Internal(bank) => write!(f, "internal bank {}", bank),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ApiCall, CallKind, ErrorCode, FaultScope, SimulatedApi};

    #[test]
    fn test_index_mapping() {
        for index in 0..6 {
            let selection = ReferenceSelection::from_index(index).unwrap();
            assert_eq!(selection.index(), index);
        }
        assert_eq!(ReferenceSelection::from_index(2), Some(ReferenceSelection::Internal(Bank::A)));
        assert_eq!(ReferenceSelection::from_index(5), Some(ReferenceSelection::Internal(Bank::D)));
        assert_eq!(ReferenceSelection::from_index(6), None);
    }

    #[test]
    fn test_internal_reference_electrodes() {
        assert_eq!(ReferenceSelection::Internal(Bank::C).electrode(), Some(888));
        assert_eq!(ReferenceSelection::Tip.electrode(), None);
        assert_eq!(ReferenceSelection::Tip.bank(), ElectrodeBank::None);
    }

    #[test]
    fn test_apply_sets_every_channel_then_commits() {
        let address = ProbeAddress::new(1, 2, 1);
        let api = SimulatedApi::with_rig(&[1], 4);
        api.open_basestation(1).unwrap();
        api.open_probe(address).unwrap();

        ReferenceSelection::Internal(Bank::B)
            .apply(&api, address, 0)
            .unwrap();

        let sets = api.count_calls(|c| {
            matches!(
                c,
                ApiCall::SetReference { reference: ReferenceType::Internal, bank: ElectrodeBank::B, .. }
            )
        });
        assert_eq!(sets, NUM_CHANNELS);
        assert!(matches!(api.calls().last(), Some(ApiCall::WriteProbeConfiguration(_))));
    }

    #[test]
    fn test_apply_reports_commit_failure() {
        let address = ProbeAddress::new(1, 1, 1);
        let api = SimulatedApi::with_rig(&[1], 1);
        api.open_basestation(1).unwrap();
        api.open_probe(address).unwrap();
        api.inject_fault(CallKind::WriteProbeConfiguration, FaultScope::Any, ErrorCode::Timeout, None);

        let failures = ReferenceSelection::Tip.apply(&api, address, 0).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, "write probe configuration");
    }
}
