//! Channel → electrode routing table

use crate::constants::{NUM_CHANNELS, NUM_ELECTRODES};
use crate::hardware::ElectrodeBank;
use crate::mapping::bank::{electrode_for_channel, electrode_site, Bank, ElectrodeSite};

/// Enabled electrodes per channel, in the order they were routed
///
/// A channel may collect more than one enabled electrode when a mask enables
/// several banks on the same wiring. The last one routed is the active
/// contributor, matching the order the hardware receives select calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    channels: Vec<Vec<ElectrodeSite>>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMap {
    pub fn new() -> Self {
        Self {
            channels: vec![Vec::new(); NUM_CHANNELS],
        }
    }

    /// Record `site` as routed to its channel
    pub fn insert(&mut self, site: ElectrodeSite) {
        if let Some(contributors) = self.channels.get_mut(site.channel) {
            contributors.push(site);
        }
    }

    /// Enabled electrodes routed to `channel`
    pub fn electrodes(&self, channel: usize) -> Vec<usize> {
        self.channels
            .get(channel)
            .map(|sites| sites.iter().map(|s| s.electrode).collect())
            .unwrap_or_default()
    }

    /// Electrode the channel records from
    pub fn active(&self, channel: usize) -> Option<&ElectrodeSite> {
        self.channels.get(channel).and_then(|sites| sites.last())
    }

    /// Bank each channel is routed to; unrouted channels are disconnected
    pub fn bank_routing(&self) -> Vec<ElectrodeBank> {
        (0..NUM_CHANNELS)
            .map(|channel| {
                self.active(channel)
                    .map(|site| site.bank.hardware())
                    .unwrap_or(ElectrodeBank::None)
            })
            .collect()
    }

    /// Every enabled electrode, ascending
    pub fn enabled_electrodes(&self) -> Vec<usize> {
        let mut electrodes: Vec<usize> = self
            .channels
            .iter()
            .flat_map(|sites| sites.iter().map(|s| s.electrode))
            .collect();
        electrodes.sort_unstable();
        electrodes
    }

    /// Rebuild the per-electrode enable mask
    pub fn to_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; NUM_ELECTRODES];
        for electrode in self.enabled_electrodes() {
            mask[electrode] = true;
        }
        mask
    }

    /// Channels with at least one enabled electrode
    pub fn routed_channels(&self) -> usize {
        self.channels.iter().filter(|sites| !sites.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.routed_channels() == 0
    }

    /// Channels receiving more than one enabled electrode
    pub fn conflicts(&self) -> impl Iterator<Item = (usize, &[ElectrodeSite])> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, sites)| sites.len() > 1)
            .map(|(channel, sites)| (channel, sites.as_slice()))
    }

    /// Electrodes wired to `channel` in any bank, whether enabled or not
    pub fn candidates(channel: usize) -> Vec<ElectrodeSite> {
        Bank::ALL
            .iter()
            .filter_map(|&bank| electrode_for_channel(channel, bank))
            .filter_map(|electrode| electrode_site(electrode).ok())
            .collect()
    }
}
