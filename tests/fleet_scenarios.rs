//! End-to-end scenarios against the simulated rig

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use npx2_acquisition::config::{AppConfig, SlotDirectory};
use npx2_acquisition::constants::{NUM_CHANNELS, NUM_ELECTRODES};
use npx2_acquisition::fleet::Fleet;
use npx2_acquisition::hardware::{
    ApiCall, CallKind, ElectrodeBank, ErrorCode, FaultScope, FifoStatus, ProbeAddress,
    SimulatedApi, SimulatedBasestation, SimulatedProbe,
};
use npx2_acquisition::probe::ProbeStatus;
use npx2_acquisition::protocol::ProbeSettings;

fn rig(slots: &[u8], probes: usize) -> Arc<SimulatedApi> {
    Arc::new(SimulatedApi::with_rig(slots, probes).with_packet_interval(Duration::from_millis(1)))
}

fn connected(api: &Arc<SimulatedApi>, config: AppConfig) -> Fleet {
    let mut fleet = Fleet::discover(api.clone(), config).unwrap();
    fleet.open_connection().unwrap();
    fleet
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn two_basestations_acquire_on_every_probe() {
    let api = rig(&[2, 3], 2);
    let mut fleet = connected(&api, AppConfig::default());
    assert_eq!(fleet.probe_count(), 4);

    api.clear_calls();
    fleet.start_acquisition().unwrap();
    assert!(fleet.is_acquiring());
    assert_eq!(fleet.running_probe_count(), 4);
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::SoftwareTrigger { .. })), 2);

    let buffers: Vec<_> = fleet.probes().map(|p| p.buffer().cloned().unwrap()).collect();
    assert!(wait_for(|| buffers.iter().all(|b| !b.is_empty())));

    let frame = buffers[0].pop().unwrap();
    assert_eq!(frame.channels as usize, NUM_CHANNELS);
    assert_eq!(frame.samples.len(), frame.packet_count() * NUM_CHANNELS);
    assert_eq!(frame.sample_number, 0);

    fleet.stop_acquisition().unwrap();
    assert!(!fleet.is_acquiring());
    assert_eq!(fleet.running_probe_count(), 0);
    assert!(fleet.probes().all(|p| p.status() == ProbeStatus::Armed));
    assert!(!api.is_triggered(2));
    assert!(!api.is_triggered(3));

    // A stopped fleet can be started again
    fleet.start_acquisition().unwrap();
    assert_eq!(fleet.running_probe_count(), 4);
    fleet.stop_acquisition().unwrap();
}

#[test]
fn single_electrode_routes_one_channel() {
    let api = rig(&[2], 1);
    let mut fleet = connected(&api, AppConfig::default());
    let address = ProbeAddress::new(2, 1, 1);

    let mut mask = vec![false; NUM_ELECTRODES];
    mask[0] = true;

    api.clear_calls();
    let report = fleet.select_electrodes(address, &mask).unwrap();
    assert!(report.is_clean());

    let disconnects = api.count_calls(|c| {
        matches!(c, ApiCall::SelectElectrode { bank: ElectrodeBank::None, .. })
    });
    let routed: Vec<ApiCall> = api
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ApiCall::SelectElectrode { bank, .. } if *bank != ElectrodeBank::None))
        .collect();
    assert_eq!(disconnects, NUM_CHANNELS);
    assert_eq!(
        routed,
        vec![ApiCall::SelectElectrode { address, channel: 0, bank: ElectrodeBank::A }]
    );
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::WriteProbeConfiguration(_))), 1);

    let committed = api.committed_routing(address).unwrap();
    assert_eq!(committed[0], ElectrodeBank::A);
    assert!(committed[1..].iter().all(|&b| b == ElectrodeBank::None));
}

#[test]
fn recording_files_follow_saving_directories() {
    let root_dir = tempfile::tempdir().unwrap();
    let saving_dir = tempfile::tempdir().unwrap();
    let root = root_dir.path().join("session");

    // Slot 4 has no probes and must not get a file
    let api = Arc::new(
        SimulatedApi::new(vec![
            SimulatedBasestation { slot: 2, probes: vec![SimulatedProbe { port: 1, dock: 1, serial_number: 19_000_000_201 }] },
            SimulatedBasestation { slot: 3, probes: vec![SimulatedProbe { port: 1, dock: 1, serial_number: 19_000_000_301 }] },
            SimulatedBasestation { slot: 4, probes: vec![] },
        ])
        .with_packet_interval(Duration::from_millis(1)),
    );
    let mut config = AppConfig::default();
    config.recording.saving_directories.push(SlotDirectory {
        slot: 3,
        directory: saving_dir.path().to_path_buf(),
    });
    let mut fleet = connected(&api, config);

    let info = fleet.start_recording(&root).unwrap();
    assert_eq!(info.number, 1);

    let slot2 = root.join("recording_slot2_1.npx2");
    let slot3 = saving_dir.path().join("session").join("recording_slot3_1.npx2");
    assert_eq!(info.files, vec![slot2.clone(), slot3.clone()]);
    assert!(root.is_dir());
    assert!(saving_dir.path().join("session").is_dir());

    assert_eq!(api.file_stream(2), Some((slot2, true)));
    assert_eq!(api.file_stream(3), Some((slot3, true)));
    assert_eq!(api.file_stream(4), None);

    let finished = fleet.stop_recording().unwrap().unwrap();
    assert_eq!(finished.number, 1);
    assert!(fleet.recording().is_none());
    assert!(matches!(api.file_stream(2), Some((_, false))));

    let second = fleet.start_recording(&root).unwrap();
    assert_eq!(second.number, 2);
    assert!(second.files[0].ends_with(Path::new("recording_slot2_2.npx2")));
}

#[test]
fn serial_number_boundary() {
    let api = Arc::new(SimulatedApi::new(vec![SimulatedBasestation {
        slot: 1,
        probes: vec![
            SimulatedProbe { port: 1, dock: 1, serial_number: 18_999_999_999 },
            SimulatedProbe { port: 1, dock: 2, serial_number: 19_000_000_000 },
        ],
    }]));
    let fleet = Fleet::discover(api, AppConfig::default()).unwrap();

    let addresses: Vec<ProbeAddress> = fleet.probes().map(|p| p.address()).collect();
    assert_eq!(addresses, vec![ProbeAddress::new(1, 1, 2)]);
}

#[test]
fn selection_and_unknown_lookups() {
    let api = rig(&[2, 3], 2);
    let mut fleet = connected(&api, AppConfig::default());

    assert_eq!(fleet.selected_probe(), Some(ProbeAddress::new(2, 1, 1)));

    let target = ProbeAddress::new(3, 1, 2);
    fleet.set_selected(target).unwrap();
    assert_eq!(fleet.selected_probe(), Some(target));
    assert_eq!(fleet.probes().filter(|p| p.is_selected()).count(), 1);

    let unknown = ProbeAddress::new(9, 1, 1);
    assert_eq!(fleet.probe_status(unknown), ProbeStatus::Disconnected);
    assert!(!fleet.is_selected(unknown));
    assert_eq!(fleet.fill_percentage(9), 0.0);
}

#[test]
fn fill_percentage_tracks_busiest_probe() {
    let api = rig(&[2], 2);
    let mut fleet = connected(&api, AppConfig::default());

    api.set_fifo_status(ProbeAddress::new(2, 1, 2), FifoStatus { packets_available: 75, headroom: 25 });
    fleet.start_acquisition().unwrap();

    assert!(wait_for(|| (fleet.fill_percentage(2) - 0.75).abs() < 1e-6));
    fleet.stop_acquisition().unwrap();
}

#[test]
fn read_failures_do_not_stop_siblings() {
    let api = rig(&[2], 2);
    let mut fleet = connected(&api, AppConfig::default());
    let failing = ProbeAddress::new(2, 1, 1);
    let healthy = ProbeAddress::new(2, 1, 2);

    api.inject_fault(CallKind::ReadPackets, FaultScope::Probe(failing), ErrorCode::Timeout, None);
    fleet.start_acquisition().unwrap();

    let buffer = fleet.buffer(healthy).unwrap();
    assert!(wait_for(|| buffer.len() >= 3));
    assert!(wait_for(|| fleet.probe_report(failing).unwrap().stats.read_failures > 0));

    assert_eq!(fleet.running_probe_count(), 2);
    let stats = fleet.probe_report(failing).unwrap().stats;
    assert_eq!(stats.packets_read, 0);
    assert_eq!(stats.last_error, Some(ErrorCode::Timeout.code()));

    fleet.stop_acquisition().unwrap();
}

#[test]
fn saved_settings_replay_after_reconnect() {
    let api = rig(&[2], 1);
    let address = ProbeAddress::new(2, 1, 1);
    let settings = {
        let mut fleet = connected(&api, AppConfig::default());
        let mut mask = vec![false; NUM_ELECTRODES];
        for electrode in [10, 20, 1200] {
            mask[electrode] = true;
        }
        fleet.select_electrodes(address, &mask).unwrap();
        fleet.set_reference_index(address, 3).unwrap();

        let saved: Vec<ProbeSettings> = fleet
            .probes()
            .map(|p| ProbeSettings {
                address: p.address(),
                enabled_electrodes: p.channel_map().enabled_electrodes(),
                reference: p.reference().index(),
            })
            .collect();
        saved
    };

    let mut fleet = connected(&api, AppConfig::default());
    assert!(fleet.apply_saved_settings(&settings).is_empty());

    let probe = fleet.probe(address).unwrap();
    assert_eq!(probe.channel_map().enabled_electrodes(), vec![10, 20, 1200]);
    assert_eq!(probe.reference().index(), 3);
}

#[test]
fn dropping_the_fleet_releases_hardware() {
    let api = rig(&[2, 3], 2);
    {
        let mut fleet = connected(&api, AppConfig::default());
        fleet.start_acquisition().unwrap();
        fleet.start_recording(tempfile::tempdir().unwrap().path()).unwrap();
    }

    assert!(!api.is_triggered(2));
    assert!(!api.is_triggered(3));
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::CloseBasestation { .. })), 2);
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::ClosePort { .. })), 2);
    assert!(matches!(api.file_stream(2), Some((_, false))));
}
