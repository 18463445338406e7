//! HTTP API handlers
//!
//! The fleet lock is never held across an await point. Handlers that issue
//! vendor calls, join polling threads or touch the filesystem run on the
//! blocking pool.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::error::{Error, TopologyError};
use crate::fleet::Fleet;
use crate::hardware::ProbeAddress;
use crate::protocol::{
    ChannelMaskRequest, FleetInfo, MappingSummary, ProbeInfo, ProbeStatusReport, RecordingInfo,
    RecordingRequest, ReferenceRequest, SyncRequest, SystemStatus,
};
use crate::topology;
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Topology(TopologyError::UnknownProbe(_)) | Error::Topology(TopologyError::UnknownSlot(_)) => {
            StatusCode::NOT_FOUND
        }
        Error::Topology(_) | Error::Mapping(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Hardware(_) => StatusCode::BAD_GATEWAY,
        Error::Acquisition(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T>(result: crate::Result<T>) -> Reply<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// Run `f` against the fleet on the blocking pool
async fn with_fleet_blocking<T, F>(state: &AppState, f: F) -> Reply<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Fleet) -> crate::Result<T> + Send + 'static,
{
    let fleet = state.fleet.clone();
    match tokio::task::spawn_blocking(move || f(&mut fleet.lock())).await {
        Ok(result) => reply(result),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

fn address((slot, port, dock): (u8, u8, u8)) -> ProbeAddress {
    ProbeAddress::new(slot, port, dock)
}

/// Get system status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let status = state.fleet.lock().status();
    Json(ApiResponse::ok(status))
}

/// Get the full device tree
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<ApiResponse<FleetInfo>> {
    let info = state.fleet.lock().info();
    Json(ApiResponse::ok(info))
}

pub async fn get_probes(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<ProbeInfo>>> {
    let probes: Vec<ProbeInfo> = state.fleet.lock().probes().map(topology::probe_info).collect();
    Json(ApiResponse::ok(probes))
}

pub async fn get_probe(
    State(state): State<Arc<AppState>>,
    Path(path): Path<(u8, u8, u8)>,
) -> Reply<ProbeStatusReport> {
    let address = address(path);
    let report: crate::Result<_> = state
        .fleet
        .lock()
        .probe_report(address)
        .ok_or_else(|| TopologyError::UnknownProbe(address).into());
    reply(report)
}

/// Make a probe the selected one
pub async fn select_probe(
    State(state): State<Arc<AppState>>,
    Path(path): Path<(u8, u8, u8)>,
) -> Reply<()> {
    reply(state.fleet.lock().set_selected(address(path)))
}

/// Route an electrode selection
pub async fn set_channels(
    State(state): State<Arc<AppState>>,
    Path(path): Path<(u8, u8, u8)>,
    Json(req): Json<ChannelMaskRequest>,
) -> Reply<MappingSummary> {
    let mask = match req.to_mask() {
        Ok(mask) => mask,
        Err(e) => return reply(Err(e.into())),
    };
    with_fleet_blocking(&state, move |fleet| {
        let report = fleet.select_electrodes(address(path), &mask)?;
        Ok(MappingSummary::from(&report))
    })
    .await
}

pub async fn set_reference(
    State(state): State<Arc<AppState>>,
    Path(path): Path<(u8, u8, u8)>,
    Json(req): Json<ReferenceRequest>,
) -> Reply<()> {
    with_fleet_blocking(&state, move |fleet| {
        fleet.set_reference_index(address(path), req.index)
    })
    .await
}

/// Highest FIFO fill fraction of a basestation
pub async fn get_fill(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<u8>,
) -> Json<ApiResponse<f32>> {
    let fill = state.fleet.lock().fill_percentage(slot);
    Json(ApiResponse::ok(fill))
}

/// Move the sync master role
pub async fn set_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> Reply<()> {
    with_fleet_blocking(&state, move |fleet| {
        if req.output {
            fleet.set_sync_output(req.slot, req.frequency_index)
        } else {
            fleet.set_sync_input(req.slot)
        }
    })
    .await
}

pub async fn start_acquisition(State(state): State<Arc<AppState>>) -> Reply<SystemStatus> {
    with_fleet_blocking(&state, |fleet| {
        fleet.start_acquisition()?;
        Ok(fleet.status())
    })
    .await
}

pub async fn stop_acquisition(State(state): State<Arc<AppState>>) -> Reply<SystemStatus> {
    with_fleet_blocking(&state, |fleet| {
        fleet.stop_acquisition()?;
        Ok(fleet.status())
    })
    .await
}

/// Open one file stream per basestation
pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordingRequest>,
) -> Reply<RecordingInfo> {
    with_fleet_blocking(&state, move |fleet| match req.root {
        Some(root) => fleet.start_recording(&root),
        None => fleet.start_recording_default(),
    })
    .await
}

pub async fn stop_recording(State(state): State<Arc<AppState>>) -> Reply<Option<RecordingInfo>> {
    with_fleet_blocking(&state, |fleet| fleet.stop_recording()).await
}
