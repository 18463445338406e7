//! Acquisition daemon
//!
//! Opens every basestation of the (simulated) rig, starts continuous
//! acquisition and serves the control API until Ctrl+C.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use npx2_acquisition::{
    config::AppConfig,
    fleet::Fleet,
    hardware::{NeuropixApi, SimulatedApi},
    ui::WebServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Neuropixels 2.0 acquisition");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(AppConfig::default_path);
    let config = match &config_path {
        Some(path) => {
            tracing::info!("Config: {}", path.display());
            AppConfig::load_or_default(path)?
        }
        None => AppConfig::default(),
    };
    config.validate()?;

    let api: Arc<dyn NeuropixApi> = Arc::new(
        SimulatedApi::new(config.simulation.basestations.clone())
            .with_packet_interval(Duration::from_micros(config.simulation.packet_interval_us)),
    );

    let mut fleet = Fleet::discover(api, config.clone())?;
    fleet
        .open_connection()
        .context("no probes available for acquisition")?;
    println!("\n{}", fleet.info_string());

    let buffers: Vec<_> = fleet
        .probes()
        .filter_map(|p| p.buffer().cloned().map(|b| (p.address(), b)))
        .collect();
    let slots: Vec<u8> = fleet.basestations().iter().map(|b| b.slot()).collect();

    let fleet = Arc::new(Mutex::new(fleet));

    if config.ui.enabled {
        let server = WebServer::new(config.ui.clone(), fleet.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!("Control API stopped: {}", e);
            }
        });
    }

    if let Err(e) = fleet.lock().start_acquisition() {
        tracing::error!("Acquisition started with errors: {}", e);
    }

    tracing::info!("Acquiring - press Ctrl+C to stop");

    let mut packets = vec![0u64; buffers.len()];
    let mut last_report = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                for (i, (_, buffer)) in buffers.iter().enumerate() {
                    while let Some(frame) = buffer.try_pop() {
                        packets[i] += frame.packet_count() as u64;
                    }
                }

                if last_report.elapsed() >= Duration::from_secs(5) {
                    last_report = Instant::now();
                    let fleet = fleet.lock();
                    for slot in &slots {
                        tracing::info!("Slot {} FIFO fill {:.1}%", slot, fleet.fill_percentage(*slot) * 100.0);
                    }
                    for ((address, buffer), count) in buffers.iter().zip(&packets) {
                        tracing::info!(
                            "{}: {} packets, {} frames dropped",
                            address,
                            count,
                            buffer.overflow_count()
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    let mut fleet = fleet.lock();
    if let Err(e) = fleet.stop_acquisition() {
        tracing::error!("Stop failed: {}", e);
    }
    fleet.close();

    Ok(())
}
