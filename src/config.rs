//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is valid.
//!
//! ```toml
//! [acquisition]
//! ring_buffer_capacity = 10000
//! packets_per_read = 64
//! stop_timeout_ms = 1000
//!
//! [recording]
//! root = "/data/npx2"
//!
//! [[recording.saving_directories]]
//! slot = 3
//! directory = "/mnt/fast/npx2"
//!
//! [[simulation.basestations]]
//! slot = 2
//! probes = [{ port = 1, dock = 1, serial_number = 19000000200 }]
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_HTTP_PORT, RING_BUFFER_CAPACITY, SAMPLE_COUNT, STOP_TIMEOUT_MS, SYNC_FREQUENCIES_HZ,
};
use crate::error::{Error, Result};
use crate::hardware::{SimulatedBasestation, SimulatedProbe};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub acquisition: AcquisitionConfig,
    pub recording: RecordingConfig,
    pub sync: SyncConfig,
    pub ui: UiConfig,
    pub simulation: SimulationConfig,
}

/// Polling and buffering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Destination ring buffer capacity per probe (frames)
    pub ring_buffer_capacity: usize,
    /// Packets requested per FIFO read
    pub packets_per_read: usize,
    /// Bounded join when stopping a polling thread
    pub stop_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ring_buffer_capacity: RING_BUFFER_CAPACITY,
            packets_per_read: SAMPLE_COUNT,
            stop_timeout_ms: STOP_TIMEOUT_MS,
        }
    }
}

impl AcquisitionConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Saving directory override for one basestation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDirectory {
    pub slot: u8,
    pub directory: PathBuf,
}

/// File stream recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Root directory used when a recording request names none
    pub root: PathBuf,
    pub saving_directories: Vec<SlotDirectory>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("recordings"),
            saving_directories: Vec::new(),
        }
    }
}

/// Sync line settings of the default master
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drive the sync clock instead of listening on the SMA input
    pub output: bool,
    /// Index into the supported sync frequencies
    pub frequency_index: usize,
}

/// HTTP control API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl UiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))
    }
}

/// Simulated rig used when no hardware library is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time each simulated FIFO read blocks (microseconds)
    pub packet_interval_us: u64,
    pub basestations: Vec<SimulatedBasestation>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let probe = |port, dock, serial_number| SimulatedProbe { port, dock, serial_number };
        Self {
            packet_interval_us: 2_133,
            basestations: vec![
                SimulatedBasestation {
                    slot: 2,
                    probes: vec![probe(1, 1, 19_000_000_201), probe(2, 1, 19_000_000_202)],
                },
                SimulatedBasestation {
                    slot: 3,
                    probes: vec![probe(1, 1, 19_000_000_301), probe(1, 2, 19_000_000_302)],
                },
            ],
        }
    }
}

impl AppConfig {
    /// `<config dir>/npx2-acquisition/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "neuropixels", "npx2-acquisition")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.acquisition.ring_buffer_capacity == 0 {
            return Err(Error::Config("ring_buffer_capacity must be at least 1".to_string()));
        }
        if self.acquisition.packets_per_read == 0 {
            return Err(Error::Config("packets_per_read must be at least 1".to_string()));
        }
        if self.sync.frequency_index >= SYNC_FREQUENCIES_HZ.len() {
            return Err(Error::Config(format!(
                "sync frequency_index {} out of range",
                self.sync.frequency_index
            )));
        }
        Ok(())
    }

    /// Saving directory configured for `slot`
    pub fn saving_directory(&self, slot: u8) -> Option<&Path> {
        self.recording
            .saving_directories
            .iter()
            .find(|d| d.slot == slot)
            .map(|d| d.directory.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.acquisition.ring_buffer_capacity, 10_000);
        assert_eq!(config.acquisition.packets_per_read, 64);
        assert_eq!(config.acquisition.stop_timeout(), Duration::from_secs(1));
        assert_eq!(config.ui.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [acquisition]
            packets_per_read = 32

            [[recording.saving_directories]]
            slot = 3
            directory = "/mnt/fast"
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.packets_per_read, 32);
        assert_eq!(config.acquisition.ring_buffer_capacity, 10_000);
        assert_eq!(config.saving_directory(3), Some(Path::new("/mnt/fast")));
        assert_eq!(config.saving_directory(2), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.sync.frequency_index = 1;
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = AppConfig::default();
        config.sync.frequency_index = 5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.ui.bind_address = "not an address".to_string();
        assert!(config.ui.socket_addr().is_err());
    }
}
