//! Value types exchanged across the hardware boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result of a single vendor call
pub type NpResult<T> = std::result::Result<T, ErrorCode>;

/// Non-success codes returned by the vendor library
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[error("failed with error code 1")]
    Failed,

    #[error("already open (error code 2)")]
    AlreadyOpen,

    #[error("not open (error code 3)")]
    NotOpen,

    #[error("I2C communication error (error code 4)")]
    IicError,

    #[error("version mismatch (error code 5)")]
    VersionMismatch,

    #[error("invalid parameter (error code 6)")]
    ParameterInvalid,

    #[error("UART acknowledge error (error code 7)")]
    UartAckError,

    #[error("timeout (error code 8)")]
    Timeout,

    #[error("wrong channel (error code 9)")]
    WrongChannel,

    #[error("wrong bank (error code 10)")]
    WrongBank,

    #[error("wrong reference (error code 11)")]
    WrongRef,

    #[error("wrong internal reference (error code 12)")]
    WrongIntRef,

    #[error("file open error (error code 15)")]
    FileOpenError,

    #[error("readback error (error code 16)")]
    ReadbackError,

    #[error("file I/O error (error code 21)")]
    FileIoError,

    #[error("no link (error code 24)")]
    NoLink,

    #[error("failed with error code {0}")]
    Other(i32),
}

impl ErrorCode {
    /// Numeric vendor code
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Failed => 1,
            ErrorCode::AlreadyOpen => 2,
            ErrorCode::NotOpen => 3,
            ErrorCode::IicError => 4,
            ErrorCode::VersionMismatch => 5,
            ErrorCode::ParameterInvalid => 6,
            ErrorCode::UartAckError => 7,
            ErrorCode::Timeout => 8,
            ErrorCode::WrongChannel => 9,
            ErrorCode::WrongBank => 10,
            ErrorCode::WrongRef => 11,
            ErrorCode::WrongIntRef => 12,
            ErrorCode::FileOpenError => 15,
            ErrorCode::ReadbackError => 16,
            ErrorCode::FileIoError => 21,
            ErrorCode::NoLink => 24,
            ErrorCode::Other(code) => *code,
        }
    }

    /// Convert a raw vendor return value; `0` is success
    pub fn check(raw: i32) -> NpResult<()> {
        let code = match raw {
            0 => return Ok(()),
            1 => ErrorCode::Failed,
            2 => ErrorCode::AlreadyOpen,
            3 => ErrorCode::NotOpen,
            4 => ErrorCode::IicError,
            5 => ErrorCode::VersionMismatch,
            6 => ErrorCode::ParameterInvalid,
            7 => ErrorCode::UartAckError,
            8 => ErrorCode::Timeout,
            9 => ErrorCode::WrongChannel,
            10 => ErrorCode::WrongBank,
            11 => ErrorCode::WrongRef,
            12 => ErrorCode::WrongIntRef,
            15 => ErrorCode::FileOpenError,
            16 => ErrorCode::ReadbackError,
            21 => ErrorCode::FileIoError,
            24 => ErrorCode::NoLink,
            other => ErrorCode::Other(other),
        };
        Err(code)
    }
}

/// External addressing key of a probe: (slot, port, dock)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProbeAddress {
    pub slot: u8,
    pub port: u8,
    pub dock: u8,
}

impl ProbeAddress {
    pub fn new(slot: u8, port: u8, dock: u8) -> Self {
        Self { slot, port, dock }
    }
}

impl fmt::Display for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} port {} dock {}", self.slot, self.port, self.dock)
    }
}

/// Bank selection for an electrode-select or reference call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectrodeBank {
    A,
    B,
    C,
    D,
    /// Channel disconnected from every bank
    None,
}

impl ElectrodeBank {
    /// Raw value passed to the vendor library
    pub fn raw(&self) -> u8 {
        match self {
            ElectrodeBank::A => 0,
            ElectrodeBank::B => 1,
            ElectrodeBank::C => 2,
            ElectrodeBank::D => 3,
            ElectrodeBank::None => 0xFF,
        }
    }
}

/// Reference source of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    External,
    Tip,
    Internal,
}

/// Probe operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    Recording,
    Calibration,
    ImpedanceTest,
}

/// Signal line driving the basestation sync input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncSource {
    /// External SMA line input
    Sma,
    /// Internal sync clock
    Clock,
}

/// Header of one electrode packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketInfo {
    /// Hardware tick count
    pub timestamp: u32,
    /// Status word; bits 6.. carry the auxiliary/event inputs
    pub status: u16,
    pub payload_length: u16,
}

impl PacketInfo {
    /// Auxiliary/event code carried in the status word
    pub fn event_code(&self) -> u64 {
        (self.status >> 6) as u64
    }
}

/// On-device FIFO occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoStatus {
    pub packets_available: usize,
    pub headroom: usize,
}

impl FifoStatus {
    /// Fill fraction in [0.0, 1.0]; a FIFO without headroom counts as full
    pub fn fill_fraction(&self) -> f32 {
        if self.headroom == 0 {
            return 1.0;
        }
        let total = self.packets_available + self.headroom;
        (self.packets_available as f32 / total as f32).clamp(0.0, 1.0)
    }
}

/// Firmware or API version: major.minor[.build]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u8,
    pub minor: u8,
    pub build: Option<u16>,
}

impl VersionInfo {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor, build: None }
    }

    pub fn with_build(major: u8, minor: u8, build: u16) -> Self {
        Self { major, minor, build: Some(build) }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        match self.build {
            Some(build) if build != 0 => write!(f, ".{}", build),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_formatting() {
        assert_eq!(VersionInfo::new(2, 1).to_string(), "2.1");
        assert_eq!(VersionInfo::with_build(2, 1, 134).to_string(), "2.1.134");
        assert_eq!(VersionInfo::with_build(2, 1, 0).to_string(), "2.1");
    }

    #[test]
    fn test_fill_fraction() {
        let half = FifoStatus { packets_available: 50, headroom: 50 };
        assert_eq!(half.fill_fraction(), 0.5);

        let empty = FifoStatus { packets_available: 0, headroom: 100 };
        assert_eq!(empty.fill_fraction(), 0.0);

        let full = FifoStatus { packets_available: 100, headroom: 0 };
        assert_eq!(full.fill_fraction(), 1.0);

        // Nothing available and nothing free: still treated as full
        assert_eq!(FifoStatus::default().fill_fraction(), 1.0);
    }

    #[test]
    fn test_error_codes() {
        assert!(ErrorCode::check(0).is_ok());
        assert_eq!(ErrorCode::check(8), Err(ErrorCode::Timeout));
        assert_eq!(ErrorCode::check(99), Err(ErrorCode::Other(99)));
        assert_eq!(ErrorCode::NoLink.code(), 24);
        assert_eq!(ErrorCode::Other(42).to_string(), "failed with error code 42");
    }

    #[test]
    fn test_event_code() {
        let info = PacketInfo { timestamp: 1, status: 0b1_0100_0000, payload_length: 384 };
        assert_eq!(info.event_code(), 0b101);
    }
}
