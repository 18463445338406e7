//! Probe connection state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AcquisitionError;

/// Connection status of a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    #[default]
    Disconnected,
    /// Hardware handle open, not yet initialized
    Connecting,
    /// Initialized by the basestation
    Connected,
    /// Ready and armed for a trigger
    Armed,
    /// Polling thread running
    Running,
}

/// Events that move a probe between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEvent {
    Opened,
    Initialized,
    Armed,
    Started,
    Stopped,
    Closed,
}

impl ProbeStatus {
    /// Next status after `event`
    pub fn transition(self, event: ProbeEvent) -> Result<ProbeStatus, AcquisitionError> {
        use ProbeEvent as E;
        use ProbeStatus as S;

        let next = match (self, event) {
            (S::Disconnected, E::Opened) => S::Connecting,
            (S::Connecting | S::Connected, E::Initialized) => S::Connected,
            (S::Connected | S::Armed, E::Armed) => S::Armed,
            (S::Armed, E::Started) => S::Running,
            (S::Running, E::Stopped) => S::Connected,
            (_, E::Closed) => S::Disconnected,
            (from, event) => {
                return Err(AcquisitionError::InvalidTransition {
                    from: from.to_string(),
                    to: format!("{:?}", event).to_lowercase(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, ProbeStatus::Disconnected | ProbeStatus::Connecting)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStatus::Disconnected => "disconnected",
            ProbeStatus::Connecting => "connecting",
            ProbeStatus::Connected => "connected",
            ProbeStatus::Armed => "armed",
            ProbeStatus::Running => "running",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let status = ProbeStatus::default()
            .transition(ProbeEvent::Opened)
            .and_then(|s| s.transition(ProbeEvent::Initialized))
            .and_then(|s| s.transition(ProbeEvent::Armed))
            .and_then(|s| s.transition(ProbeEvent::Started))
            .unwrap();
        assert_eq!(status, ProbeStatus::Running);

        let stopped = status.transition(ProbeEvent::Stopped).unwrap();
        assert_eq!(stopped, ProbeStatus::Connected);
        assert_eq!(stopped.transition(ProbeEvent::Armed).unwrap(), ProbeStatus::Armed);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(ProbeStatus::Disconnected.transition(ProbeEvent::Started).is_err());
        assert!(ProbeStatus::Connecting.transition(ProbeEvent::Armed).is_err());
        assert!(ProbeStatus::Running.transition(ProbeEvent::Armed).is_err());
        assert_eq!(
            ProbeStatus::Running.transition(ProbeEvent::Closed).unwrap(),
            ProbeStatus::Disconnected
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ProbeStatus::Armed).unwrap();
        assert_eq!(json, "\"armed\"");
    }
}
