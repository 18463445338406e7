//! File-stream recording paths and session numbering

use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::protocol::RecordingInfo;

/// `recording_slot<slot>_<number>.npx2`
pub fn recording_file_name(slot: u8, number: u32) -> String {
    format!("recording_slot{}_{}.npx2", slot, number)
}

/// Where a basestation writes recording `number`
///
/// With a saving directory the file goes to `<saving dir>/<root name>/`,
/// otherwise directly under `root`.
pub fn recording_path(root: &Path, saving_directory: Option<&Path>, slot: u8, number: u32) -> PathBuf {
    let file_name = recording_file_name(slot, number);
    match saving_directory {
        Some(directory) => {
            let folder = root
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default();
            directory.join(folder).join(file_name)
        }
        None => root.join(file_name),
    }
}

/// Recording counter and the currently open session
#[derive(Debug, Default)]
pub struct RecordingSession {
    number: u32,
    active: Option<RecordingInfo>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter for a new recording
    pub fn next_number(&mut self) -> u32 {
        self.number += 1;
        self.number
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn begin(&mut self, root: &Path, files: Vec<PathBuf>) -> RecordingInfo {
        let info = RecordingInfo {
            number: self.number,
            root: root.to_path_buf(),
            started_at: Utc::now(),
            files,
        };
        self.active = Some(info.clone());
        info
    }

    pub fn end(&mut self) -> Option<RecordingInfo> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&RecordingInfo> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(recording_file_name(2, 1), "recording_slot2_1.npx2");
        assert_eq!(recording_file_name(31, 12), "recording_slot31_12.npx2");
    }

    #[test]
    fn test_paths() {
        let root = Path::new("/data/session_a");
        assert_eq!(
            recording_path(root, None, 3, 2),
            PathBuf::from("/data/session_a/recording_slot3_2.npx2")
        );
        assert_eq!(
            recording_path(root, Some(Path::new("/fast")), 3, 2),
            PathBuf::from("/fast/session_a/recording_slot3_2.npx2")
        );
    }

    #[test]
    fn test_session_numbers() {
        let mut session = RecordingSession::new();
        assert_eq!(session.next_number(), 1);
        let info = session.begin(Path::new("/tmp"), vec![]);
        assert_eq!(info.number, 1);
        assert!(session.active().is_some());
        assert_eq!(session.end().map(|i| i.number), Some(1));
        assert_eq!(session.next_number(), 2);
    }
}
