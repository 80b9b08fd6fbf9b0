//! JSON file persistence for the last-known pose.

use contracts::{ContractError, PoseFrame, PoseSink, Role};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk record, rewritten on every accepted pose
#[derive(Debug, Serialize, Deserialize)]
struct PoseRecord {
    node: String,
    role: Role,
    #[serde(flatten)]
    frame: PoseFrame,
}

/// Keeps the last accepted pose of one node in a JSON file
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous pose intact.
pub struct JsonPoseFile {
    name: String,
    node: String,
    role: Role,
    path: PathBuf,
}

impl JsonPoseFile {
    pub fn new(node: impl Into<String>, role: Role, path: impl Into<PathBuf>) -> Self {
        let node = node.into();
        Self {
            name: format!("json_pose_file:{node}"),
            node,
            role,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pose saved by a previous run, if any
    pub fn load(&self) -> Result<Option<PoseFrame>, ContractError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let record: PoseRecord = serde_json::from_str(&content).map_err(|e| {
            ContractError::pose_sink(&self.name, format!("{}: {e}", self.path.display()))
        })?;
        Ok(Some(record.frame))
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

impl PoseSink for JsonPoseFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn persist(&self, pose: &PoseFrame) -> Result<(), ContractError> {
        let record = PoseRecord {
            node: self.node.clone(),
            role: self.role,
            frame: pose.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| ContractError::pose_sink(&self.name, e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        debug!(sink = %self.name, path = %self.path.display(), "Pose persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Pose, Vector3};

    fn frame(x: f64) -> PoseFrame {
        PoseFrame::new(
            "unity",
            Pose::new(Vector3::new(x, 1.5, -2.0), Vector3::new(0.0, 90.0, 0.0)),
        )
    }

    #[test]
    fn test_persist_writes_flat_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonPoseFile::new("controller", Role::Driving, dir.path().join("pose.json"));

        sink.persist(&frame(1.0)).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["node"], "controller");
        assert_eq!(value["role"], "driving");
        assert_eq!(value["frame_type"], "unity");
        assert_eq!(value["position"]["x"], 1.0);
        assert_eq!(value["orientation"]["y"], 90.0);
        assert!(!sink.temp_path().exists());
    }

    #[test]
    fn test_latest_pose_wins_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("pose.json");
        let sink = JsonPoseFile::new("headset", Role::Listening, &path);

        assert_eq!(sink.load().unwrap(), None);
        sink.persist(&frame(1.0)).unwrap();
        sink.persist(&frame(7.0)).unwrap();

        let reopened = JsonPoseFile::new("headset", Role::Listening, &path);
        assert_eq!(reopened.load().unwrap(), Some(frame(7.0)));
    }

    #[test]
    fn test_corrupt_file_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.json");
        fs::write(&path, "{not json").unwrap();

        let sink = JsonPoseFile::new("controller", Role::Driving, &path);
        let err = sink.load().unwrap_err();
        assert!(matches!(err, ContractError::PoseSink { .. }), "{err}");
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // Parent "directory" is a regular file
        let sink = JsonPoseFile::new("controller", Role::Driving, blocker.join("pose.json"));
        assert!(sink.persist(&frame(1.0)).is_err());
    }
}
