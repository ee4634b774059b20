//! Local pod tracking state.
//!
//! One JSON file per pod name under a fixed directory. Files are replaced
//! atomically (write to a temp file in the same directory, then rename), so
//! a reader never sees a half-written record. Operations only touch the
//! file of the name they are given.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{PodError, PodResult};

const RECORD_EXTENSION: &str = "json";
const MAX_NAME_LEN: usize = 64;

/// Lifecycle status of a tracked pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    /// Pod created, not yet serving the model.
    Provisioning,
    /// Model pulled and endpoint reachable.
    Ready,
    /// Provisioning stopped on an error; the remote pod may still exist.
    Error,
}

impl PodStatus {
    /// Whether a record in this status guards its name against a new `up`.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Provisioning | Self::Ready)
    }
}

impl std::fmt::Display for PodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Ready => write!(f, "ready"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A tracked pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    /// User-chosen name; also the file name.
    pub name: String,
    /// Platform pod ID.
    pub pod_id: String,
    /// Model reference served by the pod.
    pub model: String,
    /// GPU type the pod runs on.
    pub gpu_type_id: String,
    /// Hourly cost in USD at selection time.
    pub cost_per_hour: f64,
    /// Reachable Ollama endpoint, known once the pod is running.
    pub endpoint_url: Option<String>,
    /// Attached network volume.
    pub volume_id: Option<String>,
    /// When the pod was created.
    pub created_at: DateTime<Utc>,
    /// Local lifecycle status.
    pub status: PodStatus,
    /// Cause of the last failure, for `error` records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PodRecord {
    /// A freshly created pod.
    #[must_use]
    pub fn provisioning(
        name: impl Into<String>,
        pod_id: impl Into<String>,
        model: impl Into<String>,
        gpu_type_id: impl Into<String>,
        cost_per_hour: f64,
        volume_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pod_id: pod_id.into(),
            model: model.into(),
            gpu_type_id: gpu_type_id.into(),
            cost_per_hour,
            endpoint_url: None,
            volume_id,
            created_at: Utc::now(),
            status: PodStatus::Provisioning,
            last_error: None,
        }
    }
}

/// Check that `name` is safe to use as a file name.
///
/// # Errors
/// Returns [`PodError::InvalidPodName`] unless the name is 1-64 characters of
/// `[A-Za-z0-9._-]` and does not start with `.`.
pub fn validate_name(name: &str) -> PodResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(PodError::InvalidPodName(name.to_string()))
    }
}

/// File-per-name record store.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for `name`.
    ///
    /// # Errors
    /// Returns [`PodError::InvalidPodName`] for unsafe names.
    pub fn record_path(&self, name: &str) -> PodResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{RECORD_EXTENSION}")))
    }

    /// Load the record for `name`.
    ///
    /// # Errors
    /// Returns [`PodError::CorruptState`] if the file exists but cannot be
    /// read or parsed.
    pub fn get(&self, name: &str) -> PodResult<Option<PodRecord>> {
        let path = self.record_path(name)?;
        let corrupt = |reason: String| PodError::CorruptState {
            name: name.to_string(),
            path: path.display().to_string(),
            reason,
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let record: PodRecord =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

        if record.name != name {
            return Err(corrupt(format!(
                "record names '{}' but file is for '{name}'",
                record.name
            )));
        }

        debug!(name = %name, status = %record.status, "Loaded pod record");
        Ok(Some(record))
    }

    /// Write `record` under its name, replacing any previous record.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or the write fails.
    pub fn put(&self, record: &PodRecord) -> PodResult<()> {
        let path = self.record_path(&record.name)?;
        std::fs::create_dir_all(&self.root)?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| PodError::Io(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(content.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PodError::Io(e.error))?;

        debug!(name = %record.name, status = %record.status, path = %path.display(), "Saved pod record");
        Ok(())
    }

    /// Remove the record for `name`. Returns whether a record existed.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or the file cannot be removed.
    pub fn delete(&self, name: &str) -> PodResult<bool> {
        let path = self.record_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(name = %name, "Removed pod record");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names with a record file, sorted.
    ///
    /// # Errors
    /// Returns an error if the directory exists but cannot be read.
    pub fn names(&self) -> PodResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?.to_string();
                validate_name(&stem).ok().map(|()| stem)
            })
            .collect();

        names.sort();
        Ok(names)
    }

    /// Every record, each loaded independently so one corrupt file does not
    /// hide the others.
    ///
    /// # Errors
    /// Returns an error only if the directory cannot be listed.
    pub fn list(&self) -> PodResult<Vec<(String, PodResult<PodRecord>)>> {
        let names = self.names()?;
        Ok(names
            .into_iter()
            .filter_map(|name| match self.get(&name) {
                Ok(Some(record)) => Some((name, Ok(record))),
                // removed between listing and reading
                Ok(None) => None,
                Err(e) => Some((name, Err(e))),
            })
            .collect())
    }
}
