//! Single-slot snapshot persistence for the in-progress roadmap session.
//!
//! The store is a dumb key-value slot holding one JSON document under a fixed key.
//! When to write or clear is decided by the wizard, not here.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{Profile, Roadmap};
use crate::error::{AtlasError, AtlasResult};
use crate::wizard::{Screen, WizardState};

/// Fixed namespace of the persisted session.
pub const SNAPSHOT_KEY: &str = "project_atlas_v6";

/// Persisted `{screen, roadmap, prefs}` triple.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub screen: Screen,
    #[serde(default)]
    pub roadmap: Option<Roadmap>,
    #[serde(default)]
    pub prefs: Option<Profile>,
}

pub trait SnapshotStore: Send + Sync {
    fn read_raw(&self) -> AtlasResult<Option<String>>;
    fn write_raw(&self, raw: &str) -> AtlasResult<()>;
    fn clear(&self) -> AtlasResult<()>;

    fn save(&self, snapshot: &Snapshot) -> AtlasResult<()> {
        let raw = serde_json::to_string(snapshot)?;
        self.write_raw(&raw)
    }

    /// Last saved snapshot, or None when absent or unreadable.
    fn load(&self) -> Option<Snapshot> {
        let raw = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(target: "persistence", error = %e, "Snapshot unreadable; starting fresh");
                return None;
            }
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                let e = AtlasError::PersistenceCorrupt(e.to_string());
                warn!(target: "persistence", error = %e, "Ignoring snapshot");
                None
            }
        }
    }
}

/// Rebuild the wizard at startup. Only a Roadmap-screen snapshot with a roadmap resumes;
/// anything else starts at Home.
#[instrument(level = "info", skip(store))]
pub fn recover(store: &dyn SnapshotStore) -> WizardState {
    match store.load() {
        Some(Snapshot {
            screen: Screen::Roadmap,
            roadmap: Some(roadmap),
            prefs,
        }) => {
            info!(target: "persistence", project_id = %roadmap.project_id, milestones = roadmap.milestones.len(), "Resuming saved roadmap");
            WizardState::restored(roadmap, prefs)
        }
        Some(s) => {
            debug!(target: "persistence", screen = ?s.screen, has_roadmap = s.roadmap.is_some(), "Snapshot not resumable");
            WizardState::default()
        }
        None => WizardState::default(),
    }
}

/// `<dir>/project_atlas_v6.json` on local disk.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SNAPSHOT_KEY}.json")),
        }
    }

    /// Directory from ATLAS_STATE_DIR, defaulting to ./data.
    pub fn from_env() -> Self {
        let dir = std::env::var("ATLAS_STATE_DIR").unwrap_or_else(|_| "./data".into());
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read_raw(&self) -> AtlasResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_raw(&self, raw: &str) -> AtlasResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write-then-rename so a crash never leaves a half-written snapshot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(target: "persistence", path = %self.path.display(), bytes = raw.len(), "Snapshot saved");
        Ok(())
    }

    fn clear(&self) -> AtlasResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(target: "persistence", path = %self.path.display(), "Snapshot cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot; nothing survives a restart.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read_raw(&self) -> AtlasResult<Option<String>> {
        Ok(self.slot().clone())
    }

    fn write_raw(&self, raw: &str) -> AtlasResult<()> {
        *self.slot() = Some(raw.to_string());
        Ok(())
    }

    fn clear(&self) -> AtlasResult<()> {
        *self.slot() = None;
        Ok(())
    }
}
