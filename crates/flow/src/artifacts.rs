use autosignup_core::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::classifier::UiState;

const SNAPSHOT_FILE: &str = "debug_snapshot.txt";
const STUCK_DUMP_FILE: &str = "STUCK_STATE_DUMP.json";

/// Record written when the flow gives up on a state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckDump<'a> {
    pub state: UiState,
    pub cycle: u32,
    pub consecutive: u32,
    pub snapshot: &'a str,
    pub captured_at: DateTime<Utc>,
}

impl<'a> StuckDump<'a> {
    pub fn new(state: UiState, cycle: u32, consecutive: u32, snapshot: &'a str) -> Self {
        Self {
            state,
            cycle,
            consecutive,
            snapshot,
            captured_at: Utc::now(),
        }
    }
}

/// Debug files under one directory, created on first write.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: PathBuf,
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn stuck_dump_path(&self) -> PathBuf {
        self.dir.join(STUCK_DUMP_FILE)
    }

    /// Overwrite the latest-snapshot file.
    pub fn write_snapshot(&self, snapshot: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.snapshot_path(), snapshot)?;
        Ok(())
    }

    pub fn write_stuck_dump(&self, dump: &StuckDump<'_>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.stuck_dump_path();
        std::fs::write(&path, serde_json::to_string_pretty(dump)?)?;
        Ok(path)
    }
}
