use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Per-id failure bookkeeping. Kept as its own struct so the JSON shape stays
/// stable if more fields (e.g. last error) are added later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub fail_count: u32,
}

/// Durable record of which app ids have been fully processed and which have
/// failed (with a count), enabling idempotent re-runs.
///
/// Loaded once per run, mutated in memory, saved exactly once at run end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingState {
    pub last_run_at: String,
    pub processed_app_ids: Vec<u32>,
    pub failed_app_ids: BTreeMap<u32, FailedEntry>,
}

impl ProcessingState {
    pub fn is_processed(&self, app_id: u32) -> bool {
        self.processed_app_ids.contains(&app_id)
    }

    /// True once the id has failed `max_fail_count` or more times; such ids
    /// are excluded from every future candidate list until the state file is
    /// manually edited or deleted.
    pub fn is_exhausted(&self, app_id: u32, max_fail_count: u32) -> bool {
        self.failed_app_ids
            .get(&app_id)
            .map(|e| e.fail_count >= max_fail_count)
            .unwrap_or(false)
    }

    pub fn record_processed(&mut self, app_id: u32) {
        self.processed_app_ids.push(app_id);
    }

    /// Increments the existing entry in place, or creates one at count 1.
    pub fn record_failure(&mut self, app_id: u32) -> u32 {
        let entry = self.failed_app_ids.entry(app_id).or_default();
        entry.fail_count += 1;
        entry.fail_count
    }
}

/// Reads and writes the persisted `ProcessingState` JSON document.
pub struct StateStore {
    path: PathBuf,
    max_processed_ids: usize,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, max_processed_ids: usize) -> Self {
        Self {
            path: path.into(),
            max_processed_ids,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Zero-value state when the file does not exist; any other read or
    /// parse error is fatal.
    pub fn load(&self) -> Result<ProcessingState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting fresh");
                return Ok(ProcessingState::default());
            }
            Err(err) => {
                return Err(Error::StateIo(format!(
                    "read {}: {err}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|err| Error::StateIo(format!("parse {}: {err}", self.path.display())))
    }

    /// De-duplicates and FIFO-caps `processed_app_ids`, then writes the whole
    /// document pretty-printed with a trailing newline. Uses a temp file plus
    /// rename in the same directory so a crash cannot leave a torn file.
    pub fn save(&self, state: &mut ProcessingState) -> Result<()> {
        dedup_keep_latest(&mut state.processed_app_ids);
        if state.processed_app_ids.len() > self.max_processed_ids {
            let drop = state.processed_app_ids.len() - self.max_processed_ids;
            state.processed_app_ids.drain(..drop);
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|err| Error::StateIo(format!("serialize state: {err}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, format!("{json}\n"))
            .map_err(|err| Error::StateIo(format!("write {}: {err}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| Error::StateIo(format!("rename {}: {err}", tmp.display())))?;
        Ok(())
    }
}

/// Removes duplicate ids keeping the most recent occurrence, so the FIFO cap
/// never evicts a live id in favor of its stale duplicate.
fn dedup_keep_latest(ids: &mut Vec<u32>) {
    let mut seen = HashSet::new();
    let mut kept: Vec<u32> = ids
        .iter()
        .rev()
        .filter(|id| seen.insert(**id))
        .copied()
        .collect();
    kept.reverse();
    *ids = kept;
}
