//! ValidatedSetup — the terminal artifact, and its append-only ledger.
//!
//! A setup exists only because every pipeline stage passed; it is the one
//! contract downstream consumers (UI, alerting) may read. Records are
//! immutable once written — re-validation appends a new record, never
//! edits in place. Persistence is JSONL: one object per line, resilient to
//! partial writes, easy to stream.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use orblab_core::domain::{EntryFilter, InstrumentId, StopMode, WindowId};

use crate::stages::ValidationStageResult;

/// A strategy candidate promoted through every validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedSetup {
    // ── Candidate ──
    pub instrument: InstrumentId,
    pub window: WindowId,
    pub target_r: f64,
    pub stop_mode: StopMode,
    pub filters: Vec<EntryFilter>,
    pub candidate_hash: String,

    // ── Out-of-sample performance ──
    pub win_rate: f64,
    pub theoretical_expectancy: f64,
    pub realized_expectancy: f64,
    pub sample_size: usize,
    pub avg_win_r: f64,
    pub avg_loss_r: f64,

    // ── Provenance ──
    pub stage_results: Vec<ValidationStageResult>,
    pub walkforward_validated: bool,
    pub cost_book_version: String,
    pub validated_at: NaiveDateTime,
}

/// Append-only JSONL ledger of validated setups.
pub struct SetupLedger {
    path: PathBuf,
}

impl SetupLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one setup record.
    pub fn append(&self, setup: &ValidatedSetup) -> io::Result<()> {
        let json = serde_json::to_string(setup)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// All recorded setups, oldest first. Malformed lines are skipped with
    /// a warning so one torn write never hides the rest of the ledger.
    pub fn read_all(&self) -> io::Result<Vec<ValidatedSetup>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let mut setups = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ValidatedSetup>(&line) {
                Ok(setup) => setups.push(setup),
                Err(e) => warn!("skipping malformed setup record: {e}"),
            }
        }
        Ok(setups)
    }
}
