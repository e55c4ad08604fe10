//! Parameter grid search with checkpointing.
//!
//! Each grid cell is a pure function of (training days, candidate), so the
//! search fans cells across rayon workers and merges by concatenation.
//! Completed cells are appended to a JSONL checkpoint between chunks: a
//! cancelled run keeps finished work, and a resumed run skips it.
//! Cancellation stops dispatching chunks; a dispatched chunk runs to
//! completion so no cell is ever half-applied.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use orblab_core::domain::{EntryFilter, StopMode, StrategyCandidate};

use crate::expectancy::RSummary;
use crate::harness::RunError;

/// The searchable axes: target ratio × stop placement × filter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub target_rs: Vec<f64>,
    pub stop_modes: Vec<StopMode>,
    pub filter_sets: Vec<Vec<EntryFilter>>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            target_rs: vec![1.0, 1.5, 2.0, 2.5, 3.0],
            stop_modes: vec![StopMode::Full, StopMode::Half],
            filter_sets: vec![Vec::new()],
        }
    }
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.target_rs.len() * self.stop_modes.len() * self.filter_sets.len()
    }

    /// All candidates in the grid, instrument and window taken from `base`.
    pub fn candidates(&self, base: &StrategyCandidate) -> Vec<StrategyCandidate> {
        let mut out = Vec::with_capacity(self.size());
        for &target_r in &self.target_rs {
            for &stop_mode in &self.stop_modes {
                for filters in &self.filter_sets {
                    out.push(StrategyCandidate {
                        instrument: base.instrument.clone(),
                        window: base.window.clone(),
                        target_r,
                        stop_mode,
                        filters: filters.clone(),
                    });
                }
            }
        }
        out
    }
}

/// One evaluated grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCellResult {
    pub candidate: StrategyCandidate,
    pub candidate_hash: String,
    pub summary: RSummary,
}

/// Errors from the grid search.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
}

/// JSONL checkpoint of completed grid cells.
///
/// One JSON object per line; malformed lines are skipped with a warning so
/// a torn final write never poisons a resume.
pub struct GridCheckpoint {
    path: PathBuf,
}

impl GridCheckpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Completed cells keyed by candidate hash.
    pub fn load_completed(&self) -> io::Result<HashMap<String, GridCellResult>> {
        let mut completed = HashMap::new();
        if !self.path.exists() {
            return Ok(completed);
        }
        let file = fs::File::open(&self.path)?;
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GridCellResult>(&line) {
                Ok(cell) => {
                    completed.insert(cell.candidate_hash.clone(), cell);
                }
                Err(e) => warn!("skipping malformed checkpoint line: {e}"),
            }
        }
        Ok(completed)
    }

    fn append_batch(&self, cells: &[GridCellResult]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for cell in cells {
            let json = serde_json::to_string(cell)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{json}")?;
        }
        file.flush()
    }
}

/// Evaluate grid cells in parallel with optional checkpointing and
/// cancellation.
///
/// `eval` must be a pure function of the candidate (plus whatever read-only
/// context it closes over). Results arrive in no particular order; callers
/// select deterministically via [`select_best`].
pub fn search_grid<F>(
    cells: Vec<StrategyCandidate>,
    eval: F,
    checkpoint: Option<&GridCheckpoint>,
    cancel: Option<&AtomicBool>,
    chunk_size: usize,
) -> Result<Vec<GridCellResult>, GridError>
where
    F: Fn(&StrategyCandidate) -> Result<RSummary, RunError> + Sync,
{
    let mut completed: HashMap<String, GridCellResult> = match checkpoint {
        Some(cp) => cp.load_completed()?,
        None => HashMap::new(),
    };
    if !completed.is_empty() {
        info!("resuming grid search: {} cells already done", completed.len());
    }

    let remaining: Vec<StrategyCandidate> = cells
        .into_iter()
        .filter(|c| !completed.contains_key(&c.full_hash()))
        .collect();

    let chunk_size = chunk_size.max(1);
    for chunk in remaining.chunks(chunk_size) {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            info!("grid search cancelled; keeping {} finished cells", completed.len());
            break;
        }

        let batch: Result<Vec<GridCellResult>, RunError> = chunk
            .par_iter()
            .map(|candidate| {
                let summary = eval(candidate)?;
                Ok(GridCellResult {
                    candidate_hash: candidate.full_hash(),
                    candidate: candidate.clone(),
                    summary,
                })
            })
            .collect();
        let batch = batch?;

        if let Some(cp) = checkpoint {
            cp.append_batch(&batch)?;
        }
        for cell in batch {
            completed.insert(cell.candidate_hash.clone(), cell);
        }
    }

    Ok(completed.into_values().collect())
}

/// Deterministic best-cell selection: highest realized expectancy, ties
/// broken by sample size, then candidate hash.
pub fn select_best(cells: &[GridCellResult], min_sample: usize) -> Option<&GridCellResult> {
    cells
        .iter()
        .filter(|c| c.summary.sample_size >= min_sample)
        .max_by(|a, b| {
            a.summary
                .realized_expectancy
                .partial_cmp(&b.summary.realized_expectancy)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.summary.sample_size.cmp(&b.summary.sample_size))
                .then(b.candidate_hash.cmp(&a.candidate_hash))
        })
}
