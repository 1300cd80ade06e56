// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Cell Ensemble
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Independent cells stepped in parallel.
//!
//! Each [`DustCell`] owns its caches and warning log, so cells are stepped
//! with a plain `rayon` `par_iter_mut`; results match the sequential path
//! exactly. A step either advances every cell or none of them. Cross-cell
//! transport is not modelled.

use dust_types::config::DiskConfig;
use dust_types::error::{DustError, DustResult};
use dust_types::warnings::WarningLog;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cell::{CellCheckpoint, DustCell};
use crate::diagnostics::StepRecord;

#[derive(Debug, Default)]
pub struct CellEnsemble {
    cells: Vec<DustCell>,
}

impl CellEnsemble {
    pub fn new(cells: Vec<DustCell>) -> Self {
        Self { cells }
    }

    /// One cell per orbital radius, all other settings from `base`.
    pub fn radial(base: &DiskConfig, radii: &[f64]) -> DustResult<Self> {
        if radii.is_empty() {
            return Err(DustError::ConfigError(
                "ensemble needs at least one radius".to_string(),
            ));
        }
        let cells = radii
            .iter()
            .map(|&r| {
                let mut cfg = base.clone();
                cfg.orbit.r = r;
                DustCell::new(cfg)
            })
            .collect::<DustResult<Vec<_>>>()?;
        info!(n_cells = cells.len(), "ensemble: built radial cells");
        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[DustCell] {
        &self.cells
    }

    pub fn cell_mut(&mut self, idx: usize) -> Option<&mut DustCell> {
        self.cells.get_mut(idx)
    }

    /// Step every cell by `dt` on the rayon pool.
    ///
    /// If any cell fails, every cell is rolled back to where it stood before
    /// the call and the error of the lowest-indexed failing cell is returned.
    pub fn step_all(&mut self, dt: f64) -> DustResult<Vec<StepRecord>> {
        let checkpoints: Vec<CellCheckpoint> = self.cells.iter().map(DustCell::checkpoint).collect();
        let results: Vec<DustResult<StepRecord>> = self
            .cells
            .par_iter_mut()
            .map(|cell| cell.step(dt))
            .collect();
        self.commit_or_rollback(checkpoints, results)
    }

    /// Sequential reference for [`Self::step_all`].
    pub fn step_all_serial(&mut self, dt: f64) -> DustResult<Vec<StepRecord>> {
        let checkpoints: Vec<CellCheckpoint> = self.cells.iter().map(DustCell::checkpoint).collect();
        let results: Vec<DustResult<StepRecord>> =
            self.cells.iter_mut().map(|cell| cell.step(dt)).collect();
        self.commit_or_rollback(checkpoints, results)
    }

    fn commit_or_rollback(
        &mut self,
        checkpoints: Vec<CellCheckpoint>,
        results: Vec<DustResult<StepRecord>>,
    ) -> DustResult<Vec<StepRecord>> {
        let mut records = Vec::with_capacity(results.len());
        let mut failure = None;
        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(rec) => records.push(rec),
                Err(err) => {
                    failure.get_or_insert((idx, err));
                }
            }
        }
        let Some((idx, err)) = failure else {
            return Ok(records);
        };
        warn!(cell = idx, error = %err, "ensemble: step failed, rolling back all cells");
        for (cell, checkpoint) in self.cells.iter_mut().zip(checkpoints) {
            cell.restore(checkpoint);
        }
        Err(err)
    }

    /// `n_steps` parallel steps; returns the last record of each cell.
    pub fn run(&mut self, dt: f64, n_steps: usize) -> DustResult<Vec<StepRecord>> {
        let mut last = Vec::new();
        for _ in 0..n_steps {
            last = self.step_all(dt)?;
        }
        Ok(last)
    }

    /// Warning counters summed over all cells.
    pub fn warnings(&self) -> WarningLog {
        let mut total = WarningLog::new();
        for cell in &self.cells {
            total.merge(cell.warnings());
        }
        total
    }

    /// Total surface density over all cells (kg/m^2, unweighted by area).
    pub fn total_sigma(&self) -> f64 {
        self.cells.iter().map(|c| c.psd().sigma()).sum()
    }
}
