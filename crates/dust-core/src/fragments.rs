// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Fragment Redistribution
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Fragment redistribution tensor Y[k, i, j].
//!
//! For a pair (i, j) the remnant bin k_lr = max(i, j) receives f_LR of the
//! pair mass directly. The remaining 1 - f_LR is spread over bins 0..=k_lr
//! with mass weights ∫ s^-alpha ds over each bin. Columns sum to one.

use dust_math::powerlaw::bin_integral;
use dust_types::error::{DustError, DustResult};
use dust_types::state::PsdState;
use ndarray::{Array1, Array2, Array3};
use tracing::info;

use crate::disruption::{classify_pair, CollisionRegime, QStarTable};
use crate::kernel::RelativeVelocity;

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentTensor {
    y: Array3<f64>,
    f_lr: Array2<f64>,
    cratering: Array2<bool>,
    out_of_range_pairs: usize,
    nonpositive_threshold_pairs: usize,
}

impl FragmentTensor {
    pub fn build(
        psd: &PsdState,
        v_rel: &RelativeVelocity,
        alpha_frag: f64,
        table: &QStarTable,
    ) -> DustResult<Self> {
        if !alpha_frag.is_finite() {
            return Err(DustError::ConfigError(format!(
                "fragment exponent must be finite, got {alpha_frag}"
            )));
        }
        let n = psd.n_bins();
        v_rel.validate(n)?;
        let edges = psd.grid().edges();
        let sizes = psd.sizes();
        let masses = psd.masses();

        let bin_int = Array1::from_shape_fn(n, |k| bin_integral(edges[k], edges[k + 1], alpha_frag));
        if let Some(bad) = bin_int.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(DustError::Numerical(format!(
                "fragment bin integral invalid for alpha={alpha_frag}: {bad}"
            )));
        }
        let mut cumulative = Array1::<f64>::zeros(n);
        let mut running = 0.0;
        for k in 0..n {
            running += bin_int[k];
            cumulative[k] = running;
        }

        let mut y = Array3::<f64>::zeros((n, n, n));
        let mut f_lr = Array2::<f64>::zeros((n, n));
        let mut cratering = Array2::from_elem((n, n), false);
        let mut out_of_range_pairs = 0usize;
        let mut nonpositive_threshold_pairs = 0usize;
        let mut column = vec![0.0; n];

        for i in 0..n {
            for j in i..n {
                let k_lr = j;
                let outcome = classify_pair(
                    masses[i],
                    masses[j],
                    sizes[j],
                    psd.rho(),
                    v_rel.at(i, j),
                    table,
                )?;
                if !outcome.in_range {
                    out_of_range_pairs += 1;
                }
                if !(outcome.q_star > 0.0) {
                    nonpositive_threshold_pairs += 1;
                }
                let f = outcome.f_lr;

                column[..=k_lr].fill(0.0);
                let total = cumulative[k_lr];
                if total > 0.0 && total.is_finite() {
                    let remainder = 1.0 - f;
                    for k in 0..=k_lr {
                        column[k] = remainder * bin_int[k] / total;
                    }
                    column[k_lr] += f;
                } else {
                    column[k_lr] = 1.0;
                }
                let sum: f64 = column[..=k_lr].iter().sum();
                for k in 0..=k_lr {
                    let w = column[k] / sum;
                    y[[k, i, j]] = w;
                    y[[k, j, i]] = w;
                }
                f_lr[[i, j]] = f;
                f_lr[[j, i]] = f;
                let crater = outcome.regime == CollisionRegime::Cratering;
                cratering[[i, j]] = crater;
                cratering[[j, i]] = crater;
            }
        }

        Ok(Self {
            y,
            f_lr,
            cratering,
            out_of_range_pairs,
            nonpositive_threshold_pairs,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.f_lr.nrows()
    }

    /// Mass fraction of pair (i, j) delivered to bin k.
    pub fn weight(&self, k: usize, i: usize, j: usize) -> f64 {
        self.y[[k, i, j]]
    }

    pub fn weights(&self) -> &Array3<f64> {
        &self.y
    }

    pub fn remnant_fraction(&self) -> &Array2<f64> {
        &self.f_lr
    }

    pub fn is_cratering(&self, i: usize, j: usize) -> bool {
        self.cratering[[i, j]]
    }

    pub fn remnant_bin(i: usize, j: usize) -> usize {
        i.max(j)
    }

    /// Pairs (i ≤ j) whose impact speed fell outside the Q* table.
    pub fn out_of_range_pairs(&self) -> usize {
        self.out_of_range_pairs
    }

    pub fn nonpositive_threshold_pairs(&self) -> usize {
        self.nonpositive_threshold_pairs
    }
}

/// Everything the tensor depends on, compared bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentKey {
    pub grid_version: u64,
    pub rho_bits: u64,
    pub velocity: u64,
    pub alpha_bits: u64,
    pub qstar: u64,
}

impl FragmentKey {
    pub fn new(psd: &PsdState, v_rel: &RelativeVelocity, alpha_frag: f64, table: &QStarTable) -> Self {
        Self {
            grid_version: psd.grid_version(),
            rho_bits: psd.rho().to_bits(),
            velocity: v_rel.signature(),
            alpha_bits: alpha_frag.to_bits(),
            qstar: table.signature(),
        }
    }
}

/// Per-cell fragment tensor cache. Any key change forces a full rebuild.
#[derive(Debug, Clone, Default)]
pub struct FragmentCache {
    key: Option<FragmentKey>,
    tensor: Option<FragmentTensor>,
    builds: u64,
    hits: u64,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tensor for the current inputs, and whether it was just rebuilt.
    pub fn get_or_build(
        &mut self,
        psd: &PsdState,
        v_rel: &RelativeVelocity,
        alpha_frag: f64,
        table: &QStarTable,
    ) -> DustResult<(&FragmentTensor, bool)> {
        let key = FragmentKey::new(psd, v_rel, alpha_frag, table);
        let hit = self.tensor.is_some() && self.key == Some(key);
        let rebuilt = if hit {
            self.hits += 1;
            false
        } else {
            let tensor = FragmentTensor::build(psd, v_rel, alpha_frag, table)?;
            self.builds += 1;
            info!(
                builds = self.builds,
                grid_version = key.grid_version,
                n_bins = tensor.n_bins(),
                "fragments: rebuilt redistribution tensor"
            );
            self.key = Some(key);
            self.tensor = Some(tensor);
            true
        };
        let tensor = self
            .tensor
            .as_ref()
            .ok_or_else(|| DustError::Numerical("fragment cache empty after build".to_string()))?;
        Ok((tensor, rebuilt))
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.tensor = None;
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
