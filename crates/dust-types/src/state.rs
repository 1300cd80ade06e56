// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{DustError, DustResult};
use crate::warnings::{WarningKind, WarningLog};

/// Process-wide source of grid versions. Only hands out ids; holds no physics.
static NEXT_GRID_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_GRID_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Logarithmic particle-radius bins.
///
/// Immutable once built. Every construction or rebuild receives a fresh
/// `version`, which downstream caches use as part of their key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeGrid {
    edges: Array1<f64>,
    centers: Array1<f64>,
    widths: Array1<f64>,
    version: u64,
}

impl SizeGrid {
    /// `n_bins` log-spaced bins between `s_min` and `s_max` (m).
    pub fn log_spaced(s_min: f64, s_max: f64, n_bins: usize) -> DustResult<Self> {
        if !s_min.is_finite() || !s_max.is_finite() || s_min <= 0.0 || s_max <= s_min {
            return Err(DustError::ConfigError(format!(
                "size grid requires 0 < s_min < s_max, got s_min={s_min}, s_max={s_max}"
            )));
        }
        if n_bins == 0 {
            return Err(DustError::ConfigError(
                "size grid requires n_bins >= 1".to_string(),
            ));
        }
        let log_min = s_min.ln();
        let step = (s_max.ln() - log_min) / n_bins as f64;
        let mut edges = Array1::from_shape_fn(n_bins + 1, |k| (log_min + step * k as f64).exp());
        // Pin the end points against exp/ln round-off.
        edges[0] = s_min;
        edges[n_bins] = s_max;
        Self::from_edges(edges)
    }

    pub fn from_edges(edges: Array1<f64>) -> DustResult<Self> {
        if edges.len() < 2 {
            return Err(DustError::ConfigError(format!(
                "size grid needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        for (k, &e) in edges.iter().enumerate() {
            if !e.is_finite() || e <= 0.0 {
                return Err(DustError::ConfigError(format!(
                    "size grid edge {k} must be finite and > 0, got {e}"
                )));
            }
        }
        for k in 1..edges.len() {
            if edges[k] <= edges[k - 1] {
                return Err(DustError::ConfigError(format!(
                    "size grid edges must be strictly increasing at {k}: {} <= {}",
                    edges[k],
                    edges[k - 1]
                )));
            }
        }
        let n = edges.len() - 1;
        let centers = Array1::from_shape_fn(n, |k| (edges[k] * edges[k + 1]).sqrt());
        let widths = Array1::from_shape_fn(n, |k| edges[k + 1] - edges[k]);
        Ok(Self {
            edges,
            centers,
            widths,
            version: next_version(),
        })
    }

    /// Same bin count over new bounds, with a new version.
    pub fn rebuilt(&self, s_min: f64, s_max: f64) -> DustResult<Self> {
        Self::log_spaced(s_min, s_max, self.n_bins())
    }

    pub fn n_bins(&self) -> usize {
        self.centers.len()
    }

    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }

    pub fn centers(&self) -> &Array1<f64> {
        &self.centers
    }

    pub fn widths(&self) -> &Array1<f64> {
        &self.widths
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn s_min(&self) -> f64 {
        self.edges[0]
    }

    pub fn s_max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin whose half-open range [left, right) holds `s`, if any.
    pub fn bin_of(&self, s: f64) -> Option<usize> {
        if !(s >= self.s_min() && s < self.s_max()) {
            return None;
        }
        let idx = self.edges.as_slice()?.partition_point(|&e| e <= s);
        Some(idx - 1)
    }
}

/// Sphere mass for radius `s` and bulk density `rho`.
pub fn grain_mass(s: f64, rho: f64) -> f64 {
    4.0 / 3.0 * PI * rho * s * s * s
}

/// Per-bin surface number density (m^-2) on an owned size grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdState {
    grid: SizeGrid,
    masses: Array1<f64>,
    rho: f64,
    /// Smallest size still resolved in the layer (max of grid floor and a_blow)
    s_min_eff: f64,
    /// Number density per bin; non-negative and finite between steps
    pub number: Array1<f64>,
}

impl PsdState {
    pub fn new(grid: SizeGrid, rho: f64) -> DustResult<Self> {
        if !rho.is_finite() || rho <= 0.0 {
            return Err(DustError::ConfigError(format!(
                "bulk density must be finite and > 0, got {rho}"
            )));
        }
        let masses = grid.centers().mapv(|s| grain_mass(s, rho));
        let n = grid.n_bins();
        let s_min_eff = grid.s_min();
        Ok(Self {
            grid,
            masses,
            rho,
            s_min_eff,
            number: Array1::zeros(n),
        })
    }

    /// N_k ∝ s_k^-q · width_k, scaled so the surface density equals `sigma0`.
    pub fn power_law(grid: SizeGrid, rho: f64, q: f64, sigma0: f64) -> DustResult<Self> {
        if !sigma0.is_finite() || sigma0 < 0.0 {
            return Err(DustError::ConfigError(format!(
                "initial surface density must be finite and >= 0, got {sigma0}"
            )));
        }
        let mut psd = Self::new(grid, rho)?;
        let shape = Array1::from_shape_fn(psd.grid.n_bins(), |k| {
            psd.grid.centers()[k].powf(-q) * psd.grid.widths()[k]
        });
        let raw_sigma: f64 = shape.iter().zip(psd.masses.iter()).map(|(n, m)| n * m).sum();
        if !raw_sigma.is_finite() || raw_sigma <= 0.0 {
            return Err(DustError::ConfigError(format!(
                "initial power law q={q} gives unusable mass normalisation {raw_sigma}"
            )));
        }
        psd.number = shape * (sigma0 / raw_sigma);
        Ok(psd)
    }

    pub fn grid(&self) -> &SizeGrid {
        &self.grid
    }

    pub fn grid_version(&self) -> u64 {
        self.grid.version()
    }

    pub fn masses(&self) -> &Array1<f64> {
        &self.masses
    }

    pub fn sizes(&self) -> &Array1<f64> {
        self.grid.centers()
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn n_bins(&self) -> usize {
        self.grid.n_bins()
    }

    pub fn s_min_eff(&self) -> f64 {
        self.s_min_eff
    }

    pub fn s_max(&self) -> f64 {
        self.grid.s_max()
    }

    pub fn set_s_min_eff(&mut self, s: f64) {
        self.s_min_eff = s.max(self.grid.s_min());
    }

    /// Surface mass density Σ = Σ_k m_k N_k (kg/m^2).
    pub fn sigma(&self) -> f64 {
        self.masses.dot(&self.number)
    }

    /// Bare mass opacity κ = Σ πs²N / Σ mN (m^2/kg); zero for an empty layer.
    pub fn kappa(&self) -> f64 {
        let mass = self.sigma();
        if !(mass > 0.0) {
            return 0.0;
        }
        let area: f64 = self
            .grid
            .centers()
            .iter()
            .zip(self.number.iter())
            .map(|(s, n)| PI * s * s * n)
            .sum();
        area / mass
    }

    pub fn scale(&mut self, factor: f64) {
        self.number.mapv_inplace(|n| n * factor);
    }

    /// Replace negative or non-finite entries with zero, then optionally
    /// rescale so Σ matches `target_sigma`. Returns the number of repaired bins.
    pub fn sanitize(&mut self, target_sigma: Option<f64>, log: &mut WarningLog) -> usize {
        let mut repaired = 0usize;
        for n in self.number.iter_mut() {
            if !n.is_finite() || *n < 0.0 {
                *n = 0.0;
                repaired += 1;
            }
        }
        if repaired == 0 {
            return 0;
        }
        if let Some(target) = target_sigma {
            let sigma = self.sigma();
            if target.is_finite() && target >= 0.0 && sigma > 0.0 && sigma.is_finite() {
                self.scale(target / sigma);
            }
        }
        log.record(
            WarningKind::PsdSanitized,
            &format!("psd: repaired {repaired} bins with negative or non-finite density"),
        );
        repaired
    }

    /// Move the distribution onto `grid`, conserving mass bin by bin.
    ///
    /// Each old bin's mass lands in the new bin containing its center,
    /// clamped to the end bins.
    pub fn regrid(&mut self, grid: SizeGrid) {
        let new_masses = grid.centers().mapv(|s| grain_mass(s, self.rho));
        let mut number = Array1::<f64>::zeros(grid.n_bins());
        let last = grid.n_bins() - 1;
        for (k, &s) in self.grid.centers().iter().enumerate() {
            let target = if s < grid.s_min() {
                0
            } else {
                grid.bin_of(s).unwrap_or(last)
            };
            number[target] += self.masses[k] * self.number[k] / new_masses[target];
        }
        self.s_min_eff = self.s_min_eff.max(grid.s_min());
        self.grid = grid;
        self.masses = new_masses;
        self.number = number;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_grid_shapes() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 20).expect("valid grid");
        assert_eq!(grid.n_bins(), 20);
        assert_eq!(grid.edges().len(), 21);
        assert_eq!(grid.centers().len(), 20);
        assert_eq!(grid.widths().len(), 20);
        assert_eq!(grid.s_min(), 1e-6);
        assert_eq!(grid.s_max(), 1e-2);
        for k in 0..20 {
            assert!(grid.centers()[k] > grid.edges()[k]);
            assert!(grid.centers()[k] < grid.edges()[k + 1]);
            assert!(grid.widths()[k] > 0.0);
        }
    }

    #[test]
    fn test_versions_are_unique() {
        let a = SizeGrid::log_spaced(1e-6, 1e-2, 8).expect("grid");
        let b = a.rebuilt(2e-6, 1e-2).expect("rebuild");
        let c = a.clone();
        assert_ne!(a.version(), b.version());
        assert_eq!(a.version(), c.version());
    }

    #[test]
    fn test_rejects_bad_edges() {
        let err = SizeGrid::from_edges(Array1::from(vec![1.0, 1.0, 2.0])).expect_err("flat");
        match err {
            DustError::ConfigError(msg) => assert!(msg.contains("strictly increasing")),
            other => panic!("Unexpected error variant: {other:?}"),
        }
        assert!(SizeGrid::from_edges(Array1::from(vec![1.0])).is_err());
        assert!(SizeGrid::from_edges(Array1::from(vec![-1.0, 1.0])).is_err());
        assert!(SizeGrid::log_spaced(1e-2, 1e-6, 4).is_err());
        assert!(SizeGrid::log_spaced(1e-6, 1e-2, 0).is_err());
    }

    #[test]
    fn test_bin_of() {
        let grid = SizeGrid::from_edges(Array1::from(vec![1.0, 2.0, 4.0, 8.0])).expect("grid");
        assert_eq!(grid.bin_of(1.0), Some(0));
        assert_eq!(grid.bin_of(1.999), Some(0));
        assert_eq!(grid.bin_of(2.0), Some(1));
        assert_eq!(grid.bin_of(7.9), Some(2));
        assert_eq!(grid.bin_of(8.0), None);
        assert_eq!(grid.bin_of(0.5), None);
    }

    #[test]
    fn test_power_law_sigma_matches_target() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 30).expect("grid");
        let psd = PsdState::power_law(grid, 3000.0, 3.5, 2e-3).expect("psd");
        assert!((psd.sigma() - 2e-3).abs() / 2e-3 < 1e-12);
        assert!(psd.number.iter().all(|&n| n > 0.0 && n.is_finite()));
    }

    #[test]
    fn test_kappa_single_bin() {
        let grid = SizeGrid::from_edges(Array1::from(vec![1e-6, 4e-6])).expect("grid");
        let mut psd = PsdState::new(grid, 2000.0).expect("psd");
        psd.number[0] = 1e6;
        let s = psd.sizes()[0];
        let expected = 3.0 / (4.0 * 2000.0 * s);
        assert!((psd.kappa() - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_kappa_empty_layer_is_zero() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 4).expect("grid");
        let psd = PsdState::new(grid, 3000.0).expect("psd");
        assert_eq!(psd.kappa(), 0.0);
    }

    #[test]
    fn test_sanitize_repairs_and_renormalizes() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 6).expect("grid");
        let mut psd = PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd");
        let target = psd.sigma();
        psd.number[1] = -5.0;
        psd.number[4] = f64::NAN;
        let mut log = WarningLog::new();
        let repaired = psd.sanitize(Some(target), &mut log);
        assert_eq!(repaired, 2);
        assert_eq!(log.count(WarningKind::PsdSanitized), 1);
        assert!(psd.number.iter().all(|&n| n >= 0.0 && n.is_finite()));
        assert!((psd.sigma() - target).abs() / target < 1e-12);
    }

    #[test]
    fn test_sanitize_clean_state_is_silent() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 6).expect("grid");
        let mut psd = PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd");
        let mut log = WarningLog::new();
        assert_eq!(psd.sanitize(None, &mut log), 0);
        assert_eq!(log.total(), 0);
    }

    #[test]
    fn test_regrid_conserves_mass_and_bumps_version() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 24).expect("grid");
        let mut psd = PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd");
        let before = psd.sigma();
        let old_version = psd.grid_version();
        let new_grid = psd.grid().rebuilt(3e-6, 1e-2).expect("rebuild");
        psd.regrid(new_grid);
        assert_ne!(psd.grid_version(), old_version);
        assert!((psd.sigma() - before).abs() / before < 1e-12);
        assert!(psd.s_min_eff() >= 3e-6);
    }

    #[test]
    fn test_rejects_non_positive_density() {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 4).expect("grid");
        assert!(PsdState::new(grid, 0.0).is_err());
    }
}
