// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Collision Kernel
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Collision-rate matrix for the size bins.
//!
//!   C_ij = N_i N_j / (1 + δ_ij) · π (s_i + s_j)² v_ij / (√(2π) H_ij),
//!   H_ij = √(H_i² + H_j²)
//!
//! The geometric part K_ij = π (s_i + s_j)² v_ij / (√(2π) H_ij) depends only
//! on sizes, velocities and heights, so it is built once and reused while
//! those are unchanged; C is re-derived from the current N on every call.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use dust_types::error::{DustError, DustResult};
use ndarray::{Array1, Array2};
use tracing::debug;

/// Relative impact velocity, shared by all pairs or given per pair.
#[derive(Debug, Clone, PartialEq)]
pub enum RelativeVelocity {
    Scalar(f64),
    PerPair(Array2<f64>),
}

impl RelativeVelocity {
    pub fn at(&self, i: usize, j: usize) -> f64 {
        match self {
            RelativeVelocity::Scalar(v) => *v,
            RelativeVelocity::PerPair(v) => v[[i.min(j), i.max(j)]],
        }
    }

    /// Shape and value checks; non-finite or negative speeds are fatal.
    pub fn validate(&self, n: usize) -> DustResult<()> {
        match self {
            RelativeVelocity::Scalar(v) => {
                if !v.is_finite() || *v < 0.0 {
                    return Err(DustError::Numerical(format!(
                        "relative velocity must be finite and >= 0, got {v}"
                    )));
                }
            }
            RelativeVelocity::PerPair(v) => {
                if v.dim() != (n, n) {
                    return Err(DustError::Numerical(format!(
                        "per-pair velocity shape {:?} does not match {n} bins",
                        v.dim()
                    )));
                }
                if let Some(bad) = v.iter().find(|x| !x.is_finite() || **x < 0.0) {
                    return Err(DustError::Numerical(format!(
                        "relative velocity must be finite and >= 0, got {bad}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hash of the exact bit patterns; equal signatures mean equal velocities.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self {
            RelativeVelocity::Scalar(v) => {
                0u8.hash(&mut hasher);
                v.to_bits().hash(&mut hasher);
            }
            RelativeVelocity::PerPair(v) => {
                1u8.hash(&mut hasher);
                v.dim().hash(&mut hasher);
                for x in v.iter() {
                    x.to_bits().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

pub(crate) fn bits_signature(values: &Array1<f64>) -> u64 {
    let mut hasher = DefaultHasher::new();
    values.len().hash(&mut hasher);
    for x in values.iter() {
        x.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

fn check_profile(name: &str, values: &Array1<f64>, n: usize, strictly_positive: bool) -> DustResult<()> {
    if values.len() != n {
        return Err(DustError::Numerical(format!(
            "{name} length {} does not match {n} bins",
            values.len()
        )));
    }
    for (k, &v) in values.iter().enumerate() {
        let bad = !v.is_finite() || v < 0.0 || (strictly_positive && v == 0.0);
        if bad {
            return Err(DustError::Numerical(format!(
                "{name}[{k}] must be finite and {}, got {v}",
                if strictly_positive { "> 0" } else { ">= 0" }
            )));
        }
    }
    Ok(())
}

/// Geometric collision coefficients K_ij (m^2/s), symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionKernel {
    coeff: Array2<f64>,
}

impl CollisionKernel {
    pub fn new(
        sizes: &Array1<f64>,
        heights: &Array1<f64>,
        v_rel: &RelativeVelocity,
    ) -> DustResult<Self> {
        let n = sizes.len();
        check_profile("sizes", sizes, n, false)?;
        check_profile("scale heights", heights, n, true)?;
        v_rel.validate(n)?;

        let norm = (2.0 * PI).sqrt();
        let mut coeff = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let s_sum = sizes[i] + sizes[j];
                let h_ij = (heights[i] * heights[i] + heights[j] * heights[j]).sqrt();
                let k_ij = PI * s_sum * s_sum * v_rel.at(i, j) / (norm * h_ij);
                if !k_ij.is_finite() {
                    return Err(DustError::Numerical(format!(
                        "collision coefficient ({i},{j}) is non-finite"
                    )));
                }
                coeff[[i, j]] = k_ij;
                coeff[[j, i]] = k_ij;
            }
        }
        Ok(Self { coeff })
    }

    pub fn n_bins(&self) -> usize {
        self.coeff.nrows()
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coeff
    }

    /// Pair collision rates C_ij for the given number densities.
    pub fn rates(&self, number: &Array1<f64>) -> DustResult<Array2<f64>> {
        let n = self.n_bins();
        check_profile("number density", number, n, false)?;
        let mut c = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let delta = if i == j { 2.0 } else { 1.0 };
                let c_ij = number[i] * number[j] * self.coeff[[i, j]] / delta;
                if !c_ij.is_finite() {
                    return Err(DustError::Numerical(format!(
                        "collision rate ({i},{j}) is non-finite"
                    )));
                }
                c[[i, j]] = c_ij;
                c[[j, i]] = c_ij;
            }
        }
        Ok(c)
    }

    /// Per-particle loss rate λ_i = Σ_j C_ij (1 + δ_ij) / N_i = Σ_j K_ij N_j.
    pub fn loss_rates(&self, number: &Array1<f64>) -> Array1<f64> {
        self.coeff.dot(number)
    }
}

/// Build the collision-rate matrix in one call.
pub fn build_collision_matrix(
    number: &Array1<f64>,
    sizes: &Array1<f64>,
    heights: &Array1<f64>,
    v_rel: &RelativeVelocity,
) -> DustResult<Array2<f64>> {
    CollisionKernel::new(sizes, heights, v_rel)?.rates(number)
}

/// Shortest collision time 1/max(λ); infinite for a collisionless layer.
pub fn min_collision_time(loss_rates: &Array1<f64>) -> f64 {
    let lambda_max = loss_rates.iter().copied().fold(0.0_f64, f64::max);
    if lambda_max > 0.0 {
        1.0 / lambda_max
    } else {
        f64::INFINITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KernelKey {
    grid_version: u64,
    velocity: u64,
    heights: u64,
}

/// Per-cell cache of [`CollisionKernel`] keyed on grid version, velocity and heights.
#[derive(Debug, Clone, Default)]
pub struct KernelCache {
    key: Option<KernelKey>,
    kernel: Option<CollisionKernel>,
    builds: u64,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        grid_version: u64,
        sizes: &Array1<f64>,
        heights: &Array1<f64>,
        v_rel: &RelativeVelocity,
    ) -> DustResult<&CollisionKernel> {
        let key = KernelKey {
            grid_version,
            velocity: v_rel.signature(),
            heights: bits_signature(heights),
        };
        let stale = self.key != Some(key) || self.kernel.is_none();
        if stale {
            let kernel = CollisionKernel::new(sizes, heights, v_rel)?;
            self.builds += 1;
            debug!(builds = self.builds, grid_version, "kernel: rebuilt collision coefficients");
            self.key = Some(key);
            self.kernel = Some(kernel);
        }
        self.kernel
            .as_ref()
            .ok_or_else(|| DustError::Numerical("kernel cache empty after build".to_string()))
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }
}
