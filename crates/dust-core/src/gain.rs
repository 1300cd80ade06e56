// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Gain Backends
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Fragment-gain redistribution.
//!
//! Given the mass M_ij consumed by each pair (i ≤ j) during a step, the
//! number gained by bin k is
//!   gain_k = Σ_{i≤j} M_ij · Y[k, i, j] / m_k.
//! With M_ij = C_ij (m_i + m_j) this is the instantaneous collisional gain
//! rate. Both backends evaluate each k with the same summation order, so
//! their results agree to the last bit.

use dust_types::config::GainBackend;
use dust_types::error::{DustError, DustResult};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::fragments::FragmentTensor;

fn gain_for_bin(k: usize, pair_mass: &Array2<f64>, tensor: &FragmentTensor, m_k: f64) -> f64 {
    let n = pair_mass.nrows();
    let y = tensor.weights();
    let mut acc = 0.0;
    // Y[k, i, j] vanishes for j < k (the remnant bin is max(i, j)).
    for j in k..n {
        for i in 0..=j {
            let m_ij = pair_mass[[i, j]];
            if m_ij != 0.0 {
                acc += m_ij * y[[k, i, j]];
            }
        }
    }
    acc / m_k
}

fn check_shapes(pair_mass: &Array2<f64>, tensor: &FragmentTensor, masses: &Array1<f64>) -> DustResult<()> {
    let n = masses.len();
    if pair_mass.dim() != (n, n) || tensor.n_bins() != n {
        return Err(DustError::Numerical(format!(
            "gain inputs disagree on bin count: pair mass {:?}, tensor {}, masses {n}",
            pair_mass.dim(),
            tensor.n_bins()
        )));
    }
    Ok(())
}

/// Number gained per bin from the upper triangle of `pair_mass`.
pub fn redistribute(
    backend: GainBackend,
    pair_mass: &Array2<f64>,
    tensor: &FragmentTensor,
    masses: &Array1<f64>,
) -> DustResult<Array1<f64>> {
    check_shapes(pair_mass, tensor, masses)?;
    let n = masses.len();
    let gain: Vec<f64> = match backend {
        GainBackend::Serial => (0..n)
            .map(|k| gain_for_bin(k, pair_mass, tensor, masses[k]))
            .collect(),
        GainBackend::Parallel => (0..n)
            .into_par_iter()
            .map(|k| gain_for_bin(k, pair_mass, tensor, masses[k]))
            .collect(),
    };
    Ok(Array1::from(gain))
}

/// Instantaneous gain rate from a collision-rate matrix C.
pub fn gain_rates(
    backend: GainBackend,
    rates: &Array2<f64>,
    tensor: &FragmentTensor,
    masses: &Array1<f64>,
) -> DustResult<Array1<f64>> {
    let n = masses.len();
    let pair_mass = Array2::from_shape_fn((n, n), |(i, j)| {
        if i <= j && i < rates.nrows() && j < rates.ncols() {
            rates[[i, j]] * (masses[i] + masses[j])
        } else {
            0.0
        }
    });
    redistribute(backend, &pair_mass, tensor, masses)
}
