// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Sublimation Drift
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sublimation mass flux and the size drift it drives.
//!
//! Hertz–Knudsen–Langmuir flux
//!   J = α (P_sat - P_gas) √(μ / (2π R T)),   log10 P_sat = A - B/T
//! with a logistic stand-in J = exp((T - T_sub)/ΔT) when A, B are absent.
//! Grains shrink at ds/dt = -J/ρ.
//!
//! The drift moves each bin's particles to s' = s + ds/dt·dt and splits them
//! between the two bin centres bracketing s', linearly in size, so particle
//! number is conserved. The mass deficit of that move is the sublimated mass.

use std::f64::consts::PI;
use std::fmt::Debug;

use dust_types::config::{SublimationConfig, SublimationMode};
use dust_types::constants::R_GAS;
use dust_types::error::{DustError, DustResult};
use dust_types::state::PsdState;
use ndarray::Array1;

/// Mass flux leaving a grain surface (kg m^-2 s^-1).
pub trait SublimationLaw: Debug + Send + Sync {
    fn mass_flux(&self, temperature: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HklLaw {
    pub alpha_evap: f64,
    /// kg/mol
    pub mu: f64,
    pub a: f64,
    pub b: f64,
    /// Pa
    pub p_gas: f64,
}

impl HklLaw {
    pub fn p_sat(&self, temperature: f64) -> f64 {
        10f64.powf(self.a - self.b / temperature)
    }
}

impl SublimationLaw for HklLaw {
    fn mass_flux(&self, temperature: f64) -> f64 {
        let excess = (self.p_sat(temperature) - self.p_gas).max(0.0);
        if excess <= 0.0 {
            return 0.0;
        }
        self.alpha_evap * excess * (self.mu / (2.0 * PI * R_GAS * temperature)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticLaw {
    pub t_sub: f64,
    pub d_t: f64,
}

impl SublimationLaw for LogisticLaw {
    fn mass_flux(&self, temperature: f64) -> f64 {
        ((temperature - self.t_sub) / self.d_t.max(1.0)).exp()
    }
}

pub fn law_from_config(cfg: &SublimationConfig) -> Box<dyn SublimationLaw> {
    match (cfg.a, cfg.b) {
        (Some(a), Some(b)) => Box::new(HklLaw {
            alpha_evap: cfg.alpha_evap,
            mu: cfg.mu,
            a,
            b,
            p_gas: cfg.p_gas,
        }),
        _ => Box::new(LogisticLaw {
            t_sub: cfg.t_sub,
            d_t: cfg.d_t,
        }),
    }
}

/// Uniform radius shrink rate ds/dt = -J/ρ for every bin.
pub fn shrink_rates(
    law: &dyn SublimationLaw,
    temperature: f64,
    rho: f64,
    n_bins: usize,
) -> DustResult<Array1<f64>> {
    let flux = law.mass_flux(temperature);
    if !flux.is_finite() || flux < 0.0 {
        return Err(DustError::Numerical(format!(
            "sublimation flux must be finite and >= 0, got {flux} at T={temperature}"
        )));
    }
    Ok(Array1::from_elem(n_bins, -flux / rho))
}

/// Surface density moved out of the layer by one drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct DriftOutcome {
    pub sublimation_loss: f64,
    pub blowout_loss: f64,
}

impl DriftOutcome {
    pub fn total(&self) -> f64 {
        self.sublimation_loss + self.blowout_loss
    }
}

/// Advance every bin by `ds_dt·dt` and rebin.
///
/// Mass-conserving mode hands grains whose new size falls below `a_blow`
/// to the blow-out channel whole and rebins the rest by mass, so
/// `sublimation_loss` stays zero. Legacy mode splits the count, tallies
/// every deficit as sublimation and clamps sub-grid sizes into the first bin.
pub fn apply_drift(
    psd: &mut PsdState,
    ds_dt: &Array1<f64>,
    dt: f64,
    a_blow: f64,
    mode: SublimationMode,
) -> DustResult<DriftOutcome> {
    let n = psd.n_bins();
    if ds_dt.len() != n {
        return Err(DustError::Numerical(format!(
            "drift rate length {} does not match {n} bins",
            ds_dt.len()
        )));
    }
    if let Some(bad) = ds_dt.iter().find(|v| !v.is_finite()) {
        return Err(DustError::Numerical(format!(
            "drift rate must be finite, got {bad}"
        )));
    }
    if !dt.is_finite() || dt <= 0.0 {
        return Err(DustError::Numerical(format!(
            "drift requires finite dt > 0, got {dt}"
        )));
    }

    let centers = psd.sizes().clone();
    let masses = psd.masses().clone();
    let old = psd.number.clone();
    let mut next = Array1::<f64>::zeros(n);
    let mut outcome = DriftOutcome::default();

    for k in 0..n {
        let count = old[k];
        if count <= 0.0 {
            continue;
        }
        // Growth is not modelled; only shrinkage moves particles.
        let s_new = centers[k] + ds_dt[k].min(0.0) * dt;
        if s_new >= centers[k] {
            next[k] += count;
            continue;
        }

        let below_floor = match mode {
            SublimationMode::MassConserving => s_new < a_blow,
            SublimationMode::Legacy => s_new <= 0.0,
        };
        if below_floor {
            let lost = masses[k] * count;
            match mode {
                SublimationMode::MassConserving => outcome.blowout_loss += lost,
                SublimationMode::Legacy => outcome.sublimation_loss += lost,
            }
            continue;
        }

        if s_new <= centers[0] {
            match mode {
                SublimationMode::MassConserving => next[0] += count * masses[k] / masses[0],
                SublimationMode::Legacy => {
                    next[0] += count;
                    outcome.sublimation_loss += (masses[k] - masses[0]) * count;
                }
            }
            continue;
        }

        // centers[t] <= s_new < centers[t + 1], t + 1 <= k
        let t = centers
            .as_slice()
            .map(|c| c.partition_point(|&x| x <= s_new) - 1)
            .unwrap_or(0)
            .min(k.saturating_sub(1));
        let w = (centers[t + 1] - s_new) / (centers[t + 1] - centers[t]);
        let w = w.clamp(0.0, 1.0);
        match mode {
            // split the mass, not the count, so shrinkage above a_blow keeps Σ
            SublimationMode::MassConserving => {
                let mass = count * masses[k];
                next[t] += w * mass / masses[t];
                next[t + 1] += (1.0 - w) * mass / masses[t + 1];
            }
            SublimationMode::Legacy => {
                next[t] += w * count;
                next[t + 1] += (1.0 - w) * count;
                outcome.sublimation_loss +=
                    (masses[k] - w * masses[t] - (1.0 - w) * masses[t + 1]) * count;
            }
        }
    }

    psd.number = next;
    Ok(outcome)
}
