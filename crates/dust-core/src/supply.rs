// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Supply
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! External mass supply: rate laws and the per-bin source vector.

use std::f64::consts::PI;
use std::fmt::Debug;

use dust_math::powerlaw::overlap_integral;
use dust_types::config::{InjectionPolicy, SupplyConfig, SupplyLaw};
use dust_types::error::{DustError, DustResult};
use dust_types::state::PsdState;
use ndarray::Array1;
use tracing::debug;

/// Areal mass supply rate (kg m^-2 s^-1) as a function of time.
pub trait SupplyRate: Debug + Send + Sync {
    fn rate(&self, t: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstSupply {
    pub rate: f64,
}

impl SupplyRate for ConstSupply {
    fn rate(&self, _t: f64) -> f64 {
        self.rate
    }
}

/// rate(t) = rate · ((t + t0) / t0)^index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLawSupply {
    pub rate: f64,
    pub t0: f64,
    pub index: f64,
}

impl SupplyRate for PowerLawSupply {
    fn rate(&self, t: f64) -> f64 {
        self.rate * ((t.max(0.0) + self.t0) / self.t0).powf(self.index)
    }
}

pub fn supply_from_config(cfg: &SupplyConfig) -> Box<dyn SupplyRate> {
    match cfg.law {
        SupplyLaw::Const => Box::new(ConstSupply { rate: cfg.rate }),
        SupplyLaw::PowerLaw { t0, index } => Box::new(PowerLawSupply {
            rate: cfg.rate,
            t0,
            index,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InjectionKey {
    grid_version: u64,
    s_min_eff_bits: u64,
}

/// Turns a gated mass rate into a number-density source per bin.
///
/// The injection shape depends only on the grid and the effective minimum
/// size, so it is kept as a unit-mass-rate vector u with Σ m_k u_k = 1.
#[derive(Debug, Clone)]
pub struct SupplyDistributor {
    policy: InjectionPolicy,
    s_inj_max: Option<f64>,
    key: Option<InjectionKey>,
    unit: Array1<f64>,
    builds: u64,
}

impl SupplyDistributor {
    pub fn new(policy: InjectionPolicy, s_inj_max: Option<f64>) -> Self {
        Self {
            policy,
            s_inj_max,
            key: None,
            unit: Array1::zeros(0),
            builds: 0,
        }
    }

    pub fn from_config(cfg: &SupplyConfig) -> Self {
        Self::new(cfg.injection, cfg.s_inj_max)
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// First bin whose center clears the size floor, so injected grains
    /// are not blown out on arrival. Falls back to the bin holding the floor.
    fn smallest_bin(psd: &PsdState) -> DustResult<usize> {
        let edges = psd.grid().edges();
        let centers = psd.sizes();
        let s_floor = psd.s_min_eff();
        (0..psd.n_bins())
            .find(|&k| centers[k] >= s_floor)
            .or_else(|| (0..psd.n_bins()).find(|&k| edges[k + 1] > s_floor))
            .ok_or_else(|| {
                DustError::Numerical(format!(
                    "no size bin above the effective minimum size {s_floor}"
                ))
            })
    }

    fn build_unit(&self, psd: &PsdState) -> DustResult<Array1<f64>> {
        let n = psd.n_bins();
        let masses = psd.masses();
        let mut unit = Array1::<f64>::zeros(n);
        if let InjectionPolicy::PowerLaw { q } = self.policy {
            let edges = psd.grid().edges();
            let lo = psd.s_min_eff();
            let hi = self.s_inj_max.unwrap_or(psd.s_max()).min(psd.s_max());
            let weights = Array1::from_shape_fn(n, |k| overlap_integral(edges[k], edges[k + 1], lo, hi, q));
            let mass_norm = weights.dot(masses);
            if mass_norm.is_finite() && mass_norm > 0.0 {
                unit = weights / mass_norm;
                return Ok(unit);
            }
            debug!(lo, hi, "supply: empty power-law injection range, using smallest bin");
        }
        let k = Self::smallest_bin(psd)?;
        unit[k] = 1.0 / masses[k];
        Ok(unit)
    }

    /// Unit-mass-rate injection vector for the current grid and size floor.
    pub fn unit_source(&mut self, psd: &PsdState) -> DustResult<&Array1<f64>> {
        let key = InjectionKey {
            grid_version: psd.grid_version(),
            s_min_eff_bits: psd.s_min_eff().to_bits(),
        };
        if self.key != Some(key) {
            self.unit = self.build_unit(psd)?;
            self.key = Some(key);
            self.builds += 1;
            debug!(
                builds = self.builds,
                s_min_eff = psd.s_min_eff(),
                "supply: rebuilt injection range"
            );
        }
        Ok(&self.unit)
    }

    /// Source rate N_k (m^-2 s^-1) whose implied mass rate is `mass_rate`.
    pub fn distribute(&mut self, psd: &PsdState, mass_rate: f64) -> DustResult<Array1<f64>> {
        if !mass_rate.is_finite() || mass_rate < 0.0 {
            return Err(DustError::Numerical(format!(
                "supply mass rate must be finite and >= 0, got {mass_rate}"
            )));
        }
        let unit = self.unit_source(psd)?;
        Ok(unit * mass_rate)
    }

    /// Bare opacity of freshly injected material.
    pub fn injection_opacity(&mut self, psd: &PsdState) -> DustResult<f64> {
        let unit = self.unit_source(psd)?;
        let area: f64 = unit
            .iter()
            .zip(psd.sizes().iter())
            .map(|(u, s)| PI * s * s * u)
            .sum();
        Ok(area)
    }
}
