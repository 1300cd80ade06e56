// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Radiation Blow-Out
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Radiation pressure and blow-out removal.
//!
//!   β = 3 L ⟨Q_pr⟩ / (16 π c G M ρ s),   L = 4π R² σ T⁴
//!
//! Bins with β ≥ 0.5 leave on the orbital timescale t_blow = 1/Ω.
//! When dt/t_blow exceeds the configured ratio the removal is sub-stepped.

use std::f64::consts::PI;
use std::fmt::Debug;

use dust_math::interp::{Table2D, TableValue};
use dust_math::roots::{bisect, BisectConfig};
use dust_types::config::{PlanetConfig, RadiationConfig};
use dust_types::constants::{BETA_BLOWOUT, C_LIGHT, G, SIGMA_SB};
use dust_types::error::{DustError, DustResult};
use dust_types::state::PsdState;
use ndarray::{Array1, Array2};

/// Size bracket scanned for the β = 0.5 crossing (m).
const BLOWOUT_SEARCH_BOUNDS: (f64, f64) = (1e-9, 1e-2);

/// Log-spaced samples in the blow-out scan.
const BLOWOUT_SCAN_SAMPLES: usize = 256;

/// Planck-mean radiation-pressure efficiency ⟨Q_pr⟩(s, T).
pub trait RadiationEfficiency: Debug + Send + Sync {
    fn q_pr(&self, s: f64, temperature: f64) -> TableValue;

    /// Some(Q) when the efficiency does not depend on size or temperature.
    fn constant(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantQpr(pub f64);

impl RadiationEfficiency for ConstantQpr {
    fn q_pr(&self, _s: f64, _temperature: f64) -> TableValue {
        TableValue::exact(self.0)
    }

    fn constant(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Tabulated ⟨Q_pr⟩ on a (size, temperature) grid, bilinear and clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct QprTable {
    table: Table2D,
}

impl QprTable {
    pub fn new(sizes: Vec<f64>, temperatures: Vec<f64>, values: Array2<f64>) -> DustResult<Self> {
        if values.iter().any(|&q| q < 0.0) {
            return Err(DustError::ConfigError(
                "Q_pr table values must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            table: Table2D::new(sizes, temperatures, values)?,
        })
    }
}

impl RadiationEfficiency for QprTable {
    fn q_pr(&self, s: f64, temperature: f64) -> TableValue {
        self.table.eval(s, temperature)
    }
}

pub fn planet_luminosity(radius: f64, temperature: f64) -> f64 {
    4.0 * PI * radius * radius * SIGMA_SB * temperature.powi(4)
}

/// Radiation-pressure to gravity ratio for one grain.
pub fn beta(s: f64, rho: f64, luminosity: f64, m_central: f64, q_pr: f64) -> f64 {
    3.0 * luminosity * q_pr / (16.0 * PI * C_LIGHT * G * m_central * rho * s)
}

/// Closed-form blow-out radius for a constant Q_pr.
pub fn blowout_radius_constant(rho: f64, luminosity: f64, m_central: f64, q_pr: f64) -> f64 {
    3.0 * luminosity * q_pr / (8.0 * PI * C_LIGHT * G * m_central * rho)
}

/// Number of removal sub-steps for a step of `dt` against `t_blow`.
pub fn blowout_substeps(dt: f64, t_blow: f64, ratio_max: f64) -> usize {
    if !(t_blow > 0.0) || !dt.is_finite() || dt <= 0.0 {
        return 1;
    }
    let ratio = dt / t_blow;
    if ratio > ratio_max {
        (dt / (ratio_max * t_blow)).ceil().max(1.0) as usize
    } else {
        1
    }
}

/// Fraction of a blow-out bin removed within dt: 1 - exp(-dt/t_blow).
pub fn fast_blowout_factor(dt: f64, t_blow: f64) -> f64 {
    if !(t_blow > 0.0) {
        return 1.0;
    }
    -(-dt / t_blow).exp_m1()
}

#[derive(Debug)]
pub struct RadiationModel {
    efficiency: Box<dyn RadiationEfficiency>,
    m_central: f64,
    planet_radius: f64,
    temperature: f64,
    substep_max_ratio: f64,
    enabled: bool,
}

impl RadiationModel {
    pub fn new(
        efficiency: Box<dyn RadiationEfficiency>,
        m_central: f64,
        planet_radius: f64,
        temperature: f64,
        substep_max_ratio: f64,
        enabled: bool,
    ) -> DustResult<Self> {
        let mut model = Self {
            efficiency,
            m_central,
            planet_radius,
            temperature,
            substep_max_ratio,
            enabled,
        };
        model.set_temperature(temperature)?;
        Ok(model)
    }

    pub fn from_config(
        radiation: &RadiationConfig,
        planet: &PlanetConfig,
        m_central: f64,
    ) -> DustResult<Self> {
        Self::new(
            Box::new(ConstantQpr(radiation.q_pr)),
            m_central,
            planet.radius,
            planet.temperature,
            radiation.substep_max_ratio,
            radiation.blowout_enabled,
        )
    }

    pub fn with_efficiency(mut self, efficiency: Box<dyn RadiationEfficiency>) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn substep_max_ratio(&self) -> f64 {
        self.substep_max_ratio
    }

    pub fn set_temperature(&mut self, temperature: f64) -> DustResult<()> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(DustError::ConfigError(format!(
                "planet temperature must be finite and > 0, got {temperature}"
            )));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn luminosity(&self) -> f64 {
        planet_luminosity(self.planet_radius, self.temperature)
    }

    pub fn beta(&self, s: f64, rho: f64) -> TableValue {
        let q = self.efficiency.q_pr(s, self.temperature);
        TableValue {
            value: beta(s, rho, self.luminosity(), self.m_central, q.value),
            in_range: q.in_range,
        }
    }

    /// Grain radius where β = 0.5; zero when no size reaches the threshold.
    ///
    /// `in_range` is false when β stays above 0.5 across the search bracket
    /// and the radius is clamped to its upper end.
    pub fn blowout_radius(&self, rho: f64) -> DustResult<TableValue> {
        if !self.enabled {
            return Ok(TableValue::exact(0.0));
        }
        if let Some(q) = self.efficiency.constant() {
            return Ok(TableValue::exact(blowout_radius_constant(
                rho,
                self.luminosity(),
                self.m_central,
                q,
            )));
        }

        let (lo, hi) = BLOWOUT_SEARCH_BOUNDS;
        let step = (hi / lo).ln() / (BLOWOUT_SCAN_SAMPLES - 1) as f64;
        let samples: Vec<f64> = (0..BLOWOUT_SCAN_SAMPLES)
            .map(|k| lo * (step * k as f64).exp())
            .collect();
        let residual = |s: f64| self.beta(s, rho).value - BETA_BLOWOUT;

        let mut above = None;
        for (k, &s) in samples.iter().enumerate().rev() {
            let r = residual(s);
            if !r.is_finite() {
                return Err(DustError::Numerical(format!(
                    "beta non-finite at s={s} during blow-out scan"
                )));
            }
            if r >= 0.0 {
                above = Some(k);
                break;
            }
        }
        match above {
            None => Ok(TableValue::exact(0.0)),
            Some(k) if k + 1 == samples.len() => Ok(TableValue {
                value: hi,
                in_range: false,
            }),
            Some(k) => {
                let root = bisect(residual, samples[k], samples[k + 1], BisectConfig::default())?;
                Ok(TableValue::exact(root))
            }
        }
    }

    /// Per-bin removal rate: Ω for bins with β ≥ 0.5, else zero.
    ///
    /// Also returns the number of bins whose Q_pr lookup was clamped.
    pub fn sink_rates(&self, psd: &PsdState, omega: f64) -> (Array1<f64>, usize) {
        let mut clamped = 0usize;
        let rates = if self.enabled {
            psd.sizes().mapv(|s| {
                let b = self.beta(s, psd.rho());
                if !b.in_range {
                    clamped += 1;
                }
                if b.value >= BETA_BLOWOUT {
                    omega
                } else {
                    0.0
                }
            })
        } else {
            Array1::zeros(psd.n_bins())
        };
        (rates, clamped)
    }
}
