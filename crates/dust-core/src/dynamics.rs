// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Dynamics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Keplerian orbit helpers feeding the collision kernel.
//!
//! Relative velocity follows the Ohtsuki et al. (2002) dispersion form
//!   v_rel = v_K · √(1.25 e² + i²)
//! and the vertical scale height is H = h_factor · i · r.

use dust_types::config::OrbitConfig;
use dust_types::constants::G;
use dust_types::error::{DustError, DustResult};

pub fn omega_kepler(r: f64, m_central: f64) -> f64 {
    (G * m_central / (r * r * r)).sqrt()
}

pub fn v_kepler(r: f64, m_central: f64) -> f64 {
    (G * m_central / r).sqrt()
}

pub fn v_rel_dispersion(e: f64, i: f64, v_k: f64) -> f64 {
    v_k * (1.25 * e * e + i * i).sqrt()
}

pub fn scale_height(i: f64, r: f64, h_factor: f64) -> f64 {
    h_factor * i * r
}

/// Orbital quantities of one cell, evaluated once from its configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalState {
    pub r: f64,
    pub omega: f64,
    pub v_k: f64,
    pub v_rel: f64,
    pub h: f64,
}

impl OrbitalState {
    pub fn from_config(orbit: &OrbitConfig) -> DustResult<Self> {
        let omega = omega_kepler(orbit.r, orbit.m_planet);
        let v_k = v_kepler(orbit.r, orbit.m_planet);
        let v_rel = v_rel_dispersion(orbit.e, orbit.i, v_k);
        let h = scale_height(orbit.i, orbit.r, orbit.h_factor);
        for (name, value) in [("omega", omega), ("v_k", v_k), ("v_rel", v_rel), ("H", h)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DustError::ConfigError(format!(
                    "orbital {name} must be finite and > 0, got {value}"
                )));
            }
        }
        Ok(Self {
            r: orbit.r,
            omega,
            v_k,
            v_rel,
            h,
        })
    }

    /// Orbital period 2π/Ω.
    pub fn period(&self) -> f64 {
        std::f64::consts::TAU / self.omega
    }
}
