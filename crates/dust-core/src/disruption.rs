// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Disruption
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Catastrophic-disruption threshold and largest-remnant fraction.
//!
//! Q*_D follows the Benz & Asphaug (1999) size law evaluated at each
//! reference velocity and linearly interpolated in impact speed
//! (Leinhardt & Stewart 2012). The largest remnant obeys
//!   f_LR = 1 - φ/2        (φ < 1)
//!   f_LR = φ^(-3/2) / 2   (φ ≥ 1),   φ = Q_R / Q*_D.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dust_math::interp::{bracket, TableValue};
use dust_types::config::{QStarConfig, QStarEntry};
use dust_types::error::{DustError, DustResult};

/// Remnant fraction above which a pair counts as cratering.
pub const CRATERING_F_LR: f64 = 0.5;

/// Velocity-dependent Q*_D coefficient table.
#[derive(Debug, Clone, PartialEq)]
pub struct QStarTable {
    v_ref_ms: Vec<f64>,
    entries: Vec<QStarEntry>,
}

impl QStarTable {
    pub fn from_entries(entries: &[QStarEntry]) -> DustResult<Self> {
        if entries.is_empty() {
            return Err(DustError::ConfigError(
                "Q* table needs at least one entry".to_string(),
            ));
        }
        let v_ref_ms: Vec<f64> = entries.iter().map(|e| e.v_ref_kms * 1e3).collect();
        for k in 1..v_ref_ms.len() {
            if !(v_ref_ms[k] > v_ref_ms[k - 1]) {
                return Err(DustError::ConfigError(format!(
                    "Q* reference velocities must increase strictly, got {} then {} km/s",
                    entries[k - 1].v_ref_kms,
                    entries[k].v_ref_kms
                )));
            }
        }
        Ok(Self {
            v_ref_ms,
            entries: entries.to_vec(),
        })
    }

    pub fn from_config(cfg: &QStarConfig) -> DustResult<Self> {
        Self::from_entries(&cfg.entries)
    }

    /// Tabulated impact-speed range (m/s).
    pub fn v_range(&self) -> (f64, f64) {
        (self.v_ref_ms[0], self.v_ref_ms[self.v_ref_ms.len() - 1])
    }

    /// Q*_D (J/kg) for body size `s` (m), bulk density `rho`, impact speed `v` (m/s).
    pub fn q_star(&self, s: f64, rho: f64, v: f64) -> DustResult<TableValue> {
        if !s.is_finite() || s <= 0.0 {
            return Err(DustError::Numerical(format!("Q* size must be > 0, got {s}")));
        }
        if !rho.is_finite() || rho <= 0.0 {
            return Err(DustError::Numerical(format!(
                "Q* density must be > 0, got {rho}"
            )));
        }
        if !v.is_finite() || v < 0.0 {
            return Err(DustError::Numerical(format!(
                "Q* velocity must be finite and >= 0, got {v}"
            )));
        }
        let eval = |e: &QStarEntry| e.qs * s.powf(-e.a_s) + e.b * rho * s.powf(e.b_g);
        if self.entries.len() == 1 {
            return Ok(TableValue::exact(eval(&self.entries[0])));
        }
        let (lo, t, in_range) = bracket(&self.v_ref_ms, v);
        let q_lo = eval(&self.entries[lo]);
        let q_hi = eval(&self.entries[lo + 1]);
        Ok(TableValue {
            value: q_lo * (1.0 - t) + q_hi * t,
            in_range,
        })
    }

    /// Bit-exact digest of the coefficients, used in cache keys.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for e in &self.entries {
            for x in [e.v_ref_kms, e.qs, e.a_s, e.b, e.b_g] {
                x.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

impl Default for QStarTable {
    fn default() -> Self {
        let cfg = QStarConfig::default();
        Self {
            v_ref_ms: cfg.entries.iter().map(|e| e.v_ref_kms * 1e3).collect(),
            entries: cfg.entries,
        }
    }
}

/// Specific impact energy Q_R = ½ μ v² / (m1 + m2).
pub fn specific_impact_energy(m1: f64, m2: f64, v: f64) -> f64 {
    let m_tot = m1 + m2;
    if m_tot <= 0.0 {
        return 0.0;
    }
    let mu = m1 * m2 / m_tot;
    0.5 * mu * v * v / m_tot
}

/// Piecewise largest-remnant mass fraction, in [0, 1].
pub fn largest_remnant_fraction(phi: f64) -> f64 {
    if phi.is_nan() {
        return 0.0;
    }
    let phi = phi.max(0.0);
    if phi < 1.0 {
        1.0 - 0.5 * phi
    } else {
        0.5 * phi.powf(-1.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionRegime {
    Cratering,
    Catastrophic,
}

impl CollisionRegime {
    pub fn from_remnant_fraction(f_lr: f64) -> Self {
        if f_lr > CRATERING_F_LR {
            CollisionRegime::Cratering
        } else {
            CollisionRegime::Catastrophic
        }
    }
}

/// Outcome of one bin pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOutcome {
    pub q_r: f64,
    pub q_star: f64,
    pub phi: f64,
    pub f_lr: f64,
    pub regime: CollisionRegime,
    /// Impact speed fell inside the Q* table range
    pub in_range: bool,
}

/// Classify a collision between masses `m1`, `m2`; Q* is evaluated at `s_ref`.
///
/// A non-positive threshold yields φ = ∞ and a catastrophic outcome.
pub fn classify_pair(
    m1: f64,
    m2: f64,
    s_ref: f64,
    rho: f64,
    v: f64,
    table: &QStarTable,
) -> DustResult<PairOutcome> {
    let q_r = specific_impact_energy(m1, m2, v);
    if !q_r.is_finite() {
        return Err(DustError::Numerical(format!(
            "specific impact energy non-finite for m1={m1}, m2={m2}, v={v}"
        )));
    }
    let q_star = table.q_star(s_ref, rho, v)?;
    let phi = if q_star.value > 0.0 {
        q_r / q_star.value
    } else {
        f64::INFINITY
    };
    let f_lr = largest_remnant_fraction(phi);
    Ok(PairOutcome {
        q_r,
        q_star: q_star.value,
        phi,
        f_lr,
        regime: CollisionRegime::from_remnant_fraction(f_lr),
        in_range: q_star.in_range,
    })
}
