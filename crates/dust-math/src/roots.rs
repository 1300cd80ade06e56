// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Roots
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Bracketed root finding with an explicit iteration cap.

use dust_types::error::{DustError, DustResult};

/// Bisection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BisectConfig {
    /// Stop once the bracket width falls below `rel_tol · |mid|`.
    pub rel_tol: f64,
    pub max_iter: usize,
}

impl Default for BisectConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1e-12,
            max_iter: 200,
        }
    }
}

/// Root of `f` in `[lo, hi]` where `f(lo)` and `f(hi)` differ in sign.
///
/// A non-finite residual aborts immediately; so does exhausting `max_iter`.
pub fn bisect<F>(mut f: F, mut lo: f64, mut hi: f64, cfg: BisectConfig) -> DustResult<f64>
where
    F: FnMut(f64) -> f64,
{
    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
        return Err(DustError::Numerical(format!(
            "bisect requires finite lo < hi, got [{lo}, {hi}]"
        )));
    }
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if !f_lo.is_finite() || !f_hi.is_finite() {
        return Err(DustError::Numerical(format!(
            "bisect residual non-finite at bracket: f({lo})={f_lo}, f({hi})={f_hi}"
        )));
    }
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(DustError::Numerical(format!(
            "bisect bracket [{lo}, {hi}] does not straddle a root"
        )));
    }

    for _ in 0..cfg.max_iter {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if !f_mid.is_finite() {
            return Err(DustError::Numerical(format!(
                "bisect residual non-finite at {mid}"
            )));
        }
        if f_mid == 0.0 {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        if hi - lo <= cfg.rel_tol * mid.abs() {
            return Ok(0.5 * (lo + hi));
        }
    }
    Err(DustError::Numerical(format!(
        "bisect did not converge in {} iterations, bracket [{lo}, {hi}]",
        cfg.max_iter
    )))
}
