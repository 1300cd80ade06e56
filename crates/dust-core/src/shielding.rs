// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Optical-Depth Gate
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Self-shielding and the τ = 1 supply gate.
//!
//!   κ_eff = Φ(τ_bare) · κ,   τ = κ_eff · Σ,   Σ_τ=1 = 1 / κ_eff
//!
//! Headroom Σ_τ=1 - Σ bounds how much supply the layer may take. A
//! non-positive or non-finite κ_eff leaves no headroom at all.

use std::fmt::Debug;

use dust_math::interp::{Table1D, TableValue};
use dust_types::config::{HeadroomPolicy, PhiTableConfig, ShieldingConfig};
use dust_types::error::{DustError, DustResult};
use dust_types::state::PsdState;

/// Effective-opacity multiplier Φ(τ).
pub trait ShieldingLaw: Debug + Send + Sync {
    fn phi(&self, tau: f64) -> TableValue;
}

/// Φ = 1: the layer is fully exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShielding;

impl ShieldingLaw for NoShielding {
    fn phi(&self, _tau: f64) -> TableValue {
        TableValue::exact(1.0)
    }
}

/// Tabulated Φ(τ), linear in τ and clamped at the table ends.
#[derive(Debug, Clone, PartialEq)]
pub struct PhiTable {
    table: Table1D,
}

impl PhiTable {
    pub fn new(tau: Vec<f64>, phi: Vec<f64>) -> DustResult<Self> {
        Ok(Self {
            table: Table1D::new(tau, phi)?,
        })
    }

    pub fn from_config(cfg: &PhiTableConfig) -> DustResult<Self> {
        Self::new(cfg.tau.clone(), cfg.phi.clone())
    }
}

impl ShieldingLaw for PhiTable {
    fn phi(&self, tau: f64) -> TableValue {
        self.table.eval(tau)
    }
}

pub fn shielding_from_config(cfg: &ShieldingConfig) -> DustResult<Box<dyn ShieldingLaw>> {
    Ok(match &cfg.phi_table {
        Some(table) => Box::new(PhiTable::from_config(table)?),
        None => Box::new(NoShielding),
    })
}

/// Optical state of the layer for one step.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OpticalDepthState {
    pub kappa_bare: f64,
    pub phi: f64,
    pub kappa_eff: f64,
    pub sigma: f64,
    pub tau: f64,
    /// Face density at τ = 1; infinite when κ_eff is unusable
    pub sigma_tau1: f64,
    pub headroom: f64,
    pub phi_in_range: bool,
}

/// Opacity state for surface density `sigma` and bare opacity `kappa_bare`.
pub fn optical_depth(sigma: f64, kappa_bare: f64, law: &dyn ShieldingLaw) -> OpticalDepthState {
    let tau_bare = kappa_bare * sigma;
    let lookup = law.phi(tau_bare);
    let phi = if lookup.value.is_finite() {
        lookup.value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let kappa_eff = phi * kappa_bare;
    let usable = kappa_eff.is_finite() && kappa_eff > 0.0;
    let sigma_tau1 = if usable { 1.0 / kappa_eff } else { f64::INFINITY };
    let headroom = if usable {
        (sigma_tau1 - sigma).max(0.0)
    } else {
        0.0
    };
    OpticalDepthState {
        kappa_bare,
        phi,
        kappa_eff,
        sigma,
        tau: if kappa_eff.is_finite() { kappa_eff * sigma } else { 0.0 },
        sigma_tau1,
        headroom,
        phi_in_range: lookup.in_range,
    }
}

/// How much of the requested supply this step admits.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GateDecision {
    pub requested_rate: f64,
    pub admitted_rate: f64,
    /// Rejected by the clip policy; never counted as a loss
    pub clipped_rate: f64,
}

#[derive(Debug)]
pub struct OpticalDepthGate {
    policy: HeadroomPolicy,
    law: Box<dyn ShieldingLaw>,
}

impl OpticalDepthGate {
    pub fn new(policy: HeadroomPolicy, law: Box<dyn ShieldingLaw>) -> Self {
        Self { policy, law }
    }

    pub fn from_config(cfg: &ShieldingConfig) -> DustResult<Self> {
        Ok(Self::new(cfg.policy, shielding_from_config(cfg)?))
    }

    pub fn policy(&self) -> HeadroomPolicy {
        self.policy
    }

    /// Optical state of `psd`. An empty layer borrows `kappa_seed`, the
    /// opacity of the material about to be injected.
    pub fn evaluate(&self, psd: &PsdState, kappa_seed: Option<f64>) -> OpticalDepthState {
        let sigma = psd.sigma();
        let kappa = if sigma > 0.0 {
            psd.kappa()
        } else {
            kappa_seed.unwrap_or(0.0)
        };
        optical_depth(sigma, kappa, self.law.as_ref())
    }

    pub fn admit(
        &self,
        state: &OpticalDepthState,
        requested_rate: f64,
        dt: f64,
    ) -> DustResult<GateDecision> {
        if !requested_rate.is_finite() || requested_rate < 0.0 {
            return Err(DustError::Numerical(format!(
                "supply rate must be finite and >= 0, got {requested_rate}"
            )));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(DustError::Numerical(format!(
                "gate requires finite dt > 0, got {dt}"
            )));
        }
        let admitted_rate = match self.policy {
            HeadroomPolicy::Clip => requested_rate.min(state.headroom / dt),
            HeadroomPolicy::Spill => requested_rate,
        };
        Ok(GateDecision {
            requested_rate,
            admitted_rate,
            clipped_rate: requested_rate - admitted_rate,
        })
    }

    /// Spill policy: scale the layer back to `sigma_tau1`, returning the
    /// removed surface density. No-op under the clip policy.
    pub fn spill(&self, psd: &mut PsdState, sigma_tau1: f64) -> f64 {
        if self.policy != HeadroomPolicy::Spill || !sigma_tau1.is_finite() {
            return 0.0;
        }
        let sigma = psd.sigma();
        if sigma <= sigma_tau1 || sigma <= 0.0 {
            return 0.0;
        }
        psd.scale(sigma_tau1 / sigma);
        sigma - psd.sigma()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dust_types::state::SizeGrid;

    fn layer(sigma: f64) -> PsdState {
        let grid = SizeGrid::log_spaced(1e-6, 1e-3, 12).expect("grid");
        PsdState::power_law(grid, 3000.0, 3.5, sigma).expect("psd")
    }

    #[test]
    fn test_unshielded_threshold_is_inverse_opacity() {
        let state = optical_depth(0.1, 2.0, &NoShielding);
        assert_eq!(state.kappa_eff, 2.0);
        assert!((state.tau - 0.2).abs() < 1e-15);
        assert!((state.sigma_tau1 - 0.5).abs() < 1e-15);
        assert!((state.headroom - 0.4).abs() < 1e-15);
    }

    #[test]
    fn test_phi_table_scales_opacity() {
        let law = PhiTable::new(vec![0.0, 1.0, 10.0], vec![1.0, 0.5, 0.1]).expect("phi");
        let state = optical_depth(0.5, 2.0, &law);
        assert!((state.phi - 0.5).abs() < 1e-12);
        assert!((state.kappa_eff - 1.0).abs() < 1e-12);
        assert!((state.sigma_tau1 - 1.0).abs() < 1e-12);
        assert!(state.phi_in_range);
        let beyond = optical_depth(100.0, 2.0, &law);
        assert!(!beyond.phi_in_range);
    }

    #[test]
    fn test_unusable_opacity_exhausts_headroom() {
        for kappa in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let state = optical_depth(0.1, kappa, &NoShielding);
            assert_eq!(state.headroom, 0.0, "kappa = {kappa}");
        }
        let law = PhiTable::new(vec![0.0, 1.0], vec![0.0, 0.0]).expect("phi");
        assert_eq!(optical_depth(0.1, 3.0, &law).headroom, 0.0);
    }

    #[test]
    fn test_clip_admits_full_rate_with_ample_headroom() {
        let gate = OpticalDepthGate::new(HeadroomPolicy::Clip, Box::new(NoShielding));
        let psd = layer(1e-6);
        let state = gate.evaluate(&psd, None);
        let decision = gate.admit(&state, 1e-10, 10.0).expect("admit");
        assert_eq!(decision.admitted_rate, 1e-10);
        assert_eq!(decision.clipped_rate, 0.0);
    }

    #[test]
    fn test_clip_limits_to_headroom() {
        let gate = OpticalDepthGate::new(HeadroomPolicy::Clip, Box::new(NoShielding));
        let psd = layer(1e-6);
        let state = gate.evaluate(&psd, None);
        let dt = 1e4;
        let huge = 10.0 * state.headroom / dt;
        let decision = gate.admit(&state, huge, dt).expect("admit");
        assert!((decision.admitted_rate * dt - state.headroom).abs() <= 1e-12 * state.headroom);
        assert!(decision.clipped_rate > 0.0);
    }

    #[test]
    fn test_spill_admits_everything_then_trims() {
        let gate = OpticalDepthGate::new(HeadroomPolicy::Spill, Box::new(NoShielding));
        let mut psd = layer(1e-6);
        let state = gate.evaluate(&psd, None);
        let decision = gate.admit(&state, 1.0, 1.0).expect("admit");
        assert_eq!(decision.admitted_rate, 1.0);
        psd.scale(2.0 * state.sigma_tau1 / psd.sigma());
        let before = psd.sigma();
        let removed = gate.spill(&mut psd, state.sigma_tau1);
        assert!((psd.sigma() - state.sigma_tau1).abs() / state.sigma_tau1 < 1e-12);
        assert!((removed - (before - psd.sigma())).abs() < 1e-15 * before);
    }

    #[test]
    fn test_empty_layer_uses_seed_opacity() {
        let gate = OpticalDepthGate::new(HeadroomPolicy::Clip, Box::new(NoShielding));
        let psd = layer(0.0);
        assert_eq!(gate.evaluate(&psd, None).headroom, 0.0);
        let seeded = gate.evaluate(&psd, Some(100.0));
        assert!((seeded.headroom - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_admit_rejects_bad_inputs() {
        let gate = OpticalDepthGate::new(HeadroomPolicy::Clip, Box::new(NoShielding));
        let state = optical_depth(0.1, 1.0, &NoShielding);
        assert!(gate.admit(&state, f64::NAN, 1.0).is_err());
        assert!(gate.admit(&state, 1.0, 0.0).is_err());
    }
}
