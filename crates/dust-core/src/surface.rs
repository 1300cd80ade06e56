// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Surface Layer
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Single-variable surface-layer reduction of the dust disk.
//!
//! The layer surface density σ is advanced with one implicit Euler update
//! per sub-step:
//!   σ' = (σ + h·P) / (1 + h·(Ω + 1/t_coll + 1/t_sink)),
//! then clipped at Σ_τ=1. Blow-out acts on the dynamical time t_blow = 1/Ω.

use dust_types::error::{DustError, DustResult};
use serde::Serialize;
use tracing::debug;

use crate::radiation::blowout_substeps;

/// Optical depth below which the layer is treated as collisionless.
pub const TAU_MIN: f64 = 1e-12;

/// Wyatt collision time t_coll = 1/(2Ωτ); infinite for a transparent layer.
pub fn wyatt_collision_time(tau: f64, omega: f64) -> f64 {
    if !(tau > TAU_MIN) || !(omega > 0.0) {
        return f64::INFINITY;
    }
    1.0 / (2.0 * omega * tau)
}

/// Inputs of one surface-layer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInputs {
    /// Production rate of sub-blow-out material (kg m^-2 s^-1)
    pub production: f64,
    pub omega: f64,
    /// Collision time; `INFINITY` disables the term
    pub t_coll: f64,
    /// Extra sink time; `INFINITY` disables the term
    pub t_sink: f64,
    /// Face density at τ = 1; `INFINITY` disables clipping
    pub sigma_tau1: f64,
    /// Largest dt / t_blow handled without sub-stepping
    pub substep_max_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceStep {
    pub sigma: f64,
    /// Blow-out outflux σΩ at the end of the step (kg m^-2 s^-1)
    pub outflux: f64,
    /// Sink flux σ/t_sink at the end of the step
    pub sink_flux: f64,
    /// Mass removed by blow-out over the step (kg m^-2)
    pub blowout_loss: f64,
    pub sink_loss: f64,
    pub collision_loss: f64,
    pub substeps: usize,
}

fn inverse_time(t: f64) -> f64 {
    if t.is_finite() && t > 0.0 {
        1.0 / t
    } else {
        0.0
    }
}

/// Advance σ by `dt`.
pub fn step_surface_density(sigma: f64, dt: f64, inputs: &SurfaceInputs) -> DustResult<SurfaceStep> {
    if !dt.is_finite() || dt <= 0.0 || !(inputs.omega > 0.0) || !inputs.omega.is_finite() {
        return Err(DustError::Numerical(format!(
            "surface step requires finite dt > 0 and omega > 0, got dt={dt}, omega={}",
            inputs.omega
        )));
    }
    if !sigma.is_finite() || sigma < 0.0 || !inputs.production.is_finite() || inputs.production < 0.0 {
        return Err(DustError::Numerical(format!(
            "surface density and production must be finite and >= 0, got {sigma}, {}",
            inputs.production
        )));
    }

    let t_blow = 1.0 / inputs.omega;
    let substeps = blowout_substeps(dt, t_blow, inputs.substep_max_ratio);
    let h = dt / substeps as f64;
    let r_coll = inverse_time(inputs.t_coll);
    let r_sink = inverse_time(inputs.t_sink);
    let loss = inputs.omega + r_coll + r_sink;

    let mut out = SurfaceStep {
        sigma,
        outflux: 0.0,
        sink_flux: 0.0,
        blowout_loss: 0.0,
        sink_loss: 0.0,
        collision_loss: 0.0,
        substeps,
    };
    for _ in 0..substeps {
        let next = (out.sigma + h * inputs.production) / (1.0 + h * loss);
        out.blowout_loss += h * inputs.omega * next;
        out.sink_loss += h * r_sink * next;
        out.collision_loss += h * r_coll * next;
        out.sigma = next.min(inputs.sigma_tau1);
    }
    out.outflux = out.sigma * inputs.omega;
    out.sink_flux = out.sigma * r_sink;
    debug!(
        dt,
        sigma = out.sigma,
        outflux = out.outflux,
        substeps,
        "surface: step"
    );
    Ok(out)
}
