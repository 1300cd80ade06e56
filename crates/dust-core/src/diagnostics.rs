// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Diagnostics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-step mass ledger, energy bookkeeping and the step record handed
//! to output collaborators.

use dust_types::constants::TINY;
use dust_types::error::{DustError, DustResult};
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::fragments::FragmentTensor;
use crate::integrator::StepStatus;
use crate::kernel::RelativeVelocity;
use crate::shielding::OpticalDepthState;

/// Cumulative mass channels per unit area (kg/m^2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MassLedger {
    pub initial: f64,
    pub supplied: f64,
    pub blowout: f64,
    pub sublimation: f64,
    pub sink: f64,
    pub spill: f64,
    /// Supply refused by the clip gate; never entered the layer.
    pub clipped: f64,
}

impl MassLedger {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn total_lost(&self) -> f64 {
        self.blowout + self.sublimation + self.sink + self.spill
    }

    /// Relative closure error of `initial + supplied = current + lost`.
    pub fn budget_error(&self, current: f64) -> f64 {
        let expected = self.initial + self.supplied;
        (current + self.total_lost() - expected).abs() / expected.abs().max(TINY)
    }
}

/// Collision energy budget for one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyStats {
    /// Relative kinetic energy brought into collisions (J m^-2 s^-1)
    pub e_rel_rate: f64,
    pub e_retained_rate: f64,
    pub e_dissipated_rate: f64,
    pub cratering_rate: f64,
    pub fragmentation_rate: f64,
    pub cratering_fraction: f64,
    pub fragmentation_fraction: f64,
    /// Collision-rate weighted mean largest-remnant fraction
    pub mean_f_lr: f64,
    /// Energy-weighted retained fraction E_retained / E_rel
    pub f_ke_effective: f64,
}

/// Energy bookkeeping over pairs i ≤ j of the collision-rate matrix.
pub fn compute_energy_bookkeeping(
    rates: &Array2<f64>,
    masses: &Array1<f64>,
    v_rel: &RelativeVelocity,
    tensor: &FragmentTensor,
    f_ke_cratering: f64,
    f_ke_fragmentation: f64,
) -> DustResult<EnergyStats> {
    let n = masses.len();
    if rates.dim() != (n, n) || tensor.n_bins() != n {
        return Err(DustError::Numerical(format!(
            "energy bookkeeping shape mismatch: rates {:?}, tensor {}, masses {n}",
            rates.dim(),
            tensor.n_bins()
        )));
    }
    for (name, f) in [("f_ke_cratering", f_ke_cratering), ("f_ke_fragmentation", f_ke_fragmentation)] {
        if !(0.0..=1.0).contains(&f) {
            return Err(DustError::ConfigError(format!("{name} must lie in [0, 1], got {f}")));
        }
    }

    let f_lr = tensor.remnant_fraction();
    let mut stats = EnergyStats::default();
    let mut f_lr_weighted = 0.0;
    for i in 0..n {
        for j in i..n {
            let rate = rates[[i, j]];
            if rate <= 0.0 {
                continue;
            }
            let v = v_rel.at(i, j);
            let mu = masses[i] * masses[j] / (masses[i] + masses[j]);
            let e_rel = 0.5 * mu * v * v * rate;
            let f_ke = if tensor.is_cratering(i, j) {
                stats.cratering_rate += rate;
                f_ke_cratering
            } else {
                stats.fragmentation_rate += rate;
                f_ke_fragmentation
            };
            stats.e_rel_rate += e_rel;
            stats.e_retained_rate += f_ke * e_rel;
            f_lr_weighted += f_lr[[i, j]] * rate;
        }
    }
    if !stats.e_rel_rate.is_finite() {
        return Err(DustError::Numerical("collision energy rate is non-finite".into()));
    }
    stats.e_dissipated_rate = stats.e_rel_rate - stats.e_retained_rate;
    let total_rate = stats.cratering_rate + stats.fragmentation_rate;
    if total_rate > 0.0 {
        stats.cratering_fraction = stats.cratering_rate / total_rate;
        stats.fragmentation_fraction = stats.fragmentation_rate / total_rate;
        stats.mean_f_lr = f_lr_weighted / total_rate;
    }
    if stats.e_rel_rate > 0.0 {
        stats.f_ke_effective = stats.e_retained_rate / stats.e_rel_rate;
    }
    Ok(stats)
}

/// Plain-data outputs of one committed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: u64,
    pub time: f64,
    pub dt: f64,
    pub status: StepStatus,
    pub number: Array1<f64>,
    pub sigma: f64,
    /// Optical state that gated this step's supply
    pub optical_depth: OpticalDepthState,
    pub optical_depth_end: OpticalDepthState,
    pub a_blow: f64,
    pub s_min_eff: f64,
    pub supply_requested: f64,
    pub supply_admitted: f64,
    pub supply_clipped: f64,
    pub blowout_loss: f64,
    pub sublimation_loss: f64,
    pub sink_loss: f64,
    pub spill_loss: f64,
    pub mass_error: f64,
    pub substeps: usize,
    pub attempts: usize,
    pub t_coll_min: f64,
    pub fast_blowout_factor: f64,
    pub sanitized_bins: usize,
    pub energy: Option<EnergyStats>,
    pub ledger: MassLedger,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruption::QStarTable;
    use crate::kernel::CollisionKernel;
    use dust_types::state::{PsdState, SizeGrid};

    fn setup(v: f64) -> (PsdState, RelativeVelocity, FragmentTensor, Array2<f64>) {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, 12).expect("grid");
        let psd = PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd");
        let v_rel = RelativeVelocity::Scalar(v);
        let tensor = FragmentTensor::build(&psd, &v_rel, 3.5, &QStarTable::default()).expect("tensor");
        let heights = Array1::from_elem(12, 1e4);
        let rates = CollisionKernel::new(psd.sizes(), &heights, &v_rel)
            .expect("kernel")
            .rates(&psd.number)
            .expect("rates");
        (psd, v_rel, tensor, rates)
    }

    #[test]
    fn test_ledger_budget() {
        let mut ledger = MassLedger::new(1.0);
        ledger.supplied = 0.5;
        ledger.blowout = 0.3;
        ledger.sink = 0.1;
        assert!((ledger.total_lost() - 0.4).abs() < 1e-15);
        assert!(ledger.budget_error(1.1) < 1e-15);
        assert!((ledger.budget_error(1.0) - 0.1 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_energy_split_is_consistent() {
        let (psd, v_rel, tensor, rates) = setup(4000.0);
        let stats = compute_energy_bookkeeping(&rates, psd.masses(), &v_rel, &tensor, 0.1, 0.0)
            .expect("energy");
        assert!(stats.e_rel_rate > 0.0);
        let closure = stats.e_retained_rate + stats.e_dissipated_rate - stats.e_rel_rate;
        assert!(closure.abs() <= 1e-12 * stats.e_rel_rate);
        assert!((stats.cratering_fraction + stats.fragmentation_fraction - 1.0).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&stats.mean_f_lr));
        assert!((0.0..=0.1).contains(&stats.f_ke_effective));
    }

    #[test]
    fn test_uniform_f_ke_is_recovered() {
        let (psd, v_rel, tensor, rates) = setup(4000.0);
        let stats = compute_energy_bookkeeping(&rates, psd.masses(), &v_rel, &tensor, 0.3, 0.3)
            .expect("energy");
        assert!((stats.f_ke_effective - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let (psd, v_rel, tensor, rates) = setup(4000.0);
        let err = compute_energy_bookkeeping(&rates, psd.masses(), &v_rel, &tensor, 1.5, 0.0);
        assert!(matches!(err, Err(DustError::ConfigError(_))));
    }
}
