// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — IMEX Integrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Mass-conserving semi-implicit (IMEX) backward-Euler step.
//!
//! Each sub-step of length h first applies all losses implicitly,
//!   N*_i = (N_i + h·S_i) / (1 + h·(λ_i + B_i + K_i)),
//! with collision loss λ, blow-out rate B and extra sink K. The mass each
//! bin actually lost to collisions, h·m_i·N*_i·K_ij·N_j, is then handed to
//! the fragment tensor and re-deposited. Gains therefore match realized
//! losses exactly, N stays non-negative, and the mass budget closes to
//! round-off. The budget is still checked; a failed check rejects the
//! attempt and retries with twice the sub-steps, up to `max_retries` and
//! never beyond `max_substeps`.

use dust_types::config::{GainBackend, IntegratorConfig};
use dust_types::constants::TINY;
use dust_types::error::{DustError, DustResult};
use dust_types::warnings::{WarningKind, WarningLog};
use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::{debug, warn};

use crate::fragments::FragmentTensor;
use crate::gain::redistribute;
use crate::kernel::{min_collision_time, CollisionKernel};

/// Lifecycle of one integrator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Pending,
    Committed,
    Rejected,
}

impl StepStatus {
    /// Resolve a pending attempt by its mass-budget check.
    pub fn resolve(self, budget_ok: bool) -> StepStatus {
        match self {
            StepStatus::Pending if budget_ok => StepStatus::Committed,
            StepStatus::Pending => StepStatus::Rejected,
            done => done,
        }
    }
}

/// Collision operator: geometric kernel plus fragment redistribution.
#[derive(Debug, Clone, Copy)]
pub struct CollisionTerms<'a> {
    pub kernel: &'a CollisionKernel,
    pub tensor: &'a FragmentTensor,
}

/// Everything one step consumes besides the state itself.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub collisions: Option<CollisionTerms<'a>>,
    /// Number source (m^-2 s^-1)
    pub source: &'a Array1<f64>,
    /// Blow-out removal rate per bin (1/s)
    pub blowout_rates: &'a Array1<f64>,
    /// Extra sink rate per bin (1/s)
    pub sink_rates: &'a Array1<f64>,
    /// Lower bound on the sub-step count (blow-out resolution)
    pub min_substeps: usize,
}

/// Result of a committed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub number: Array1<f64>,
    pub status: StepStatus,
    pub mass_before: f64,
    pub mass_after: f64,
    pub supplied_mass: f64,
    pub blowout_loss: f64,
    pub sink_loss: f64,
    pub mass_error: f64,
    pub substeps: usize,
    pub attempts: usize,
    pub t_coll_min: f64,
}

/// Mass booked over the sub-steps of one attempt.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    supplied: f64,
    blowout: f64,
    sink: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImexIntegrator {
    pub safety: f64,
    pub mass_tol: f64,
    pub max_substeps: usize,
    pub max_retries: usize,
    pub backend: GainBackend,
}

impl Default for ImexIntegrator {
    fn default() -> Self {
        Self::from_config(&IntegratorConfig::default())
    }
}

fn check_rate_vector(name: &str, v: &Array1<f64>, n: usize) -> DustResult<()> {
    if v.len() != n {
        return Err(DustError::Numerical(format!(
            "{name} length {} does not match {n} bins",
            v.len()
        )));
    }
    if let Some((k, bad)) = v.iter().enumerate().find(|(_, x)| !x.is_finite() || **x < 0.0) {
        return Err(DustError::Numerical(format!(
            "{name}[{k}] must be finite and >= 0, got {bad}"
        )));
    }
    Ok(())
}

impl ImexIntegrator {
    pub fn from_config(cfg: &IntegratorConfig) -> Self {
        Self {
            safety: cfg.safety,
            mass_tol: cfg.mass_tol,
            max_substeps: cfg.max_substeps.max(1),
            max_retries: cfg.max_retries,
            backend: cfg.backend,
        }
    }

    /// Initial sub-step count: enough to resolve the fastest collision
    /// time with the safety factor, never fewer than `min_substeps`.
    pub fn initial_substeps(&self, dt: f64, t_coll_min: f64, min_substeps: usize) -> usize {
        let collisional = if t_coll_min.is_finite() && t_coll_min > 0.0 {
            let ratio = dt / (self.safety * t_coll_min);
            if ratio.is_finite() {
                ratio.ceil().max(1.0).min(self.max_substeps as f64) as usize
            } else {
                self.max_substeps
            }
        } else {
            1
        };
        collisional.max(min_substeps).clamp(1, self.max_substeps)
    }

    fn substep(
        &self,
        masses: &Array1<f64>,
        number: &Array1<f64>,
        h: f64,
        inputs: &StepInputs<'_>,
        tally: &mut Tally,
    ) -> DustResult<Array1<f64>> {
        let n = number.len();
        let lambda = match inputs.collisions {
            Some(terms) => terms.kernel.loss_rates(number),
            None => Array1::zeros(n),
        };

        let mut star = Array1::<f64>::zeros(n);
        for i in 0..n {
            let denom = 1.0 + h * (lambda[i] + inputs.blowout_rates[i] + inputs.sink_rates[i]);
            star[i] = (number[i] + h * inputs.source[i]) / denom;
            tally.supplied += h * masses[i] * inputs.source[i];
            tally.blowout += h * masses[i] * inputs.blowout_rates[i] * star[i];
            tally.sink += h * masses[i] * inputs.sink_rates[i] * star[i];
        }

        let Some(terms) = inputs.collisions else {
            return Ok(star);
        };

        let k = terms.kernel.coefficients();
        let mut pair_mass = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                pair_mass[[i, j]] = if i == j {
                    h * k[[i, i]] * masses[i] * star[i] * number[i]
                } else {
                    h * k[[i, j]] * (masses[i] * star[i] * number[j] + masses[j] * star[j] * number[i])
                };
            }
        }
        let gain = redistribute(self.backend, &pair_mass, terms.tensor, masses)?;
        Ok(star + gain)
    }

    fn run_attempt(
        &self,
        masses: &Array1<f64>,
        number: &Array1<f64>,
        dt: f64,
        n_sub: usize,
        inputs: &StepInputs<'_>,
    ) -> DustResult<(Array1<f64>, Tally)> {
        let h = dt / n_sub as f64;
        let mut tally = Tally::default();
        let mut current = number.clone();
        for _ in 0..n_sub {
            current = self.substep(masses, &current, h, inputs, &mut tally)?;
            if current.iter().any(|v| !v.is_finite()) {
                break;
            }
        }
        Ok((current, tally))
    }

    /// Advance `number` by `dt`. Invalid inputs fail at once with
    /// `Numerical`; repeated budget failures end in `RetryCapExceeded`.
    pub fn step(
        &self,
        masses: &Array1<f64>,
        number: &Array1<f64>,
        dt: f64,
        inputs: &StepInputs<'_>,
        log: &mut WarningLog,
    ) -> DustResult<StepReport> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(DustError::Numerical(format!(
                "integrator requires finite dt > 0, got {dt}"
            )));
        }
        let n = number.len();
        check_rate_vector("number density", number, n)?;
        check_rate_vector("masses", masses, n)?;
        check_rate_vector("supply source", inputs.source, n)?;
        check_rate_vector("blow-out rate", inputs.blowout_rates, n)?;
        check_rate_vector("sink rate", inputs.sink_rates, n)?;
        if let Some(terms) = inputs.collisions {
            if terms.kernel.n_bins() != n || terms.tensor.n_bins() != n {
                return Err(DustError::Numerical(format!(
                    "collision operator has {} bins, state has {n}",
                    terms.kernel.n_bins()
                )));
            }
        }

        let t_coll_min = match inputs.collisions {
            Some(terms) => min_collision_time(&terms.kernel.loss_rates(number)),
            None => f64::INFINITY,
        };
        let mass_before = masses.dot(number);
        let mut n_sub = self.initial_substeps(dt, t_coll_min, inputs.min_substeps);
        let mut last_error = String::new();

        let mut attempts = 0;

        for attempt in 1..=self.max_retries + 1 {
            attempts = attempt;
            let status = StepStatus::Pending;
            let (next, tally) = self.run_attempt(masses, number, dt, n_sub, inputs)?;
            let mass_after = masses.dot(&next);
            let expected = mass_before + tally.supplied;
            let mass_error = (mass_after + tally.blowout + tally.sink - expected).abs()
                / expected.abs().max(TINY);
            let finite = mass_error.is_finite() && next.iter().all(|v| v.is_finite());
            let status = status.resolve(finite && mass_error <= self.mass_tol);

            if status == StepStatus::Committed {
                debug!(
                    substeps = n_sub,
                    attempt,
                    mass_error,
                    t_coll_min,
                    "integrator: step committed"
                );
                return Ok(StepReport {
                    number: next,
                    status,
                    mass_before,
                    mass_after,
                    supplied_mass: tally.supplied,
                    blowout_loss: tally.blowout,
                    sink_loss: tally.sink,
                    mass_error,
                    substeps: n_sub,
                    attempts: attempt,
                    t_coll_min,
                });
            }

            last_error = format!("mass budget error {mass_error:e} with {n_sub} sub-steps");
            warn!(attempt, substeps = n_sub, mass_error, "integrator: step rejected");
            log.record(WarningKind::StepRejected, &format!("integrator: {last_error}"));
            // An attempt at the sub-step cap is deterministic; repeating it cannot pass.
            if n_sub >= self.max_substeps {
                break;
            }
            n_sub = n_sub.saturating_mul(2).min(self.max_substeps);
        }

        Err(DustError::RetryCapExceeded {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruption::QStarTable;
    use crate::kernel::RelativeVelocity;
    use dust_types::state::{PsdState, SizeGrid};

    struct Fixture {
        psd: PsdState,
        kernel: CollisionKernel,
        tensor: FragmentTensor,
        zeros: Array1<f64>,
    }

    fn fixture(n: usize, v: f64, sigma: f64) -> Fixture {
        let grid = SizeGrid::log_spaced(1e-6, 1e-2, n).expect("grid");
        let psd = PsdState::power_law(grid, 3000.0, 3.5, sigma).expect("psd");
        let v_rel = RelativeVelocity::Scalar(v);
        let heights = Array1::from_elem(n, 1e4);
        let kernel = CollisionKernel::new(psd.sizes(), &heights, &v_rel).expect("kernel");
        let tensor = FragmentTensor::build(&psd, &v_rel, 3.5, &QStarTable::default()).expect("tensor");
        Fixture {
            psd,
            kernel,
            tensor,
            zeros: Array1::zeros(n),
        }
    }

    #[test]
    fn test_status_transitions() {
        assert_eq!(StepStatus::Pending.resolve(true), StepStatus::Committed);
        assert_eq!(StepStatus::Pending.resolve(false), StepStatus::Rejected);
        assert_eq!(StepStatus::Committed.resolve(false), StepStatus::Committed);
    }

    #[test]
    fn test_collisions_conserve_mass() {
        let f = fixture(20, 4000.0, 10.0);
        let inputs = StepInputs {
            collisions: Some(CollisionTerms {
                kernel: &f.kernel,
                tensor: &f.tensor,
            }),
            source: &f.zeros,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let mut log = WarningLog::new();
        let report = ImexIntegrator::default()
            .step(f.psd.masses(), &f.psd.number, 1e6, &inputs, &mut log)
            .expect("step");
        assert_eq!(report.status, StepStatus::Committed);
        let rel = (report.mass_after - report.mass_before).abs() / report.mass_before;
        assert!(rel < 1e-9, "relative mass drift {rel}");
        assert!(report.number.iter().all(|&v| v >= 0.0 && v.is_finite()));
        assert_ne!(report.number, f.psd.number, "collisions should reshape the PSD");
        assert_eq!(log.total(), 0);
    }

    #[test]
    fn test_parallel_backend_matches_serial() {
        let f = fixture(16, 4500.0, 5.0);
        let inputs = StepInputs {
            collisions: Some(CollisionTerms {
                kernel: &f.kernel,
                tensor: &f.tensor,
            }),
            source: &f.zeros,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let mut log = WarningLog::new();
        let serial = ImexIntegrator::default();
        let parallel = ImexIntegrator {
            backend: GainBackend::Parallel,
            ..serial
        };
        let a = serial
            .step(f.psd.masses(), &f.psd.number, 1e5, &inputs, &mut log)
            .expect("serial");
        let b = parallel
            .step(f.psd.masses(), &f.psd.number, 1e5, &inputs, &mut log)
            .expect("parallel");
        assert_eq!(a.number, b.number);
    }

    #[test]
    fn test_blowout_loss_is_reported_exactly() {
        let f = fixture(10, 4000.0, 1e-3);
        let mut blow = Array1::zeros(10);
        blow[0] = 1e-3;
        blow[1] = 1e-3;
        let inputs = StepInputs {
            collisions: None,
            source: &f.zeros,
            blowout_rates: &blow,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let mut log = WarningLog::new();
        let report = ImexIntegrator::default()
            .step(f.psd.masses(), &f.psd.number, 100.0, &inputs, &mut log)
            .expect("step");
        let removed = report.mass_before - report.mass_after;
        assert!(removed > 0.0);
        assert!((removed - report.blowout_loss).abs() / removed < 1e-9);
        // implicit decay of one bin: N / (1 + dt·rate)
        let expected = f.psd.number[0] / (1.0 + 100.0 * 1e-3);
        assert!((report.number[0] - expected).abs() / expected < 1e-14);
    }

    #[test]
    fn test_min_substeps_are_honoured() {
        let f = fixture(6, 4000.0, 1e-3);
        let inputs = StepInputs {
            collisions: None,
            source: &f.zeros,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 7,
        };
        let mut log = WarningLog::new();
        let report = ImexIntegrator::default()
            .step(f.psd.masses(), &f.psd.number, 1.0, &inputs, &mut log)
            .expect("step");
        assert_eq!(report.substeps, 7);
    }

    #[test]
    fn test_supply_enters_budget() {
        let f = fixture(8, 4000.0, 1e-3);
        let mut source = Array1::zeros(8);
        source[2] = 1e-10 / f.psd.masses()[2];
        let inputs = StepInputs {
            collisions: None,
            source: &source,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let mut log = WarningLog::new();
        let report = ImexIntegrator::default()
            .step(f.psd.masses(), &f.psd.number, 50.0, &inputs, &mut log)
            .expect("step");
        assert!((report.supplied_mass - 5e-9).abs() / 5e-9 < 1e-12);
        assert!((report.mass_after - report.mass_before - 5e-9).abs() < 1e-15);
    }

    #[test]
    fn test_non_finite_budget_hits_retry_cap() {
        let f = fixture(6, 4000.0, 1e-3);
        let mut source = Array1::zeros(6);
        source[0] = f64::MAX;
        let inputs = StepInputs {
            collisions: None,
            source: &source,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let integrator = ImexIntegrator {
            max_retries: 3,
            ..ImexIntegrator::default()
        };
        let mut log = WarningLog::new();
        let err = integrator
            .step(f.psd.masses(), &f.psd.number, 1e10, &inputs, &mut log)
            .expect_err("overflow must not loop forever");
        match err {
            DustError::RetryCapExceeded { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("Unexpected error variant: {other:?}"),
        }
        assert_eq!(log.count(WarningKind::StepRejected), 4);
    }

    #[test]
    fn test_retries_never_exceed_substep_cap() {
        let f = fixture(6, 4000.0, 1e-3);
        let mut source = Array1::zeros(6);
        source[0] = f64::MAX;
        let inputs = StepInputs {
            collisions: None,
            source: &source,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let integrator = ImexIntegrator {
            max_substeps: 2,
            max_retries: 4,
            ..ImexIntegrator::default()
        };
        let mut log = WarningLog::new();
        let err = integrator
            .step(f.psd.masses(), &f.psd.number, 1e10, &inputs, &mut log)
            .expect_err("overflow must be rejected");
        match err {
            DustError::RetryCapExceeded {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("with 2 sub-steps"), "{last_error}");
            }
            other => panic!("Unexpected error variant: {other:?}"),
        }
        assert_eq!(log.count(WarningKind::StepRejected), 2);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let f = fixture(4, 4000.0, 1e-3);
        let mut bad = Array1::zeros(4);
        bad[1] = f64::NAN;
        let inputs = StepInputs {
            collisions: None,
            source: &bad,
            blowout_rates: &f.zeros,
            sink_rates: &f.zeros,
            min_substeps: 1,
        };
        let mut log = WarningLog::new();
        let integ = ImexIntegrator::default();
        let err = integ
            .step(f.psd.masses(), &f.psd.number, 1.0, &inputs, &mut log)
            .expect_err("NaN source");
        assert!(matches!(err, DustError::Numerical(msg) if msg.contains("supply source")));
        let ok_inputs = StepInputs {
            source: &f.zeros,
            ..inputs
        };
        assert!(integ
            .step(f.psd.masses(), &f.psd.number, f64::NAN, &ok_inputs, &mut log)
            .is_err());
    }

    #[test]
    fn test_initial_substeps_rule() {
        let integ = ImexIntegrator::default();
        assert_eq!(integ.initial_substeps(1.0, f64::INFINITY, 1), 1);
        assert_eq!(integ.initial_substeps(1.0, 1.0, 1), 10);
        assert_eq!(integ.initial_substeps(1.0, 1e-9, 1), integ.max_substeps);
        assert_eq!(integ.initial_substeps(1.0, f64::INFINITY, 5), 5);
    }
}
