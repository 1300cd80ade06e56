// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Cell
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One independent 0D disk cell.
//!
//! A [`DustCell`] owns its grid, PSD, caches, warning log and ledger; no
//! state is shared between cells. [`DustCell::step`] runs the per-step
//! data flow: blow-out floor, optical-depth gate, supply, sublimation
//! drift, blow-out and sink rates, collision operator, implicit step,
//! spill and diagnostics.

use dust_types::config::{DiskConfig, HeadroomPolicy};
use dust_types::constants::TINY;
use dust_types::error::{ensure_finite, DustError, DustResult};
use dust_types::state::{PsdState, SizeGrid};
use dust_types::warnings::{WarningKind, WarningLog};
use ndarray::Array1;
use tracing::{debug, info};

use crate::diagnostics::{compute_energy_bookkeeping, MassLedger, StepRecord};
use crate::disruption::QStarTable;
use crate::dynamics::OrbitalState;
use crate::fragments::{FragmentCache, FragmentTensor};
use crate::integrator::{CollisionTerms, ImexIntegrator, StepInputs, StepReport};
use crate::kernel::{KernelCache, RelativeVelocity};
use crate::radiation::{blowout_substeps, fast_blowout_factor, RadiationEfficiency, RadiationModel};
use crate::shielding::{OpticalDepthGate, ShieldingLaw};
use crate::sublimation::{apply_drift, law_from_config, shrink_rates, DriftOutcome, SublimationLaw};
use crate::supply::{supply_from_config, SupplyDistributor, SupplyRate};

/// Record a clamped table lookup, or fail when tables are strict.
fn table_event(
    log: &mut WarningLog,
    strict: bool,
    table: &str,
    query: f64,
    range: (f64, f64),
    detail: &str,
) -> DustResult<()> {
    if strict {
        return Err(DustError::TableRange {
            table: table.to_string(),
            query,
            lo: range.0,
            hi: range.1,
        });
    }
    log.record(
        WarningKind::TableOutOfRange,
        &format!("{table}: query {query} outside [{}, {}] clamped; {detail}", range.0, range.1),
    );
    Ok(())
}

fn fastest_speed(v: &RelativeVelocity) -> f64 {
    match v {
        RelativeVelocity::Scalar(v) => *v,
        RelativeVelocity::PerPair(m) => m.iter().copied().fold(0.0, f64::max),
    }
}

fn check_fragment_tables(
    tensor: &FragmentTensor,
    table: &QStarTable,
    v_rel: &RelativeVelocity,
    strict: bool,
    log: &mut WarningLog,
) -> DustResult<()> {
    if tensor.out_of_range_pairs() > 0 {
        table_event(
            log,
            strict,
            "qstar",
            fastest_speed(v_rel),
            table.v_range(),
            &format!("{} pairs affected", tensor.out_of_range_pairs()),
        )?;
    }
    if tensor.nonpositive_threshold_pairs() > 0 {
        log.record(
            WarningKind::ThresholdMismatch,
            &format!(
                "qstar: {} pairs with non-positive disruption threshold",
                tensor.nonpositive_threshold_pairs()
            ),
        );
    }
    Ok(())
}

/// Repair bins the integrator left negative or non-finite, rescaling the
/// PSD to the surface density the step's budget says it should hold.
fn sanitize_to_budget(
    psd: &mut PsdState,
    sigma_before: f64,
    report: &StepReport,
    log: &mut WarningLog,
) -> usize {
    let expected =
        (sigma_before + report.supplied_mass - report.blowout_loss - report.sink_loss).max(0.0);
    psd.sanitize(Some(expected), log)
}

/// Committed state of a cell: PSD, ledger and clock.
#[derive(Debug, Clone)]
pub struct CellCheckpoint {
    psd: PsdState,
    ledger: MassLedger,
    time: f64,
    steps: u64,
}

#[derive(Debug)]
pub struct DustCell {
    config: DiskConfig,
    orbit: OrbitalState,
    psd: PsdState,
    velocity: RelativeVelocity,
    qstar: QStarTable,
    kernel_cache: KernelCache,
    fragment_cache: FragmentCache,
    gate: OpticalDepthGate,
    supply: Box<dyn SupplyRate>,
    distributor: SupplyDistributor,
    radiation: RadiationModel,
    sublimation: Box<dyn SublimationLaw>,
    dust_temperature: f64,
    integrator: ImexIntegrator,
    warnings: WarningLog,
    ledger: MassLedger,
    time: f64,
    steps: u64,
}

impl DustCell {
    /// Validate `config` and build the cell with its initial power-law PSD.
    pub fn new(config: DiskConfig) -> DustResult<Self> {
        config.validate()?;
        let orbit = OrbitalState::from_config(&config.orbit)?;
        let grid = SizeGrid::log_spaced(config.grid.s_min, config.grid.s_max, config.grid.n_bins)?;
        let psd = PsdState::power_law(grid, config.material.rho, config.initial.q, config.initial.sigma0)?;
        let radiation = RadiationModel::from_config(&config.radiation, &config.planet, config.orbit.m_planet)?;
        let ledger = MassLedger::new(psd.sigma());
        info!(
            r = orbit.r,
            n_bins = psd.n_bins(),
            sigma0 = ledger.initial,
            v_rel = orbit.v_rel,
            "cell: initialised"
        );
        Ok(Self {
            orbit,
            velocity: RelativeVelocity::Scalar(orbit.v_rel),
            qstar: QStarTable::from_config(&config.qstar)?,
            kernel_cache: KernelCache::new(),
            fragment_cache: FragmentCache::new(),
            gate: OpticalDepthGate::from_config(&config.shielding)?,
            supply: supply_from_config(&config.supply),
            distributor: SupplyDistributor::from_config(&config.supply),
            radiation,
            sublimation: law_from_config(&config.sublimation),
            dust_temperature: config.sublimation.temperature,
            integrator: ImexIntegrator::from_config(&config.integrator),
            warnings: WarningLog::new(),
            ledger,
            time: 0.0,
            steps: 0,
            psd,
            config,
        })
    }

    pub fn with_shielding(mut self, law: Box<dyn ShieldingLaw>) -> Self {
        self.gate = OpticalDepthGate::new(self.config.shielding.policy, law);
        self
    }

    pub fn with_headroom_policy(mut self, policy: HeadroomPolicy, law: Box<dyn ShieldingLaw>) -> Self {
        self.config.shielding.policy = policy;
        self.gate = OpticalDepthGate::new(policy, law);
        self
    }

    pub fn with_supply(mut self, supply: Box<dyn SupplyRate>) -> Self {
        self.supply = supply;
        self
    }

    pub fn with_efficiency(mut self, efficiency: Box<dyn RadiationEfficiency>) -> Self {
        self.radiation = self.radiation.with_efficiency(efficiency);
        self
    }

    pub fn with_sublimation_law(mut self, law: Box<dyn SublimationLaw>) -> Self {
        self.sublimation = law;
        self
    }

    pub fn with_velocity(mut self, velocity: RelativeVelocity) -> DustResult<Self> {
        velocity.validate(self.psd.n_bins())?;
        self.velocity = velocity;
        Ok(self)
    }

    /// Replace the PSD and restart the mass ledger from it.
    pub fn with_psd(mut self, psd: PsdState) -> DustResult<Self> {
        if psd.number.iter().any(|n| !n.is_finite() || *n < 0.0) {
            return Err(DustError::ConfigError(
                "initial PSD must be finite and non-negative".to_string(),
            ));
        }
        if let RelativeVelocity::PerPair(_) = self.velocity {
            self.velocity.validate(psd.n_bins())?;
        }
        self.ledger = MassLedger::new(psd.sigma());
        self.psd = psd;
        self.fragment_cache.invalidate();
        Ok(self)
    }

    /// Planet (radiation) and dust (sublimation) temperatures in K.
    pub fn set_temperatures(&mut self, planet: f64, dust: f64) -> DustResult<()> {
        if !dust.is_finite() || dust <= 0.0 {
            return Err(DustError::ConfigError(format!(
                "dust temperature must be finite and > 0, got {dust}"
            )));
        }
        self.radiation.set_temperature(planet)?;
        self.dust_temperature = dust;
        Ok(())
    }

    /// Rebuild the grid over new bounds, moving the PSD onto it.
    pub fn rebuild_grid(&mut self, s_min: f64, s_max: f64) -> DustResult<()> {
        let grid = self.psd.grid().rebuilt(s_min, s_max)?;
        let version = grid.version();
        self.psd.regrid(grid);
        info!(s_min, s_max, grid_version = version, "cell: size grid rebuilt");
        Ok(())
    }

    pub fn psd(&self) -> &PsdState {
        &self.psd
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn orbit(&self) -> &OrbitalState {
        &self.orbit
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    pub fn ledger(&self) -> &MassLedger {
        &self.ledger
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn fragment_cache(&self) -> &FragmentCache {
        &self.fragment_cache
    }

    pub fn kernel_cache(&self) -> &KernelCache {
        &self.kernel_cache
    }

    pub fn supply_builds(&self) -> u64 {
        self.distributor.builds()
    }

    pub fn checkpoint(&self) -> CellCheckpoint {
        CellCheckpoint {
            psd: self.psd.clone(),
            ledger: self.ledger,
            time: self.time,
            steps: self.steps,
        }
    }

    /// Return to `checkpoint`. Caches and warning counters are kept.
    pub fn restore(&mut self, checkpoint: CellCheckpoint) {
        self.psd = checkpoint.psd;
        self.ledger = checkpoint.ledger;
        self.time = checkpoint.time;
        self.steps = checkpoint.steps;
    }

    /// Advance the cell by `dt` seconds.
    ///
    /// On error the cell is left at its last committed state apart from
    /// cache contents and warning counters.
    pub fn step(&mut self, dt: f64) -> DustResult<StepRecord> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(DustError::Numerical(format!(
                "cell step requires finite dt > 0, got {dt}"
            )));
        }
        let strict = self.config.integrator.strict_tables;
        let checkpoint = self.checkpoint();
        let result = self.advance(dt, strict);
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    fn advance(&mut self, dt: f64, strict: bool) -> DustResult<StepRecord> {
        let n = self.psd.n_bins();
        let rho = self.psd.rho();
        let sigma_start = self.psd.sigma();

        // Blow-out floor and effective minimum size.
        let a_blow = self.radiation.blowout_radius(rho)?;
        if !a_blow.in_range {
            table_event(
                &mut self.warnings,
                strict,
                "blowout_radius",
                a_blow.value,
                (0.0, a_blow.value),
                "beta stays above 0.5 over the search bracket",
            )?;
        }
        let previous_floor = self.psd.s_min_eff();
        self.psd.set_s_min_eff(a_blow.value);
        if self.psd.s_min_eff() != previous_floor {
            info!(
                from = previous_floor,
                to = self.psd.s_min_eff(),
                "cell: effective minimum size changed"
            );
        }

        // Optical-depth gate and supply.
        let kappa_seed = self.distributor.injection_opacity(&self.psd)?;
        let optical = self.gate.evaluate(&self.psd, Some(kappa_seed));
        if !optical.phi_in_range {
            table_event(
                &mut self.warnings,
                strict,
                "phi",
                optical.kappa_bare * optical.sigma,
                (0.0, f64::INFINITY),
                "self-shielding factor clamped",
            )?;
        }
        let requested = ensure_finite("supply rate", self.supply.rate(self.time))?;
        let decision = self.gate.admit(&optical, requested, dt)?;
        let source = self.distributor.distribute(&self.psd, decision.admitted_rate)?;

        // Sublimation drift.
        let drift = if self.config.sublimation.enabled {
            let ds_dt = shrink_rates(self.sublimation.as_ref(), self.dust_temperature, rho, n)?;
            apply_drift(&mut self.psd, &ds_dt, dt, a_blow.value, self.config.sublimation.mode)?
        } else {
            DriftOutcome::default()
        };

        // Blow-out and extra sink rates.
        let (blowout_rates, clamped) = self.radiation.sink_rates(&self.psd, self.orbit.omega);
        if clamped > 0 {
            table_event(
                &mut self.warnings,
                strict,
                "q_pr",
                self.radiation.temperature(),
                (0.0, f64::INFINITY),
                &format!("{clamped} bins clamped"),
            )?;
        }
        let t_blow = 1.0 / self.orbit.omega;
        let blowing = blowout_rates.iter().any(|&r| r > 0.0);
        let (min_substeps, fast_factor) = if blowing {
            (
                blowout_substeps(dt, t_blow, self.radiation.substep_max_ratio()),
                fast_blowout_factor(dt, t_blow),
            )
        } else {
            (1, 0.0)
        };
        let sink_rates = match self.config.sinks.t_sink {
            Some(t) => Array1::from_elem(n, 1.0 / t),
            None => Array1::zeros(n),
        };

        // Collision operator from the per-cell caches.
        let collisions = if self.config.collisions.enabled {
            let heights = Array1::from_elem(n, self.orbit.h);
            let kernel = self.kernel_cache.get_or_build(
                self.psd.grid_version(),
                self.psd.sizes(),
                &heights,
                &self.velocity,
            )?;
            let (tensor, rebuilt) = self.fragment_cache.get_or_build(
                &self.psd,
                &self.velocity,
                self.config.material.alpha_frag,
                &self.qstar,
            )?;
            if rebuilt {
                check_fragment_tables(tensor, &self.qstar, &self.velocity, strict, &mut self.warnings)?;
            }
            Some(CollisionTerms { kernel, tensor })
        } else {
            None
        };

        let inputs = StepInputs {
            collisions,
            source: &source,
            blowout_rates: &blowout_rates,
            sink_rates: &sink_rates,
            min_substeps,
        };
        let sigma_pre = self.psd.sigma();
        let mut report = self
            .integrator
            .step(self.psd.masses(), &self.psd.number, dt, &inputs, &mut self.warnings)?;
        let status = report.status;
        std::mem::swap(&mut self.psd.number, &mut report.number);
        let sanitized_bins =
            sanitize_to_budget(&mut self.psd, sigma_pre, &report, &mut self.warnings);

        let spill_loss = self.gate.spill(&mut self.psd, optical.sigma_tau1);

        let energy = match (collisions, self.config.collisions.energy_bookkeeping) {
            (Some(terms), true) => {
                let rates = terms.kernel.rates(&self.psd.number)?;
                Some(compute_energy_bookkeeping(
                    &rates,
                    self.psd.masses(),
                    &self.velocity,
                    terms.tensor,
                    self.config.collisions.f_ke_cratering,
                    self.config.collisions.f_ke_fragmentation,
                )?)
            }
            _ => None,
        };

        let blowout_loss = report.blowout_loss + drift.blowout_loss;
        let ledger = &mut self.ledger;
        ledger.supplied += report.supplied_mass;
        ledger.blowout += blowout_loss;
        ledger.sublimation += drift.sublimation_loss;
        ledger.sink += report.sink_loss;
        ledger.spill += spill_loss;
        ledger.clipped += decision.clipped_rate * dt;

        let sigma_end = self.psd.sigma();
        let expected = sigma_start + report.supplied_mass;
        let lost = blowout_loss + drift.sublimation_loss + report.sink_loss + spill_loss;
        let mass_error = (sigma_end + lost - expected).abs() / expected.abs().max(TINY);

        self.time += dt;
        self.steps += 1;
        let optical_end = self.gate.evaluate(&self.psd, Some(kappa_seed));
        debug!(
            step = self.steps,
            t = self.time,
            sigma = sigma_end,
            tau = optical_end.tau,
            mass_error,
            substeps = report.substeps,
            "cell: step committed"
        );

        Ok(StepRecord {
            step: self.steps,
            time: self.time,
            dt,
            status,
            number: self.psd.number.clone(),
            sigma: sigma_end,
            optical_depth: optical,
            optical_depth_end: optical_end,
            a_blow: a_blow.value,
            s_min_eff: self.psd.s_min_eff(),
            supply_requested: decision.requested_rate,
            supply_admitted: decision.admitted_rate,
            supply_clipped: decision.clipped_rate,
            blowout_loss,
            sublimation_loss: drift.sublimation_loss,
            sink_loss: report.sink_loss,
            spill_loss,
            mass_error,
            substeps: report.substeps,
            attempts: report.attempts,
            t_coll_min: report.t_coll_min,
            fast_blowout_factor: fast_factor,
            sanitized_bins,
            energy,
            ledger: *ledger,
        })
    }

    /// Take `n_steps` steps of `dt`, returning every record.
    pub fn run(&mut self, dt: f64, n_steps: usize) -> DustResult<Vec<StepRecord>> {
        (0..n_steps).map(|_| self.step(dt)).collect()
    }
}
