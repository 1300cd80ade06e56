// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::{M_MARS, R_MARS};
use crate::error::{DustError, DustResult};

/// Top-level configuration for a single dust cell.
///
/// Every section carries defaults so a partial JSON document is accepted;
/// `validate` runs before any step and rejects unphysical values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub grid: GridConfig,
    pub material: MaterialConfig,
    pub qstar: QStarConfig,
    pub orbit: OrbitConfig,
    pub planet: PlanetConfig,
    pub radiation: RadiationConfig,
    pub shielding: ShieldingConfig,
    pub supply: SupplyConfig,
    pub sublimation: SublimationConfig,
    pub sinks: SinkConfig,
    pub collisions: CollisionConfig,
    pub integrator: IntegratorConfig,
    pub initial: InitialConfig,
}

/// Logarithmic size grid bounds (radii in m).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub s_min: f64,
    pub s_max: f64,
    pub n_bins: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            s_min: 1e-7,
            s_max: 1e-2,
            n_bins: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Bulk density (kg/m^3)
    pub rho: f64,
    /// Fragment size-distribution exponent, dN/ds ∝ s^-alpha_frag
    pub alpha_frag: f64,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            rho: 3000.0,
            alpha_frag: 3.5,
        }
    }
}

/// One row of the disruption-threshold table.
///
/// Q*_D(s) = qs·s^(-a_s) + b·ρ·s^(b_g), s in m, ρ in kg/m^3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QStarEntry {
    /// Reference impact velocity (km/s)
    pub v_ref_kms: f64,
    pub qs: f64,
    pub a_s: f64,
    pub b: f64,
    pub b_g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QStarConfig {
    pub entries: Vec<QStarEntry>,
}

impl Default for QStarConfig {
    fn default() -> Self {
        // Benz & Asphaug (1999) basalt coefficients at 3 and 5 km/s.
        Self {
            entries: vec![
                QStarEntry {
                    v_ref_kms: 3.0,
                    qs: 3.5e7,
                    a_s: 0.38,
                    b: 0.3,
                    b_g: 1.36,
                },
                QStarEntry {
                    v_ref_kms: 5.0,
                    qs: 7.0e7,
                    a_s: 0.38,
                    b: 0.5,
                    b_g: 1.36,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Orbital radius of the cell (m)
    pub r: f64,
    /// Central body mass (kg)
    pub m_planet: f64,
    /// Eccentricity dispersion
    pub e: f64,
    /// Inclination dispersion (rad)
    pub i: f64,
    /// Multiplier on H = i·r
    pub h_factor: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            r: 2.0 * R_MARS,
            m_planet: M_MARS,
            e: 0.1,
            i: 0.05,
            h_factor: 1.0,
        }
    }
}

/// Radiating planet (source of blow-out luminosity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    pub radius: f64,
    pub temperature: f64,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: R_MARS,
            temperature: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiationConfig {
    pub blowout_enabled: bool,
    /// Constant radiation-pressure efficiency Q_pr
    pub q_pr: f64,
    /// dt / t_blow above which blow-out removal is sub-stepped
    pub substep_max_ratio: f64,
}

impl Default for RadiationConfig {
    fn default() -> Self {
        Self {
            blowout_enabled: true,
            q_pr: 1.0,
            substep_max_ratio: 1.0,
        }
    }
}

/// How supply interacts with the τ=1 face density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadroomPolicy {
    /// Rate-limit supply so Σ reaches Σ_τ=1 at most.
    #[default]
    Clip,
    /// Admit everything, then divert mass above Σ_τ=1 out of the layer.
    Spill,
}

/// Tabulated self-shielding factor Φ(τ).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiTableConfig {
    pub tau: Vec<f64>,
    pub phi: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldingConfig {
    pub policy: HeadroomPolicy,
    /// Absent table means Φ = 1.
    pub phi_table: Option<PhiTableConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InjectionPolicy {
    #[default]
    SmallestBin,
    PowerLaw { q: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SupplyLaw {
    #[default]
    Const,
    /// rate(t) = rate·((t + t0)/t0)^index
    PowerLaw { t0: f64, index: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    /// Areal mass supply rate (kg m^-2 s^-1)
    pub rate: f64,
    pub law: SupplyLaw,
    pub injection: InjectionPolicy,
    /// Upper injection size (m); defaults to the grid maximum.
    pub s_inj_max: Option<f64>,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            rate: 0.0,
            law: SupplyLaw::Const,
            injection: InjectionPolicy::SmallestBin,
            s_inj_max: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SublimationMode {
    /// Shrinkage mass is tallied as a generic sink.
    Legacy,
    /// Grains crossing a_blow move to the blow-out channel.
    #[default]
    MassConserving,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SublimationConfig {
    pub enabled: bool,
    pub mode: SublimationMode,
    /// Dust temperature (K)
    pub temperature: f64,
    /// Logistic fallback midpoint (K)
    pub t_sub: f64,
    /// Logistic fallback width (K)
    pub d_t: f64,
    pub alpha_evap: f64,
    /// Molar mass of the vapour (kg/mol)
    pub mu: f64,
    /// log10 P_sat = a - b/T (P in Pa); both absent selects the logistic law.
    pub a: Option<f64>,
    pub b: Option<f64>,
    /// Ambient vapour pressure (Pa)
    pub p_gas: f64,
}

impl Default for SublimationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SublimationMode::MassConserving,
            temperature: 1500.0,
            t_sub: 1300.0,
            d_t: 50.0,
            alpha_evap: 0.007,
            mu: 0.044_084_9,
            a: Some(13.613),
            b: Some(17850.0),
            p_gas: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Uniform extra-sink timescale (s); absent disables the sink.
    pub t_sink: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub enabled: bool,
    pub energy_bookkeeping: bool,
    /// Retained kinetic-energy fraction for cratering pairs
    pub f_ke_cratering: f64,
    /// Retained kinetic-energy fraction for catastrophic pairs
    pub f_ke_fragmentation: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            energy_bookkeeping: false,
            f_ke_cratering: 0.1,
            f_ke_fragmentation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainBackend {
    #[default]
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Sub-step length as a fraction of the shortest collision time
    pub safety: f64,
    /// Relative mass-budget tolerance for committing a step
    pub mass_tol: f64,
    pub max_substeps: usize,
    pub max_retries: usize,
    /// Promote table clamps to errors
    pub strict_tables: bool,
    pub backend: GainBackend,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            safety: 0.1,
            mass_tol: 5e-3,
            max_substeps: 1000,
            max_retries: 8,
            strict_tables: false,
            backend: GainBackend::Serial,
        }
    }
}

/// Initial power-law PSD, N_k ∝ s_k^-q · width_k, scaled to sigma0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    /// Initial surface density (kg/m^2)
    pub sigma0: f64,
    pub q: f64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            sigma0: 1e-3,
            q: 3.5,
        }
    }
}

fn require_positive(name: &str, value: f64) -> DustResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DustError::ConfigError(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

fn require_non_negative(name: &str, value: f64) -> DustResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DustError::ConfigError(format!(
            "{name} must be finite and >= 0, got {value}"
        )));
    }
    Ok(())
}

fn require_unit_interval(name: &str, value: f64) -> DustResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(DustError::ConfigError(format!(
            "{name} must lie in [0, 1], got {value}"
        )));
    }
    Ok(())
}

impl DiskConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> DustResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> DustResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DustResult<()> {
        let g = &self.grid;
        require_positive("grid.s_min", g.s_min)?;
        require_positive("grid.s_max", g.s_max)?;
        if g.s_max <= g.s_min {
            return Err(DustError::ConfigError(format!(
                "grid.s_max ({}) must exceed grid.s_min ({})",
                g.s_max, g.s_min
            )));
        }
        if g.n_bins < 1 {
            return Err(DustError::ConfigError("grid.n_bins must be >= 1".to_string()));
        }

        require_positive("material.rho", self.material.rho)?;
        require_positive("material.alpha_frag", self.material.alpha_frag)?;

        if self.qstar.entries.is_empty() {
            return Err(DustError::ConfigError(
                "qstar.entries must contain at least one row".to_string(),
            ));
        }
        for pair in self.qstar.entries.windows(2) {
            if pair[1].v_ref_kms <= pair[0].v_ref_kms {
                return Err(DustError::ConfigError(format!(
                    "qstar.entries must be sorted by strictly increasing v_ref_kms, got {} then {}",
                    pair[0].v_ref_kms, pair[1].v_ref_kms
                )));
            }
        }
        for entry in &self.qstar.entries {
            require_positive("qstar.v_ref_kms", entry.v_ref_kms)?;
            require_non_negative("qstar.qs", entry.qs)?;
            require_non_negative("qstar.b", entry.b)?;
            if !entry.a_s.is_finite() || !entry.b_g.is_finite() {
                return Err(DustError::ConfigError(
                    "qstar exponents must be finite".to_string(),
                ));
            }
        }

        require_positive("orbit.r", self.orbit.r)?;
        require_positive("orbit.m_planet", self.orbit.m_planet)?;
        require_non_negative("orbit.e", self.orbit.e)?;
        if self.orbit.e >= 1.0 {
            return Err(DustError::ConfigError(format!(
                "orbit.e must be < 1, got {}",
                self.orbit.e
            )));
        }
        require_positive("orbit.i", self.orbit.i)?;
        require_positive("orbit.h_factor", self.orbit.h_factor)?;

        require_positive("planet.radius", self.planet.radius)?;
        require_positive("planet.temperature", self.planet.temperature)?;

        require_positive("radiation.q_pr", self.radiation.q_pr)?;
        require_positive("radiation.substep_max_ratio", self.radiation.substep_max_ratio)?;

        if let Some(table) = &self.shielding.phi_table {
            if table.tau.len() != table.phi.len() || table.tau.len() < 2 {
                return Err(DustError::ConfigError(format!(
                    "shielding.phi_table needs matching tau/phi columns of length >= 2, got {} and {}",
                    table.tau.len(),
                    table.phi.len()
                )));
            }
        }

        require_non_negative("supply.rate", self.supply.rate)?;
        if let SupplyLaw::PowerLaw { t0, index } = self.supply.law {
            require_positive("supply.law.t0", t0)?;
            if !index.is_finite() {
                return Err(DustError::ConfigError(format!(
                    "supply.law.index must be finite, got {index}"
                )));
            }
        }
        if let InjectionPolicy::PowerLaw { q } = self.supply.injection {
            if !q.is_finite() {
                return Err(DustError::ConfigError(format!(
                    "supply.injection.q must be finite, got {q}"
                )));
            }
        }
        if let Some(s) = self.supply.s_inj_max {
            require_positive("supply.s_inj_max", s)?;
        }

        let sub = &self.sublimation;
        if sub.enabled {
            require_positive("sublimation.temperature", sub.temperature)?;
            require_positive("sublimation.d_t", sub.d_t)?;
            require_positive("sublimation.mu", sub.mu)?;
            require_unit_interval("sublimation.alpha_evap", sub.alpha_evap)?;
            require_non_negative("sublimation.p_gas", sub.p_gas)?;
            if sub.a.is_some() != sub.b.is_some() {
                return Err(DustError::ConfigError(
                    "sublimation.a and sublimation.b must be given together".to_string(),
                ));
            }
        }

        if let Some(t) = self.sinks.t_sink {
            require_positive("sinks.t_sink", t)?;
        }

        require_unit_interval("collisions.f_ke_cratering", self.collisions.f_ke_cratering)?;
        require_unit_interval(
            "collisions.f_ke_fragmentation",
            self.collisions.f_ke_fragmentation,
        )?;

        let it = &self.integrator;
        require_positive("integrator.safety", it.safety)?;
        require_positive("integrator.mass_tol", it.mass_tol)?;
        if it.max_substeps == 0 {
            return Err(DustError::ConfigError(
                "integrator.max_substeps must be >= 1".to_string(),
            ));
        }

        require_non_negative("initial.sigma0", self.initial.sigma0)?;
        if !self.initial.q.is_finite() {
            return Err(DustError::ConfigError(format!(
                "initial.q must be finite, got {}",
                self.initial.q
            )));
        }
        Ok(())
    }
}
