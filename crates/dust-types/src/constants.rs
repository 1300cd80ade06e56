// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Gravitational constant (m^3 kg^-1 s^-2)
pub const G: f64 = 6.674_30e-11;

/// Speed of light (m/s)
pub const C_LIGHT: f64 = 2.997_924_58e8;

/// Stefan-Boltzmann constant (W m^-2 K^-4)
pub const SIGMA_SB: f64 = 5.670_374_419e-8;

/// Universal gas constant (J mol^-1 K^-1)
pub const R_GAS: f64 = 8.314_462_618;

/// Mars mass (kg)
pub const M_MARS: f64 = 6.4171e23;

/// Mars mean radius (m)
pub const R_MARS: f64 = 3.3895e6;

/// Blow-out threshold on the radiation-to-gravity ratio.
pub const BETA_BLOWOUT: f64 = 0.5;

/// Denominator floor for relative errors.
pub const TINY: f64 = 1e-300;
