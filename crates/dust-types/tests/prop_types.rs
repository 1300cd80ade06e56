// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Property-Based Tests (proptest) for dust-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for dust-types using proptest.
//!
//! Covers: size grid construction, PSD normalisation, sanitize, regrid,
//! warning counters, config validation.

use dust_types::config::DiskConfig;
use dust_types::state::{PsdState, SizeGrid};
use dust_types::warnings::{WarningKind, WarningLog};
use proptest::prelude::*;

// ── Size Grid Properties ─────────────────────────────────────────────

proptest! {
    /// Edges increase strictly; centers lie inside their bins; widths sum to the span.
    #[test]
    fn grid_is_ordered(log_min in -9.0f64..-4.0, decades in 0.5f64..6.0, n in 1usize..80) {
        let s_min = 10f64.powf(log_min);
        let s_max = s_min * 10f64.powf(decades);
        let grid = SizeGrid::log_spaced(s_min, s_max, n).expect("grid");
        prop_assert_eq!(grid.edges().len(), n + 1);
        for k in 0..n {
            prop_assert!(grid.edges()[k + 1] > grid.edges()[k]);
            prop_assert!(grid.centers()[k] > grid.edges()[k] && grid.centers()[k] < grid.edges()[k + 1]);
            prop_assert_eq!(grid.bin_of(grid.centers()[k]), Some(k));
        }
        let span: f64 = grid.widths().sum();
        prop_assert!((span - (s_max - s_min)).abs() <= 1e-9 * s_max);
    }

    /// Rebuilding always yields a new version.
    #[test]
    fn rebuilt_grid_has_new_version(n in 1usize..40, factor in 1.01f64..5.0) {
        let grid = SizeGrid::log_spaced(1e-7, 1e-2, n).expect("grid");
        let next = grid.rebuilt(1e-7 * factor, 1e-2).expect("rebuild");
        prop_assert_ne!(grid.version(), next.version());
        prop_assert_eq!(next.n_bins(), n);
    }
}

// ── PSD Properties ───────────────────────────────────────────────────

proptest! {
    /// Power-law initialisation hits the requested surface density.
    #[test]
    fn power_law_matches_sigma(q in 2.0f64..4.5, log_sigma in -8.0f64..2.0, n in 1usize..60) {
        let sigma0 = 10f64.powf(log_sigma);
        let grid = SizeGrid::log_spaced(1e-7, 1e-2, n).expect("grid");
        let psd = PsdState::power_law(grid, 3000.0, q, sigma0).expect("psd");
        prop_assert!((psd.sigma() - sigma0).abs() <= 1e-12 * sigma0);
        prop_assert!(psd.number.iter().all(|x| x.is_finite() && *x >= 0.0));
    }

    /// Regridding conserves mass.
    #[test]
    fn regrid_conserves_mass(n in 2usize..40, m in 2usize..40, shift in 0.0f64..1.0) {
        let grid = SizeGrid::log_spaced(1e-7, 1e-2, n).expect("grid");
        let mut psd = PsdState::power_law(grid, 2500.0, 3.5, 1e-3).expect("psd");
        let sigma = psd.sigma();
        let target = SizeGrid::log_spaced(1e-7 * (1.0 + shift), 2e-2, m).expect("target");
        psd.regrid(target);
        prop_assert_eq!(psd.n_bins(), m);
        prop_assert!((psd.sigma() - sigma).abs() <= 1e-12 * sigma);
    }

    /// Sanitize repairs every bad bin and records exactly one warning.
    #[test]
    fn sanitize_repairs_bad_bins(n in 3usize..30, bad in 0usize..3) {
        let grid = SizeGrid::log_spaced(1e-6, 1e-3, n).expect("grid");
        let mut psd = PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd");
        let values = [-1.0, f64::NAN, f64::INFINITY];
        psd.number[bad] = values[bad];
        let mut log = WarningLog::new();
        let repaired = psd.sanitize(Some(1e-3), &mut log);
        prop_assert_eq!(repaired, 1);
        prop_assert_eq!(log.count(WarningKind::PsdSanitized), 1);
        prop_assert!(psd.number.iter().all(|x| x.is_finite() && *x >= 0.0));
        prop_assert!((psd.sigma() - 1e-3).abs() <= 1e-12);
    }
}

// ── Warning Log Properties ───────────────────────────────────────────

proptest! {
    /// Merged counters are the sum of their parts.
    #[test]
    fn merge_adds_counts(a in proptest::collection::vec(0usize..4, 0..20), b in proptest::collection::vec(0usize..4, 0..20)) {
        let mut left = WarningLog::new();
        let mut right = WarningLog::new();
        for &k in &a {
            left.record(WarningKind::ALL[k], "left");
        }
        for &k in &b {
            right.record(WarningKind::ALL[k], "right");
        }
        let mut merged = left.clone();
        merged.merge(&right);
        for kind in WarningKind::ALL {
            prop_assert_eq!(merged.count(kind), left.count(kind) + right.count(kind));
        }
        prop_assert_eq!(merged.total(), (a.len() + b.len()) as u64);
    }
}

// ── Config Properties ────────────────────────────────────────────────

proptest! {
    /// Non-positive bulk density is always rejected before any step.
    #[test]
    fn config_rejects_bad_density(rho in -1e4f64..=0.0) {
        let mut cfg = DiskConfig::default();
        cfg.material.rho = rho;
        prop_assert!(cfg.validate().is_err());
    }
}
