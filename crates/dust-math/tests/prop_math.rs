// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Property-Based Tests (proptest) for dust-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for dust-math using proptest.
//!
//! Covers: bracket lookup, 1D/2D table interpolation, power-law bin
//! integrals, capped bisection.

use dust_math::interp::{bracket, Table1D, Table2D};
use dust_math::powerlaw::{bin_integral, overlap_integral};
use dust_math::roots::{bisect, BisectConfig};
use ndarray::Array2;
use proptest::prelude::*;

// ── Interpolation Properties ─────────────────────────────────────────

proptest! {
    /// In-range queries are bracketed correctly; out-of-range ones clamp and flag.
    #[test]
    fn bracket_clamps_and_flags(n in 2usize..20, x in -5.0f64..25.0) {
        let xs: Vec<f64> = (0..n).map(|k| k as f64).collect();
        let (lo, t, in_range) = bracket(&xs, x);
        prop_assert!((0.0..=1.0).contains(&t));
        prop_assert!(lo + 1 < n);
        let inside = x >= 0.0 && x <= (n - 1) as f64;
        prop_assert_eq!(in_range, inside);
        if inside {
            prop_assert!((xs[lo] + t - x).abs() < 1e-12);
        }
    }

    /// A table of a linear function reproduces it exactly inside the domain.
    #[test]
    fn table1d_exact_on_lines(slope in -10.0f64..10.0, offset in -5.0f64..5.0, x in 0.0f64..9.0) {
        let xs: Vec<f64> = (0..10).map(|k| k as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&v| slope * v + offset).collect();
        let table = Table1D::new(xs, ys).expect("table");
        let out = table.eval(x);
        prop_assert!(out.in_range);
        prop_assert!((out.value - (slope * x + offset)).abs() < 1e-10);
    }

    /// Bilinear interpolation stays within the min/max of the tabulated values.
    #[test]
    fn table2d_bounded(x in -1.0f64..4.0, y in -1.0f64..4.0, seed in 0u64..1000) {
        let values = Array2::from_shape_fn((4, 4), |(i, j)| ((seed as f64 + (i * 4 + j) as f64) * 0.37).sin());
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let table = Table2D::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0, 3.0], values).expect("table");
        let out = table.eval(x, y);
        prop_assert!(out.value >= lo - 1e-12 && out.value <= hi + 1e-12);
        let inside = (0.0..=3.0).contains(&x) && (0.0..=3.0).contains(&y);
        prop_assert_eq!(out.in_range, inside);
    }
}

// ── Power-Law Integral Properties ────────────────────────────────────

proptest! {
    /// Splitting an interval anywhere leaves the integral unchanged.
    #[test]
    fn bin_integral_additive(alpha in 0.0f64..5.0, split in 0.01f64..0.99) {
        let (l, r): (f64, f64) = (1e-6, 1e-3);
        let m = l * (r / l).powf(split);
        let whole = bin_integral(l, r, alpha);
        let parts = bin_integral(l, m, alpha) + bin_integral(m, r, alpha);
        prop_assert!((whole - parts).abs() <= 1e-9 * whole);
    }

    /// The overlap integral never exceeds the full bin integral.
    #[test]
    fn overlap_bounded(alpha in 0.0f64..5.0, a in 1e-6f64..1e-3, width in 0.0f64..1e-3) {
        let (l, r) = (1e-5, 1e-4);
        let full = bin_integral(l, r, alpha);
        let part = overlap_integral(l, r, a, a + width, alpha);
        prop_assert!(part >= 0.0);
        prop_assert!(part <= full * (1.0 + 1e-12));
    }
}

// ── Bisection Properties ─────────────────────────────────────────────

proptest! {
    /// Bisection recovers the root of a monotone cubic.
    #[test]
    fn bisect_finds_cubic_root(root in 0.5f64..5.0) {
        let found = bisect(|x| (x - root).powi(3) + (x - root), -10.0, 10.0, BisectConfig::default())
            .expect("root");
        prop_assert!((found - root).abs() < 1e-9);
    }

    /// A bracket without a sign change is an error, not a guess.
    #[test]
    fn bisect_rejects_no_sign_change(c in 0.1f64..10.0) {
        prop_assert!(bisect(|x| x * x + c, -1.0, 1.0, BisectConfig::default()).is_err());
    }
}
