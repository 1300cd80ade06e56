// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Power-Law Integrals
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed-form integrals of s^-alpha over size intervals.

/// |1 - alpha| below which the logarithmic limit is used.
pub const LOG_LIMIT_EPS: f64 = 1e-12;

/// ∫_l^r s^-alpha ds for 0 < l <= r.
pub fn bin_integral(l: f64, r: f64, alpha: f64) -> f64 {
    if r <= l {
        return 0.0;
    }
    let p = 1.0 - alpha;
    if p.abs() < LOG_LIMIT_EPS {
        (r / l).ln()
    } else {
        (r.powf(p) - l.powf(p)) / p
    }
}

/// ∫ s^-alpha ds over the intersection of [l, r] and [a, b]; zero if disjoint.
pub fn overlap_integral(l: f64, r: f64, a: f64, b: f64, alpha: f64) -> f64 {
    let lo = l.max(a);
    let hi = r.min(b);
    if hi <= lo {
        0.0
    } else {
        bin_integral(lo, hi, alpha)
    }
}
