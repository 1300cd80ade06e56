// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Interp
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Clamped table interpolation with an explicit out-of-range tag.
//!
//! Lookups never log or fail on their own: they return a [`TableValue`]
//! and the caller decides whether a clamp is a warning or an error.

use dust_types::error::{DustError, DustResult};
use ndarray::Array2;

/// Interpolated value plus whether the query lay inside the tabulated domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableValue {
    pub value: f64,
    pub in_range: bool,
}

impl TableValue {
    pub fn exact(value: f64) -> Self {
        Self {
            value,
            in_range: true,
        }
    }
}

/// Lower bracket index and fractional position of `x` in `xs`.
///
/// `xs` must be strictly increasing with at least one entry. Queries outside
/// the table clamp to the end node and report `in_range = false`.
pub fn bracket(xs: &[f64], x: f64) -> (usize, f64, bool) {
    let n = xs.len();
    if n < 2 {
        return (0, 0.0, n == 1 && x == xs[0]);
    }
    if x.is_nan() {
        return (0, 0.0, false);
    }
    if x <= xs[0] {
        return (0, 0.0, x == xs[0]);
    }
    if x >= xs[n - 1] {
        return (n - 2, 1.0, x == xs[n - 1]);
    }
    let hi = xs.partition_point(|&v| v <= x);
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    (lo, t, true)
}

fn validate_axis(name: &str, xs: &[f64]) -> DustResult<()> {
    if xs.len() < 2 {
        return Err(DustError::ConfigError(format!(
            "{name} axis needs at least 2 nodes, got {}",
            xs.len()
        )));
    }
    for k in 1..xs.len() {
        if !xs[k].is_finite() || !xs[k - 1].is_finite() || xs[k] <= xs[k - 1] {
            return Err(DustError::ConfigError(format!(
                "{name} axis must be finite and strictly increasing at {k}"
            )));
        }
    }
    Ok(())
}

/// Piecewise-linear y(x).
#[derive(Debug, Clone, PartialEq)]
pub struct Table1D {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Table1D {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> DustResult<Self> {
        validate_axis("table1d x", &xs)?;
        if ys.len() != xs.len() || ys.iter().any(|y| !y.is_finite()) {
            return Err(DustError::ConfigError(format!(
                "table1d needs {} finite values, got {}",
                xs.len(),
                ys.len()
            )));
        }
        Ok(Self { xs, ys })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn eval(&self, x: f64) -> TableValue {
        let (lo, t, in_range) = bracket(&self.xs, x);
        TableValue {
            value: (1.0 - t) * self.ys[lo] + t * self.ys[lo + 1],
            in_range,
        }
    }
}

/// Bilinear f(x, y) on a rectilinear grid, `values[[ix, iy]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table2D {
    xs: Vec<f64>,
    ys: Vec<f64>,
    values: Array2<f64>,
}

impl Table2D {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, values: Array2<f64>) -> DustResult<Self> {
        validate_axis("table2d x", &xs)?;
        validate_axis("table2d y", &ys)?;
        if values.dim() != (xs.len(), ys.len()) {
            return Err(DustError::ConfigError(format!(
                "table2d values shape {:?} does not match axes ({}, {})",
                values.dim(),
                xs.len(),
                ys.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DustError::ConfigError(
                "table2d values must be finite".to_string(),
            ));
        }
        Ok(Self { xs, ys, values })
    }

    pub fn eval(&self, x: f64, y: f64) -> TableValue {
        let (ix, tx, in_x) = bracket(&self.xs, x);
        let (iy, ty, in_y) = bracket(&self.ys, y);

        let v00 = self.values[[ix, iy]];
        let v10 = self.values[[ix + 1, iy]];
        let v01 = self.values[[ix, iy + 1]];
        let v11 = self.values[[ix + 1, iy + 1]];

        TableValue {
            value: (1.0 - tx) * ((1.0 - ty) * v00 + ty * v01) + tx * ((1.0 - ty) * v10 + ty * v11),
            in_range: in_x && in_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_interior_and_nodes() {
        let xs = [1.0, 2.0, 4.0];
        assert_eq!(bracket(&xs, 1.5), (0, 0.5, true));
        assert_eq!(bracket(&xs, 3.0), (1, 0.5, true));
        assert_eq!(bracket(&xs, 2.0), (1, 0.0, true));
        assert_eq!(bracket(&xs, 4.0), (1, 1.0, true));
        assert_eq!(bracket(&xs, 1.0), (0, 0.0, true));
    }

    #[test]
    fn test_bracket_clamps_outside() {
        let xs = [1.0, 2.0, 4.0];
        assert_eq!(bracket(&xs, 0.1), (0, 0.0, false));
        assert_eq!(bracket(&xs, 9.0), (1, 1.0, false));
        assert!(!bracket(&xs, f64::NAN).2);
    }

    #[test]
    fn test_table1d_linear_and_clamped() {
        let t = Table1D::new(vec![0.0, 1.0, 3.0], vec![1.0, 0.5, 0.1]).expect("table");
        let mid = t.eval(0.5);
        assert!((mid.value - 0.75).abs() < 1e-12);
        assert!(mid.in_range);
        let above = t.eval(10.0);
        assert!((above.value - 0.1).abs() < 1e-12);
        assert!(!above.in_range);
        let below = t.eval(-1.0);
        assert!((below.value - 1.0).abs() < 1e-12);
        assert!(!below.in_range);
    }

    #[test]
    fn test_table2d_reproduces_bilinear_field() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let ys = vec![10.0, 20.0, 30.0];
        let values = Array2::from_shape_fn((4, 3), |(i, j)| 2.0 * xs[i] + 0.5 * ys[j]);
        let t = Table2D::new(xs, ys, values).expect("table");
        let v = t.eval(1.25, 27.0);
        assert!((v.value - (2.5 + 13.5)).abs() < 1e-12, "value = {}", v.value);
        assert!(v.in_range);
        let clamped = t.eval(5.0, 27.0);
        assert!((clamped.value - (6.0 + 13.5)).abs() < 1e-12);
        assert!(!clamped.in_range);
    }

    #[test]
    fn test_table_rejects_bad_axes() {
        assert!(Table1D::new(vec![0.0], vec![1.0]).is_err());
        assert!(Table1D::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(Table1D::new(vec![0.0, 1.0], vec![1.0]).is_err());
        let err = Table2D::new(vec![0.0, 1.0], vec![0.0, 1.0], Array2::zeros((3, 2)))
            .expect_err("shape mismatch");
        assert!(matches!(err, DustError::ConfigError(msg) if msg.contains("shape")));
    }
}
