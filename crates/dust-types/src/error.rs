// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DustError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Step rejected after {attempts} attempts: {last_error}")]
    RetryCapExceeded { attempts: usize, last_error: String },

    #[error("Table '{table}' queried at {query} outside [{lo}, {hi}]")]
    TableRange {
        table: String,
        query: f64,
        lo: f64,
        hi: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DustResult<T> = Result<T, DustError>;

/// Reject a non-finite scalar with a `Numerical` error naming the quantity.
pub fn ensure_finite(name: &str, value: f64) -> DustResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DustError::Numerical(format!("{name} must be finite, got {value}")))
    }
}
