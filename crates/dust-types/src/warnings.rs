// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Warnings
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Recoverable-event side channel.
//!
//! Table clamps and PSD repairs do not abort a run; they are counted here
//! and logged through `tracing` so tests and writers can observe them.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A table was queried outside its tabulated range and clamped.
    TableOutOfRange,
    /// Negative or non-finite number densities were repaired.
    PsdSanitized,
    /// An integrator attempt failed its mass-budget check and was retried.
    StepRejected,
    /// A disruption threshold or restitution value disagreed with its reference.
    ThresholdMismatch,
}

impl WarningKind {
    pub const ALL: [WarningKind; 4] = [
        WarningKind::TableOutOfRange,
        WarningKind::PsdSanitized,
        WarningKind::StepRejected,
        WarningKind::ThresholdMismatch,
    ];

    fn slot(self) -> usize {
        match self {
            WarningKind::TableOutOfRange => 0,
            WarningKind::PsdSanitized => 1,
            WarningKind::StepRejected => 2,
            WarningKind::ThresholdMismatch => 3,
        }
    }
}

/// Per-cell warning counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningLog {
    counts: [u64; 4],
    last_message: Option<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: WarningKind, message: &str) {
        self.counts[kind.slot()] += 1;
        warn!(kind = ?kind, count = self.counts[kind.slot()], "{message}");
        self.last_message = Some(message.to_string());
    }

    pub fn count(&self, kind: WarningKind) -> u64 {
        self.counts[kind.slot()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Fold another log's counters into this one.
    pub fn merge(&mut self, other: &WarningLog) {
        for kind in WarningKind::ALL {
            self.counts[kind.slot()] += other.count(kind);
        }
        if other.last_message.is_some() {
            self.last_message.clone_from(&other.last_message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments_only_its_kind() {
        let mut log = WarningLog::new();
        log.record(WarningKind::TableOutOfRange, "qstar clamped");
        log.record(WarningKind::TableOutOfRange, "qstar clamped");
        log.record(WarningKind::PsdSanitized, "bin 3 negative");
        assert_eq!(log.count(WarningKind::TableOutOfRange), 2);
        assert_eq!(log.count(WarningKind::PsdSanitized), 1);
        assert_eq!(log.count(WarningKind::StepRejected), 0);
        assert_eq!(log.total(), 3);
        assert_eq!(log.last_message(), Some("bin 3 negative"));
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = WarningLog::new();
        let mut b = WarningLog::new();
        a.record(WarningKind::StepRejected, "a");
        b.record(WarningKind::StepRejected, "b");
        b.record(WarningKind::ThresholdMismatch, "b2");
        a.merge(&b);
        assert_eq!(a.count(WarningKind::StepRejected), 2);
        assert_eq!(a.count(WarningKind::ThresholdMismatch), 1);
        assert_eq!(a.last_message(), Some("b2"));
    }
}
