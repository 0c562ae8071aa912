// ─────────────────────────────────────────────────────────────────────
// Keel — Per-Channel Force Attribution
// ─────────────────────────────────────────────────────────────────────
//! Explains which control channel is driving instability on a given
//! cycle: each channel's signed contribution is B_i·u_i, ranked by
//! magnitude. Deterministic and stateless — no filtering or smoothing
//! of its own.

use std::cmp::Ordering;

use keel_types::{AttributionEntry, AttributionReport, EngineConfig};

/// Ranks per-channel contributions to the instability-driving term.
#[derive(Debug, Clone, Copy)]
pub struct AttributionAnalyzer {
    top_n: usize,
}

impl AttributionAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.top_contributors)
    }

    /// Decompose one cycle's control vector into ranked channel shares.
    ///
    /// `raw_instability` sums every channel, including those below the
    /// top-N cutoff; shares are magnitude fractions and sum to 1 unless
    /// all contributions are zero.
    pub fn analyze(
        &self,
        names: &[String],
        sensitivity: &[f64],
        control: &[f64],
    ) -> AttributionReport {
        let contributions: Vec<f64> = sensitivity
            .iter()
            .zip(control.iter())
            .map(|(b, u)| b * u)
            .collect();
        let total_magnitude: f64 = contributions.iter().map(|c| c.abs()).sum();
        let raw_instability: f64 = contributions.iter().sum();

        let mut entries: Vec<AttributionEntry> = names
            .iter()
            .zip(contributions.iter())
            .map(|(name, &c)| AttributionEntry {
                channel: name.clone(),
                contribution: c,
                share: if total_magnitude > 0.0 {
                    c.abs() / total_magnitude
                } else {
                    0.0
                },
            })
            .collect();

        entries.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(Ordering::Equal)
        });
        entries.truncate(self.top_n);

        AttributionReport {
            entries,
            raw_instability,
        }
    }
}
