// ─────────────────────────────────────────────────────────────────────
// Keel — Cycle Result and Record Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// Numerical safety band for the latent stability state. The saturating
/// transition already bounds the state in (-1, 1); this band is the
/// re-clamp applied after every update.
pub const STATE_FLOOR: f64 = -0.999;
pub const STATE_CEILING: f64 = 0.999;

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to the nearest bound.
#[inline]
pub fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_finite: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_finite: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Re-clamp the latent state into its numerical safety band.
#[inline]
pub fn clamp_state(value: f64) -> f64 {
    clamp_finite(value, STATE_FLOOR, STATE_CEILING)
}

/// One tick's filter output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEstimate {
    /// Latent stability estimate s, in (-0.999, 0.999).
    pub s: f64,
    /// Estimation variance P, >= 0.
    pub variance: f64,
    /// Measurement innovation y - z_pred.
    pub innovation: f64,
    /// Kalman gain applied this tick.
    pub gain: f64,
    /// 1 - P, clamped to [0, 1].
    pub confidence: f64,
    /// 1 - s: estimated closeness to a regime change.
    pub bifurcation_risk: f64,
    /// | |A| / sum|B_i| - phi |, the golden-ratio deviation diagnostic.
    /// Reported only; never fed back into the model.
    pub phi_deviation: f64,
    /// innovation^2 + phi_reg_weight * phi_deviation^2.
    pub loss: f64,
    /// True when this tick recovered from a numerical fault by holding the
    /// previous state.
    pub degraded: bool,
}

/// One tick's controller output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDecision {
    /// Clamped optimal control u*, one entry per channel.
    pub control: Vec<f64>,
    /// Pre-clamp control -K * error.
    pub raw: Vec<f64>,
    /// Tracking error setpoint - s.
    pub error: f64,
    /// True when any channel was clamped to its bounds.
    pub saturated: bool,
}

/// One channel's share of the instability-driving term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionEntry {
    pub channel: String,
    /// Signed contribution B_i * u_i.
    pub contribution: f64,
    /// |contribution| / sum of |contributions|; 0 when all are zero.
    pub share: f64,
}

/// Ranked per-channel force attribution for one cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributionReport {
    /// Entries ranked descending by |contribution|, capped at top_n.
    pub entries: Vec<AttributionEntry>,
    /// Net push toward/away from stability: sum of all contributions,
    /// including channels below the top_n cutoff.
    pub raw_instability: f64,
}

impl AttributionReport {
    /// The dominant channel, if any contribution is non-zero.
    pub fn top(&self) -> Option<&AttributionEntry> {
        self.entries.first()
    }
}

/// Aggregate output of one control cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub tick: u64,
    pub estimate: StateEstimate,
    pub decision: ControlDecision,
    pub attribution: AttributionReport,
}

/// One tick's history record, stored in the bounded ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub tick: u64,
    pub s: f64,
    pub observation: f64,
    pub control: Vec<f64>,
    pub innovation: f64,
    pub loss: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_finite_nan() {
        assert_eq!(clamp_finite(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_clamp_finite_pos_inf() {
        assert_eq!(clamp_finite(f64::INFINITY, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_clamp_finite_neg_inf() {
        assert_eq!(clamp_finite(f64::NEG_INFINITY, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_clamp_state_band() {
        assert_eq!(clamp_state(1.5), STATE_CEILING);
        assert_eq!(clamp_state(-1.5), STATE_FLOOR);
        assert_eq!(clamp_state(0.42), 0.42);
    }

    #[test]
    fn test_attribution_top_empty() {
        let report = AttributionReport::default();
        assert!(report.top().is_none());
    }

    #[test]
    fn test_attribution_top_ranked() {
        let report = AttributionReport {
            entries: vec![
                AttributionEntry {
                    channel: "a".into(),
                    contribution: -0.3,
                    share: 0.75,
                },
                AttributionEntry {
                    channel: "b".into(),
                    contribution: 0.1,
                    share: 0.25,
                },
            ],
            raw_instability: -0.2,
        };
        assert_eq!(report.top().unwrap().channel, "a");
    }
}
