// ─────────────────────────────────────────────────────────────────────
// Keel — Saturating Process Model
// ─────────────────────────────────────────────────────────────────────
//! The latent stability process and its observation channel:
//!
//!   s_{t+1} = tanh(A·s_t + B·u_t)
//!   y_t     = tanh(H·s_t)
//!
//! A is the memory coefficient, B the per-channel control sensitivities,
//! H the observation gain. Both maps saturate into (-1, 1).

use serde::{Deserialize, Serialize};

use keel_types::EngineConfig;

/// The golden ratio (1 + sqrt 5) / 2, reference value for the
/// memory-to-sensitivity ratio diagnostic.
pub const PHI: f64 = 1.618033988749895;

/// Floor for the sensitivity-magnitude sum in the ratio diagnostic.
const SENSITIVITY_FLOOR: f64 = 1e-12;

/// Linear/non-linear model matrices. Immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemModel {
    /// Memory/inertia coefficient A. |A| < 1 expected.
    pub memory: f64,
    /// Control sensitivities B, one per channel.
    pub sensitivity: Vec<f64>,
    /// Observation gain H.
    pub observation_gain: f64,
}

impl SystemModel {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            memory: config.memory,
            sensitivity: config.sensitivities(),
            observation_gain: config.observation_gain,
        }
    }

    /// Net control push B·u.
    pub fn control_effect(&self, control: &[f64]) -> f64 {
        self.sensitivity
            .iter()
            .zip(control.iter())
            .map(|(b, u)| b * u)
            .sum()
    }

    /// Saturating state transition f(s, u) = tanh(A·s + B·u).
    pub fn transition(&self, s: f64, control: &[f64]) -> f64 {
        (self.memory * s + self.control_effect(control)).tanh()
    }

    /// Saturating observation map h(s) = tanh(H·s).
    pub fn observe(&self, s: f64) -> f64 {
        (self.observation_gain * s).tanh()
    }

    /// Golden-ratio deviation | |A| / Σ|B_i| - φ |.
    ///
    /// Reported as a soft regularization signal only; never used to
    /// retune A or B.
    pub fn phi_deviation(&self) -> f64 {
        let magnitude: f64 = self.sensitivity.iter().map(|b| b.abs()).sum();
        (self.memory.abs() / magnitude.max(SENSITIVITY_FLOOR) - PHI).abs()
    }
}

/// Process and measurement noise variances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseModel {
    /// Process variance Q, >= 0.
    pub process: f64,
    /// Measurement variance R, >= 0.
    pub measurement: f64,
}

impl NoiseModel {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            process: config.process_noise,
            measurement: config.measurement_noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_model() -> SystemModel {
        SystemModel::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_transition_bounded() {
        let model = default_model();
        for s in [-5.0, -1.0, 0.0, 0.5, 1.0, 5.0] {
            let next = model.transition(s, &[1.0, 1.0]);
            assert!(next > -1.0 && next < 1.0, "transition({s}) = {next} escaped (-1, 1)");
        }
    }

    #[test]
    fn test_observe_bounded() {
        let model = default_model();
        for s in [-3.0, 0.0, 3.0] {
            let y = model.observe(s);
            assert!(y > -1.0 && y < 1.0, "observe({s}) = {y} escaped (-1, 1)");
        }
    }

    #[test]
    fn test_control_pushes_state_down() {
        let model = default_model();
        let free = model.transition(0.5, &[0.0, 0.0]);
        let pushed = model.transition(0.5, &[1.0, 1.0]);
        assert!(pushed < free, "negative sensitivities should lower the state");
    }

    #[test]
    fn test_control_effect_dot_product() {
        let model = default_model();
        let effect = model.control_effect(&[1.0, 2.0]);
        assert!((effect - (-0.05 - 0.30)).abs() < 1e-12, "effect = {effect}");
    }

    #[test]
    fn test_phi_deviation_default() {
        let model = default_model();
        // |0.95 / 0.20 - phi| = |4.75 - 1.618...|
        let expected = (4.75 - PHI).abs();
        assert!((model.phi_deviation() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_phi_deviation_zero_sensitivity_finite() {
        let model = SystemModel {
            memory: 0.95,
            sensitivity: vec![0.0, 0.0],
            observation_gain: 1.0,
        };
        assert!(model.phi_deviation().is_finite());
    }
}
