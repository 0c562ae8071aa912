// ─────────────────────────────────────────────────────────────────────
// Keel — Engine Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{KeelError, KeelResult};

/// One named control channel with its physical actuation range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, carried through attribution output.
    pub name: String,
    /// Control sensitivity B_i. Typically negative: positive input pushes
    /// the stability state down.
    pub sensitivity: f64,
    /// Lower actuation bound.
    pub min: f64,
    /// Upper actuation bound.
    pub max: f64,
}

impl ChannelConfig {
    pub fn new(name: &str, sensitivity: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            sensitivity,
            min,
            max,
        }
    }
}

/// Runtime configuration for one Keel control loop.
///
/// Every recognized option is an explicit field with a documented default;
/// there is no fallback option bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Memory/inertia coefficient A of the latent process. |A| < 1 expected.
    /// Default: 0.95.
    pub memory: f64,

    /// Observation gain H. Default: 1.0.
    pub observation_gain: f64,

    /// Ordered control channels (sensitivity B_i plus actuation bounds).
    pub channels: Vec<ChannelConfig>,

    /// Process noise variance Q. Default: 1e-4.
    pub process_noise: f64,

    /// Measurement noise variance R. Default: 1e-3.
    pub measurement_noise: f64,

    /// Prior mean for the latent stability state. Default: 0.95.
    pub initial_state: f64,

    /// Prior variance for the latent stability state. Default: 0.01.
    pub initial_variance: f64,

    /// Sigma-point spread alpha, in (0, 1]. Default: 1.0 — for a scalar
    /// state the conventional tiny spread degenerates the center weight.
    pub alpha: f64,

    /// Prior-knowledge shaping beta. Default: 2.0 (optimal for Gaussian
    /// posteriors).
    pub beta: f64,

    /// Secondary scaling kappa, > -1. Default: 0.0.
    pub kappa: f64,

    /// Stability target the controller regulates toward, in [0, 1].
    /// Default: 0.85.
    pub setpoint: f64,

    /// State tracking cost Q_cost. Default: 1.0.
    pub state_cost: f64,

    /// Per-channel control effort costs (diagonal of R_cost); same length
    /// as `channels`. Default: 0.1 per channel.
    pub effort_costs: Vec<f64>,

    /// Riccati recursion iteration cap. Default: 100.
    pub riccati_max_iterations: usize,

    /// Riccati convergence tolerance. Default: 1e-6.
    pub riccati_tolerance: f64,

    /// Number of ranked attribution entries returned. Default: 3.
    pub top_contributors: usize,

    /// Ring-history capacity in cycles. Default: 1000.
    pub history_capacity: usize,

    /// Weight of the golden-ratio deviation term in the reported loss.
    /// Diagnostic only. Default: 0.01.
    pub phi_reg_weight: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory: 0.95,
            observation_gain: 1.0,
            channels: vec![
                ChannelConfig::new("translational smoothness", -0.05, 0.0, 1.0),
                ChannelConfig::new("resilience", -0.15, 0.0, 1.0),
            ],
            process_noise: 1e-4,
            measurement_noise: 1e-3,
            initial_state: 0.95,
            initial_variance: 0.01,
            alpha: 1.0,
            beta: 2.0,
            kappa: 0.0,
            setpoint: 0.85,
            state_cost: 1.0,
            effort_costs: vec![0.1, 0.1],
            riccati_max_iterations: 100,
            riccati_tolerance: 1e-6,
            top_contributors: 3,
            history_capacity: 1000,
            phi_reg_weight: 0.01,
        }
    }
}

impl EngineConfig {
    /// Number of control channels m.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Control sensitivities B as a vector.
    pub fn sensitivities(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.sensitivity).collect()
    }

    /// Channel names in order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> KeelResult<()> {
        if !self.memory.is_finite() {
            return Err(KeelError::Config(format!(
                "memory must be finite, got {}",
                self.memory
            )));
        }
        if self.memory.abs() >= 1.0 {
            log::warn!(
                "memory |A| = {} >= 1: latent process is not contractive",
                self.memory.abs()
            );
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(KeelError::Config(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.kappa <= -1.0 {
            return Err(KeelError::Config(format!(
                "kappa must be > -1, got {}",
                self.kappa
            )));
        }
        if self.process_noise < 0.0 {
            return Err(KeelError::Config(format!(
                "process_noise must be >= 0, got {}",
                self.process_noise
            )));
        }
        if self.measurement_noise < 0.0 {
            return Err(KeelError::Config(format!(
                "measurement_noise must be >= 0, got {}",
                self.measurement_noise
            )));
        }
        if self.initial_variance < 0.0 {
            return Err(KeelError::Config(format!(
                "initial_variance must be >= 0, got {}",
                self.initial_variance
            )));
        }
        if !(-1.0..=1.0).contains(&self.initial_state) {
            return Err(KeelError::Config(format!(
                "initial_state must be in [-1, 1], got {}",
                self.initial_state
            )));
        }
        if self.channels.is_empty() {
            return Err(KeelError::Config("at least one channel required".to_string()));
        }
        for ch in &self.channels {
            if !ch.sensitivity.is_finite() {
                return Err(KeelError::Config(format!(
                    "channel '{}' sensitivity must be finite, got {}",
                    ch.name, ch.sensitivity
                )));
            }
            if ch.min >= ch.max {
                return Err(KeelError::Config(format!(
                    "channel '{}' bounds inverted: [{}, {}]",
                    ch.name, ch.min, ch.max
                )));
            }
        }
        if self.effort_costs.len() != self.channels.len() {
            return Err(KeelError::Config(format!(
                "effort_costs length {} != channel count {}",
                self.effort_costs.len(),
                self.channels.len()
            )));
        }
        if self.effort_costs.iter().any(|&r| r < 0.0) {
            return Err(KeelError::Config(
                "effort_costs must be non-negative".to_string(),
            ));
        }
        if self.state_cost < 0.0 {
            return Err(KeelError::Config(format!(
                "state_cost must be >= 0, got {}",
                self.state_cost
            )));
        }
        if !(0.0..=1.0).contains(&self.setpoint) {
            return Err(KeelError::Config(format!(
                "setpoint must be in [0, 1], got {}",
                self.setpoint
            )));
        }
        if self.riccati_max_iterations == 0 {
            return Err(KeelError::Config(
                "riccati_max_iterations must be >= 1".to_string(),
            ));
        }
        if self.riccati_tolerance <= 0.0 {
            return Err(KeelError::Config(format!(
                "riccati_tolerance must be > 0, got {}",
                self.riccati_tolerance
            )));
        }
        if self.top_contributors == 0 {
            return Err(KeelError::Config(
                "top_contributors must be >= 1".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(KeelError::Config(
                "history_capacity must be >= 1".to_string(),
            ));
        }
        if self.phi_reg_weight < 0.0 {
            return Err(KeelError::Config(format!(
                "phi_reg_weight must be >= 0, got {}",
                self.phi_reg_weight
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> KeelResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| KeelError::Config(format!("JSON parse error: {e}")))
    }
}
