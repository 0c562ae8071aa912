// ─────────────────────────────────────────────────────────────────────
// Keel — Scalar Unscented Kalman Filter
// ─────────────────────────────────────────────────────────────────────
//! Unscented Kalman filter over the scalar stability state.
//!
//! For state dimension n = 1 the unscented transform needs three sigma
//! points: the mean and one symmetric pair at ±γ√P. Both the transition
//! and the observation saturate through tanh, so the points are pushed
//! through the full non-linearity rather than a Jacobian.

use serde::{Deserialize, Serialize};

use keel_types::{clamp_finite, clamp_state, EngineConfig, StateEstimate};

use crate::model::{NoiseModel, SystemModel};

/// State dimension. The latent stability measure is a single scalar.
const N: f64 = 1.0;

/// Innovation-covariance floor below which the update is treated as
/// filter divergence.
const PZZ_FLOOR: f64 = 1e-12;

/// Precomputed unscented-transform weights for n = 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SigmaWeights {
    /// Composite scaling λ = α²(n + κ) - n.
    pub lambda: f64,
    /// Sigma-point spread γ = √(n + λ).
    pub gamma: f64,
    /// Center mean weight λ / (n + λ).
    pub wm0: f64,
    /// Center covariance weight wm0 + (1 - α² + β).
    pub wc0: f64,
    /// Symmetric-pair weight 1 / (2(n + λ)).
    pub wi: f64,
}

impl SigmaWeights {
    pub fn new(alpha: f64, beta: f64, kappa: f64) -> Self {
        let lambda = alpha * alpha * (N + kappa) - N;
        let scale = N + lambda;
        Self {
            lambda,
            gamma: scale.sqrt(),
            wm0: lambda / scale,
            wc0: lambda / scale + (1.0 - alpha * alpha + beta),
            wi: 1.0 / (2.0 * scale),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.alpha, config.beta, config.kappa)
    }

    /// Weighted mean over the three transformed points.
    #[inline]
    fn mean(&self, pts: &[f64; 3]) -> f64 {
        self.wm0 * pts[0] + self.wi * (pts[1] + pts[2])
    }

    /// Weighted second moment around `mean` over the three points.
    #[inline]
    fn covariance(&self, pts: &[f64; 3], mean: f64) -> f64 {
        let d0 = pts[0] - mean;
        let d1 = pts[1] - mean;
        let d2 = pts[2] - mean;
        self.wc0 * d0 * d0 + self.wi * (d1 * d1 + d2 * d2)
    }
}

/// Scalar unscented Kalman filter tracking the latent stability state.
///
/// Owns the state exclusively: `s` and `P` mutate only through
/// [`UkfEstimator::step`] and the reset calls.
pub struct UkfEstimator {
    model: SystemModel,
    noise: NoiseModel,
    weights: SigmaWeights,
    phi_reg_weight: f64,
    prior_state: f64,
    prior_variance: f64,
    s: f64,
    p: f64,
}

impl UkfEstimator {
    pub fn new(
        model: SystemModel,
        noise: NoiseModel,
        weights: SigmaWeights,
        prior_state: f64,
        prior_variance: f64,
        phi_reg_weight: f64,
    ) -> Self {
        Self {
            model,
            noise,
            weights,
            phi_reg_weight,
            prior_state,
            prior_variance,
            s: clamp_state(prior_state),
            p: prior_variance.max(0.0),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            SystemModel::from_config(config),
            NoiseModel::from_config(config),
            SigmaWeights::from_config(config),
            config.initial_state,
            config.initial_variance,
            config.phi_reg_weight,
        )
    }

    pub fn state(&self) -> f64 {
        self.s
    }

    pub fn variance(&self) -> f64 {
        self.p
    }

    pub fn model(&self) -> &SystemModel {
        &self.model
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn weights(&self) -> &SigmaWeights {
        &self.weights
    }

    /// Restore the configured prior.
    pub fn reset(&mut self) {
        self.s = clamp_state(self.prior_state);
        self.p = self.prior_variance.max(0.0);
    }

    /// Restore with an overridden prior mean; the prior variance stays
    /// the configured one.
    pub fn reset_to(&mut self, initial_state: f64) {
        self.s = clamp_state(initial_state);
        self.p = self.prior_variance.max(0.0);
    }

    /// Sigma points χ = {s, s + γ√P, s - γ√P}.
    fn sigma_points(&self) -> [f64; 3] {
        let spread = self.weights.gamma * self.p.max(0.0).sqrt();
        [self.s, self.s + spread, self.s - spread]
    }

    /// One predict/update cycle against a control input and an observation.
    ///
    /// Never fails: numerical trouble holds the previous state and flags
    /// the estimate as degraded.
    pub fn step(&mut self, control: &[f64], observation: f64) -> StateEstimate {
        if !observation.is_finite() {
            log::warn!("non-finite observation {observation}: holding previous state");
            return self.held_estimate();
        }
        // The sensor is a saturating map into (-1, 1); anything outside is
        // physically insane and gets pulled back to the boundary.
        let y = if !(-1.0..=1.0).contains(&observation) {
            log::warn!("observation {observation} outside [-1, 1], clamping");
            observation.clamp(-1.0, 1.0)
        } else {
            observation
        };

        // Predict: push the sigma points through the saturating transition.
        let chi = self.sigma_points();
        let ys = [
            self.model.transition(chi[0], control),
            self.model.transition(chi[1], control),
            self.model.transition(chi[2], control),
        ];
        let s_pred = self.weights.mean(&ys);
        let p_pred = self.weights.covariance(&ys, s_pred) + self.noise.process;

        // Update: push the predicted points through the observation map.
        let zs = [
            self.model.observe(ys[0]),
            self.model.observe(ys[1]),
            self.model.observe(ys[2]),
        ];
        let z_pred = self.weights.mean(&zs);
        let pzz = self.weights.covariance(&zs, z_pred) + self.noise.measurement;

        if pzz < PZZ_FLOOR {
            log::warn!("innovation covariance {pzz:.3e} below floor: filter divergence");
            return self.held_estimate();
        }

        let d0 = (ys[0] - s_pred) * (zs[0] - z_pred);
        let d1 = (ys[1] - s_pred) * (zs[1] - z_pred);
        let d2 = (ys[2] - s_pred) * (zs[2] - z_pred);
        let pxz = self.weights.wc0 * d0 + self.weights.wi * (d1 + d2);

        let gain = pxz / pzz;
        let innovation = y - z_pred;

        self.s = clamp_state(s_pred + gain * innovation);
        self.p = (p_pred - gain * pzz * gain).max(0.0);

        self.estimate(innovation, gain, false)
    }

    /// Assemble the per-tick output from the current state.
    fn estimate(&self, innovation: f64, gain: f64, degraded: bool) -> StateEstimate {
        let phi_deviation = self.model.phi_deviation();
        StateEstimate {
            s: self.s,
            variance: self.p,
            innovation,
            gain,
            confidence: clamp_finite(1.0 - self.p, 0.0, 1.0),
            bifurcation_risk: 1.0 - self.s,
            phi_deviation,
            loss: innovation * innovation + self.phi_reg_weight * phi_deviation * phi_deviation,
            degraded,
        }
    }

    /// Degraded output: previous state held, zero innovation and gain.
    fn held_estimate(&self) -> StateEstimate {
        self.estimate(0.0, 0.0, true)
    }
}
