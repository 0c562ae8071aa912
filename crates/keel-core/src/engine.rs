// ─────────────────────────────────────────────────────────────────────
// Keel — Control Loop Orchestrator
// ─────────────────────────────────────────────────────────────────────
//! One full estimate → control → attribute cycle per external tick.
//!
//! The loop is the sole externally invoked entry point of the kernel:
//! it feeds the applied control and the raw observation to the filter,
//! asks the LQR for the next optimal control, attributes it per channel,
//! and appends the tick to the bounded ring history.

use serde::{Deserialize, Serialize};

use keel_control::{AttributionAnalyzer, LqrController};
use keel_estimator::{NoiseModel, SigmaWeights, SystemModel, UkfEstimator};
use keel_types::{CycleRecord, CycleResult, EngineConfig, KeelError, KeelResult};

use crate::ring::RingBuffer;

/// Loop lifecycle. The loop itself never halts; emergency-stop semantics
/// belong to the actuators downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Running,
}

/// Introspection snapshot returned by [`ControlLoop::diagnostics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub model: SystemModel,
    pub noise: NoiseModel,
    pub ukf: SigmaWeights,
    pub setpoint: f64,
    pub gain: Vec<f64>,
    pub phi_deviation: f64,
    pub phi_reg_weight: f64,
    pub history_length: usize,
    pub state: LoopState,
}

/// The per-tick orchestration loop.
///
/// Synchronous and single-owner: `step` runs to completion with no
/// suspension points and is not re-entrant; callers serialize access to
/// one instance. Independent instances share no state.
pub struct ControlLoop {
    config: EngineConfig,
    estimator: UkfEstimator,
    controller: LqrController,
    analyzer: AttributionAnalyzer,
    channel_names: Vec<String>,
    sensitivities: Vec<f64>,
    history: RingBuffer<CycleRecord>,
    tick: u64,
    state: LoopState,
}

impl ControlLoop {
    /// Validate the configuration, build the filter, and solve for the
    /// controller gain. Configuration faults are fatal here, never later.
    pub fn new(config: EngineConfig) -> KeelResult<Self> {
        config.validate()?;
        let controller = LqrController::from_config(&config)?;
        Ok(Self {
            estimator: UkfEstimator::from_config(&config),
            controller,
            analyzer: AttributionAnalyzer::from_config(&config),
            channel_names: config.channel_names(),
            sensitivities: config.sensitivities(),
            history: RingBuffer::new(config.history_capacity),
            tick: 0,
            state: LoopState::Idle,
            config,
        })
    }

    /// Run one control cycle against the applied control vector and the
    /// raw observation.
    ///
    /// Fails only on a control vector of the wrong length; all numerical
    /// trouble is absorbed into degraded diagnostics inside the result.
    pub fn step(&mut self, control: &[f64], observation: f64) -> KeelResult<CycleResult> {
        if control.len() != self.sensitivities.len() {
            return Err(KeelError::Validation(format!(
                "control vector length {} != channel count {}",
                control.len(),
                self.sensitivities.len()
            )));
        }

        self.state = LoopState::Running;
        self.tick += 1;

        let estimate = self.estimator.step(control, observation);
        let decision = self.controller.compute_control(estimate.s);
        let attribution =
            self.analyzer
                .analyze(&self.channel_names, &self.sensitivities, &decision.control);

        self.history.push(CycleRecord {
            tick: self.tick,
            s: estimate.s,
            observation,
            control: decision.control.clone(),
            innovation: estimate.innovation,
            loss: estimate.loss,
        });

        Ok(CycleResult {
            tick: self.tick,
            estimate,
            decision,
            attribution,
        })
    }

    /// Return the estimator to its configured prior and clear history.
    pub fn reset(&mut self) {
        log::info!("control loop reset to prior after {} ticks", self.tick);
        self.estimator.reset();
        self.history.clear();
        self.tick = 0;
        self.state = LoopState::Idle;
    }

    /// Reset with an overridden prior mean.
    pub fn reset_to(&mut self, initial_state: f64) {
        self.estimator.reset_to(initial_state);
        self.history.clear();
        self.tick = 0;
        self.state = LoopState::Idle;
    }

    /// Move the stability target; re-solves the Riccati recursion.
    pub fn set_setpoint(&mut self, target: f64) -> KeelResult<()> {
        self.controller.set_setpoint(target)
    }

    /// Replace the cost weights; re-solves the Riccati recursion.
    pub fn update_costs(&mut self, state_cost: f64, effort_costs: &[f64]) -> KeelResult<()> {
        self.controller.update_costs(state_cost, effort_costs)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            model: self.estimator.model().clone(),
            noise: self.estimator.noise().clone(),
            ukf: *self.estimator.weights(),
            setpoint: self.controller.setpoint(),
            gain: self.controller.gain().to_vec(),
            phi_deviation: self.estimator.model().phi_deviation(),
            phi_reg_weight: self.config.phi_reg_weight,
            history_length: self.history.len(),
            state: self.state,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn history(&self) -> impl Iterator<Item = &CycleRecord> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_loop() -> ControlLoop {
        ControlLoop::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_step_returns_well_formed_result() {
        let mut lp = default_loop();
        let result = lp.step(&[0.0, 0.0], 0.9).unwrap();
        assert_eq!(result.tick, 1);
        assert_eq!(result.decision.control.len(), 2);
        assert!(result.estimate.s.is_finite());
        assert!(result.estimate.variance >= 0.0);
        assert!(result.attribution.entries.len() <= 3);
    }

    #[test]
    fn test_first_step_starts_running() {
        let mut lp = default_loop();
        assert_eq!(lp.state(), LoopState::Idle);
        lp.step(&[0.0, 0.0], 0.9).unwrap();
        assert_eq!(lp.state(), LoopState::Running);
        lp.step(&[0.0, 0.0], 0.9).unwrap();
        assert_eq!(lp.state(), LoopState::Running);
    }

    #[test]
    fn test_wrong_control_length_rejected() {
        let mut lp = default_loop();
        match lp.step(&[0.0], 0.9) {
            Err(KeelError::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other.map(|r| r.tick)),
        }
        // The rejected call must not consume a tick.
        assert_eq!(lp.tick(), 0);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut cfg = EngineConfig::default();
        cfg.alpha = -1.0;
        assert!(ControlLoop::new(cfg).is_err());
    }

    #[test]
    fn test_history_bounded_with_exact_oldest() {
        let mut cfg = EngineConfig::default();
        cfg.history_capacity = 10;
        let mut lp = ControlLoop::new(cfg).unwrap();
        for _ in 0..25 {
            lp.step(&[0.0, 0.0], 0.9).unwrap();
        }
        assert_eq!(lp.history_len(), 10);
        let oldest = lp.history().next().unwrap();
        // After N=25 ticks at capacity 10 the oldest record is tick 16.
        assert_eq!(oldest.tick, 16);
        let latest = lp.history().last().unwrap();
        assert_eq!(latest.tick, 25);
    }

    #[test]
    fn test_contraction_to_fixed_point() {
        // With an agreeing zero observation the doubly saturating process
        // contracts to its fixed point at the origin.
        let mut lp = default_loop();
        let mut last = lp.step(&[0.0, 0.0], 0.0).unwrap();
        for _ in 1..50 {
            last = lp.step(&[0.0, 0.0], 0.0).unwrap();
        }
        assert!(last.estimate.s.abs() < 1e-3, "s = {}", last.estimate.s);
        assert!(
            (last.estimate.bifurcation_risk - 1.0).abs() < 1e-3,
            "risk = {}",
            last.estimate.bifurcation_risk
        );
    }

    #[test]
    fn test_constant_observation_settles() {
        let mut lp = default_loop();
        let mut previous = lp.step(&[0.0, 0.0], 0.95).unwrap();
        let mut delta = f64::MAX;
        for _ in 1..50 {
            let result = lp.step(&[0.0, 0.0], 0.95).unwrap();
            delta = (result.estimate.s - previous.estimate.s).abs();
            assert!(result.estimate.s > -0.999 && result.estimate.s < 0.999);
            assert!(result.estimate.variance >= 0.0);
            assert!(!result.estimate.degraded);
            previous = result;
        }
        assert!(delta < 1e-3, "estimate still moving by {delta} after 50 ticks");
        assert!((0.0..=1.0).contains(&previous.estimate.confidence));
    }

    #[test]
    fn test_nan_observation_degrades_without_corruption() {
        let mut lp = default_loop();
        let clean = lp.step(&[0.0, 0.0], 0.9).unwrap();
        let poisoned = lp.step(&[0.0, 0.0], f64::NAN).unwrap();
        assert!(poisoned.estimate.degraded);
        assert_eq!(poisoned.estimate.s, clean.estimate.s);
        assert!(poisoned.estimate.s.is_finite());
        assert!(poisoned.estimate.variance.is_finite());
        // The loop keeps answering normally afterward.
        let recovered = lp.step(&[0.0, 0.0], 0.9).unwrap();
        assert!(!recovered.estimate.degraded);
    }

    #[test]
    fn test_out_of_range_observation_absorbed() {
        let mut lp = default_loop();
        let result = lp.step(&[0.0, 0.0], 1e6).unwrap();
        assert!(result.estimate.s.is_finite());
        assert!(result.estimate.s > -0.999 && result.estimate.s < 0.999);
    }

    #[test]
    fn test_reset_restores_prior_and_clears_history() {
        let mut lp = default_loop();
        for _ in 0..5 {
            lp.step(&[0.5, 0.5], 0.2).unwrap();
        }
        lp.reset();
        assert_eq!(lp.state(), LoopState::Idle);
        assert_eq!(lp.tick(), 0);
        assert_eq!(lp.history_len(), 0);
        let result = lp.step(&[0.0, 0.0], 0.95).unwrap();
        assert_eq!(result.tick, 1);
    }

    #[test]
    fn test_reset_to_overridden_prior() {
        let mut lp = default_loop();
        lp.step(&[0.0, 0.0], 0.9).unwrap();
        lp.reset_to(0.2);
        let diag = lp.diagnostics();
        assert_eq!(diag.history_length, 0);
        assert_eq!(diag.state, LoopState::Idle);
    }

    #[test]
    fn test_set_setpoint_updates_diagnostics() {
        let mut lp = default_loop();
        lp.set_setpoint(0.6).unwrap();
        assert!((lp.diagnostics().setpoint - 0.6).abs() < 1e-12);
        assert!(lp.set_setpoint(2.0).is_err());
    }

    #[test]
    fn test_update_costs_singular_is_fatal() {
        let mut lp = default_loop();
        assert!(lp.update_costs(1.0, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_diagnostics_snapshot() {
        let lp = default_loop();
        let diag = lp.diagnostics();
        assert!((diag.model.memory - 0.95).abs() < 1e-12);
        assert_eq!(diag.gain.len(), 2);
        assert!((diag.noise.process - 1e-4).abs() < 1e-12);
        assert_eq!(diag.history_length, 0);
        assert_eq!(diag.state, LoopState::Idle);
        assert!(diag.phi_deviation.is_finite());
    }

    #[test]
    fn test_attribution_consistency_through_loop() {
        let mut lp = default_loop();
        // Drive the state below the setpoint so the controller acts.
        let mut result = lp.step(&[0.0, 0.0], 0.1).unwrap();
        for _ in 0..5 {
            result = lp.step(&[0.0, 0.0], 0.1).unwrap();
        }
        let total: f64 = result.attribution.entries.iter().map(|e| e.share).sum();
        if result.decision.control.iter().any(|&u| u != 0.0) {
            assert!((total - 1.0).abs() < 1e-9, "shares sum to {total}");
            let top = result.attribution.top().unwrap();
            for entry in &result.attribution.entries {
                assert!(top.contribution.abs() >= entry.contribution.abs());
            }
        } else {
            assert_eq!(total, 0.0);
        }
    }

    #[test]
    fn test_independent_loops_share_nothing() {
        let mut a = default_loop();
        let mut b = default_loop();
        a.step(&[1.0, 1.0], -0.5).unwrap();
        let rb = b.step(&[0.0, 0.0], 0.95).unwrap();
        assert_eq!(rb.tick, 1);
        assert!(rb.estimate.s > 0.0);
    }
}
