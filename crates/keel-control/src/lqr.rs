// ─────────────────────────────────────────────────────────────────────
// Keel — Discrete-Time LQR Controller
// ─────────────────────────────────────────────────────────────────────
//! Linear-quadratic regulator over the scalar stability state with an
//! m-channel input, minimizing
//!
//!   Σ (setpoint - s)²·Q_cost + uᵀ·R_cost·u
//!
//! subject to per-channel saturation. The cost-to-go P is the fixed
//! point of the discrete Riccati recursion
//!
//!   S = R_cost + Bᵀ·P·B
//!   K = S⁻¹·Bᵀ·P·A
//!   P' = Aᵀ·P·A - (Aᵀ·P·B)·K + Q_cost
//!
//! solved at construction and re-solved on every setpoint/cost change,
//! so the gain is never stale.

use nalgebra::{DMatrix, DVector};

use keel_types::{ControlDecision, EngineConfig, KeelError, KeelResult};

/// Determinant floor below which the input-cost matrix S is treated as
/// singular. Cost entries are O(1), so an exactly rank-deficient S lands
/// many orders of magnitude under this.
const SINGULARITY_FLOOR: f64 = 1e-12;

/// LQR controller with a converged Riccati gain.
///
/// A failed solve (singular input-cost matrix) leaves the previous gain
/// untouched; the caller must treat the error as fatal and not call
/// [`LqrController::compute_control`] afterward.
pub struct LqrController {
    memory: f64,
    sensitivity: DVector<f64>,
    state_cost: f64,
    effort_costs: DVector<f64>,
    setpoint: f64,
    bounds: Vec<(f64, f64)>,
    max_iterations: usize,
    tolerance: f64,
    gain: DVector<f64>,
    cost_to_go: f64,
    iterations: usize,
}

impl LqrController {
    /// Build from a validated configuration and solve for the gain.
    pub fn from_config(config: &EngineConfig) -> KeelResult<Self> {
        let m = config.channel_count();
        let mut controller = Self {
            memory: config.memory,
            sensitivity: DVector::from_vec(config.sensitivities()),
            state_cost: config.state_cost,
            effort_costs: DVector::from_vec(config.effort_costs.clone()),
            setpoint: config.setpoint,
            bounds: config.channels.iter().map(|c| (c.min, c.max)).collect(),
            max_iterations: config.riccati_max_iterations,
            tolerance: config.riccati_tolerance,
            gain: DVector::zeros(m),
            cost_to_go: 0.0,
            iterations: 0,
        };
        controller.solve()?;
        Ok(controller)
    }

    /// Converged feedback gain K, one entry per channel.
    pub fn gain(&self) -> &[f64] {
        self.gain.as_slice()
    }

    /// Converged cost-to-go P.
    pub fn cost_to_go(&self) -> f64 {
        self.cost_to_go
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Iterations the last solve took.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Iterate the Riccati recursion to its fixed point.
    fn solve(&mut self) -> KeelResult<()> {
        let a = self.memory;
        let b = &self.sensitivity;
        let r = DMatrix::from_diagonal(&self.effort_costs);

        let mut p = self.state_cost;
        let mut gain = DVector::zeros(b.len());
        let mut converged = false;
        let mut iterations = self.max_iterations;

        for iter in 0..self.max_iterations {
            let s = &r + (b * b.transpose()) * p;
            if s.determinant().abs() < SINGULARITY_FLOOR {
                return Err(KeelError::Riccati(
                    "input-cost matrix S is singular".to_string(),
                ));
            }
            let s_inv = s.try_inverse().ok_or_else(|| {
                KeelError::Riccati("input-cost matrix S is singular".to_string())
            })?;
            gain = (s_inv * b) * (p * a);

            let p_next = a * p * a - (a * p) * b.dot(&gain) + self.state_cost;
            if !p_next.is_finite() {
                return Err(KeelError::Numerical(format!(
                    "riccati recursion produced non-finite cost-to-go at iteration {iter}"
                )));
            }

            let delta = (p_next - p).abs();
            p = p_next;
            if delta < self.tolerance {
                converged = true;
                iterations = iter + 1;
                break;
            }
        }

        if !converged {
            log::warn!(
                "riccati recursion hit the {}-iteration cap without reaching tolerance {}",
                self.max_iterations,
                self.tolerance
            );
        }

        self.gain = gain;
        self.cost_to_go = p;
        self.iterations = iterations;
        Ok(())
    }

    /// Optimal control for the current estimate: u_raw = -K·(setpoint - s),
    /// clamped per channel.
    pub fn compute_control(&self, s: f64) -> ControlDecision {
        let error = self.setpoint - s;
        let raw: Vec<f64> = self.gain.iter().map(|k| -k * error).collect();
        let control: Vec<f64> = raw
            .iter()
            .zip(self.bounds.iter())
            .map(|(&u, &(lo, hi))| u.clamp(lo, hi))
            .collect();
        let saturated = control
            .iter()
            .zip(raw.iter())
            .any(|(clamped, unclamped)| clamped != unclamped);

        ControlDecision {
            control,
            raw,
            error,
            saturated,
        }
    }

    /// Move the stability target and re-solve.
    pub fn set_setpoint(&mut self, target: f64) -> KeelResult<()> {
        if !(0.0..=1.0).contains(&target) {
            return Err(KeelError::Config(format!(
                "setpoint must be in [0, 1], got {target}"
            )));
        }
        self.setpoint = target;
        self.solve()
    }

    /// Replace the tracking/effort cost weights and re-solve.
    pub fn update_costs(&mut self, state_cost: f64, effort_costs: &[f64]) -> KeelResult<()> {
        if state_cost < 0.0 {
            return Err(KeelError::Config(format!(
                "state_cost must be >= 0, got {state_cost}"
            )));
        }
        if effort_costs.len() != self.effort_costs.len() {
            return Err(KeelError::Config(format!(
                "effort_costs length {} != channel count {}",
                effort_costs.len(),
                self.effort_costs.len()
            )));
        }
        if effort_costs.iter().any(|&c| c < 0.0) {
            return Err(KeelError::Config(
                "effort_costs must be non-negative".to_string(),
            ));
        }
        self.state_cost = state_cost;
        self.effort_costs = DVector::from_column_slice(effort_costs);
        self.solve()
    }
}
