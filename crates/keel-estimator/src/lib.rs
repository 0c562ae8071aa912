// ─────────────────────────────────────────────────────────────────────
// Keel — State Estimation Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Latent-state estimation for the Keel stability kernel: the saturating
//! process model and the scalar unscented Kalman filter that tracks the
//! hidden stability margin through it.
//!
//! # Numerical Invariants
//!
//! 1. **The state never escapes its band**: every update re-clamps the
//!    estimate into (-0.999, 0.999), on top of the tanh saturation the
//!    transition already applies.
//!
//! 2. **Variance is never negative**: the covariance downdate is floored
//!    at zero.
//!
//! 3. **Faults degrade, never crash**: a vanishing innovation covariance
//!    or a non-finite observation holds the previous state and raises the
//!    `degraded` diagnostic flag. No NaN propagates out of a step.

pub mod model;
pub mod ukf;

pub use model::{NoiseModel, SystemModel, PHI};
pub use ukf::{SigmaWeights, UkfEstimator};
