// ─────────────────────────────────────────────────────────────────────
// Keel — Optimal Control Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Optimal control for the Keel stability kernel: a discrete-time LQR
//! solved by iterative Riccati recursion, and the per-channel force
//! attribution that explains which input drives instability.

pub mod attribution;
pub mod lqr;

pub use attribution::AttributionAnalyzer;
pub use lqr::LqrController;
