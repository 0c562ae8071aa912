// ─────────────────────────────────────────────────────────────────────
// Keel — Stability Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for Keel — the
//! closed-loop stability estimation-and-control kernel.

pub mod config;
pub mod cycle;
pub mod error;

pub use config::{ChannelConfig, EngineConfig};
pub use cycle::{
    clamp_finite, clamp_state, AttributionEntry, AttributionReport, ControlDecision, CycleRecord,
    CycleResult, StateEstimate, STATE_CEILING, STATE_FLOOR,
};
pub use error::{KeelError, KeelResult};
