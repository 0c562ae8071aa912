// ─────────────────────────────────────────────────────────────────────
// Keel — Control Loop Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! The per-tick orchestration loop of the Keel stability kernel: one
//! estimator → controller → attribution cycle per external tick, with
//! bounded ring history and diagnostics.
//!
//! # Contract Invariants
//!
//! 1. **Every step answers**: a well-formed [`keel_types::CycleResult`]
//!    comes back from every in-contract call; numerical trouble surfaces
//!    through the `degraded` diagnostics flag, never as an error or a
//!    stall.
//!
//! 2. **The gain is never stale**: setpoint and cost changes re-solve the
//!    Riccati recursion before the next cycle runs.
//!
//! 3. **History is bounded**: the ring never exceeds its configured
//!    capacity; eviction is O(1) and silent.
//!
//! 4. **No interior locking**: a loop instance is synchronous and owned;
//!    callers serialize access, independent instances share nothing.

pub mod actuator;
pub mod engine;
pub mod ring;

pub use actuator::{Actuator, DomainOutput, InterventionLatch};
pub use engine::{ControlLoop, Diagnostics, LoopState};
pub use ring::RingBuffer;
