// ─────────────────────────────────────────────────────────────────────
// Keel — Domain Actuator Contract
// ─────────────────────────────────────────────────────────────────────
//! The collaborator boundary for domain actuators: translators that map
//! the generic control vector into domain-specific outputs. The kernel
//! makes no assumption about actuator internals beyond this contract.

use serde::{Deserialize, Serialize};

/// Default hysteresis margin above the intervention threshold.
pub const HYSTERESIS_MARGIN: f64 = 0.05;

/// What a domain actuator reports back for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainOutput {
    /// Domain-specific action tag.
    pub action: String,
    /// True while the actuator holds its intervention state.
    pub intervention: bool,
}

/// One domain translator consuming the kernel's control output.
pub trait Actuator {
    fn actuate(&mut self, control: &[f64], current_state: f64) -> DomainOutput;
}

/// Intervention latch with hysteresis.
///
/// Engages when the state drops below `threshold`; releases only once
/// the state recovers past `threshold + margin`, so a state hovering at
/// the threshold cannot flap the intervention flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionLatch {
    threshold: f64,
    margin: f64,
    engaged: bool,
}

impl InterventionLatch {
    pub fn new(threshold: f64) -> Self {
        Self::with_margin(threshold, HYSTERESIS_MARGIN)
    }

    pub fn with_margin(threshold: f64, margin: f64) -> Self {
        Self {
            threshold,
            margin: margin.max(0.0),
            engaged: false,
        }
    }

    /// Feed the current state; returns whether the latch is engaged.
    pub fn update(&mut self, current_state: f64) -> bool {
        if self.engaged {
            if current_state > self.threshold + self.margin {
                self.engaged = false;
            }
        } else if current_state < self.threshold {
            self.engaged = true;
        }
        self.engaged
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn reset(&mut self) {
        self.engaged = false;
    }
}
