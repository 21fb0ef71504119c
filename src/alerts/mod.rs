pub mod escalation;
pub mod sentinel;
pub mod step_counter;

pub use escalation::{AlarmTrigger, EscalationEngine};
pub use sentinel::PeriodicSentinel;
pub use step_counter::AlertStepCounter;

use std::time::Duration;

use serde::Serialize;

/// Alarm threshold for one indicator class: alert once the count exceeds
/// `base`, then again every `step` additional units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Threshold {
    pub base: u32,
    pub step: u32,
}

impl Threshold {
    pub const fn new(base: u32, step: u32) -> Self {
        Self { base, step }
    }

    pub fn is_exceeded(&self, count: f64) -> bool {
        count > f64::from(self.base)
    }

    /// Step index reached by `count`, or `None` while at or below the base.
    pub fn step_for(&self, count: f64) -> Option<u32> {
        if !self.is_exceeded(count) {
            return None;
        }
        let above = count - f64::from(self.base);
        let step = f64::from(self.step.max(1));
        // Counts are unbounded on the wire; the index saturates instead of wrapping.
        let index = (above / step).floor().min(f64::from(u32::MAX - 1));
        Some(index as u32 + 1)
    }
}

pub const MICROSLEEP_THRESHOLD: Threshold = Threshold::new(1, 1);
pub const YAWN_THRESHOLD: Threshold = Threshold::new(2, 2);
pub const SENTINEL_INTERVAL: Duration = Duration::from_millis(2500);
