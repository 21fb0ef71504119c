use serde::Serialize;

use crate::models::IndicatorSnapshot;

use super::{AlertStepCounter, Threshold, MICROSLEEP_THRESHOLD, YAWN_THRESHOLD};

/// Why an alarm was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "source", content = "step")]
pub enum AlarmTrigger {
    MicrosleepStep(u32),
    YawnStep(u32),
    Sentinel,
}

/// Per-event observer: fires at most one alarm per indicator class and step.
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    microsleeps: AlertStepCounter,
    yawns: AlertStepCounter,
}

impl Default for EscalationEngine {
    fn default() -> Self {
        Self::new(MICROSLEEP_THRESHOLD, YAWN_THRESHOLD)
    }
}

impl EscalationEngine {
    pub fn new(microsleep: Threshold, yawn: Threshold) -> Self {
        Self {
            microsleeps: AlertStepCounter::new(microsleep),
            yawns: AlertStepCounter::new(yawn),
        }
    }

    pub fn evaluate(&mut self, snapshot: &IndicatorSnapshot) -> Vec<AlarmTrigger> {
        let mut triggers = Vec::with_capacity(2);
        if let Some(step) = self.microsleeps.observe(snapshot.microsleeps) {
            triggers.push(AlarmTrigger::MicrosleepStep(step));
        }
        if let Some(step) = self.yawns.observe(f64::from(snapshot.yawns)) {
            triggers.push(AlarmTrigger::YawnStep(step));
        }
        triggers
    }

    pub fn reset(&mut self) {
        self.microsleeps.reset();
        self.yawns.reset();
    }

    pub fn last_fired_steps(&self) -> (u32, u32) {
        (
            self.microsleeps.last_fired_step(),
            self.yawns.last_fired_step(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(microsleeps: f64, yawns: u32) -> IndicatorSnapshot {
        IndicatorSnapshot {
            microsleeps,
            yawns,
            ..IndicatorSnapshot::zero()
        }
    }

    #[test]
    fn both_classes_can_fire_on_one_update() {
        let mut engine = EscalationEngine::default();
        let triggers = engine.evaluate(&snapshot(2.0, 3));
        assert_eq!(
            triggers,
            vec![AlarmTrigger::MicrosleepStep(2), AlarmTrigger::YawnStep(1)]
        );
        assert!(engine.evaluate(&snapshot(2.0, 3)).is_empty());
    }

    #[test]
    fn reset_returns_counters_to_zero() {
        let mut engine = EscalationEngine::default();
        engine.evaluate(&snapshot(4.0, 9));
        engine.reset();
        assert_eq!(engine.last_fired_steps(), (0, 0));
    }
}
