use super::Threshold;

/// Remembers the highest alarm step already acknowledged for one indicator class.
#[derive(Debug, Clone)]
pub struct AlertStepCounter {
    threshold: Threshold,
    last_fired_step: u32,
}

impl AlertStepCounter {
    pub fn new(threshold: Threshold) -> Self {
        Self {
            threshold,
            last_fired_step: 0,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn last_fired_step(&self) -> u32 {
        self.last_fired_step
    }

    /// Feeds the current cumulative count. Returns the newly reached step when an
    /// alarm must fire for it; each step fires at most once.
    pub fn observe(&mut self, count: f64) -> Option<u32> {
        match self.threshold.step_for(count) {
            Some(step) if step > self.last_fired_step => {
                self.last_fired_step = step;
                Some(step)
            }
            Some(_) => None,
            None => {
                self.last_fired_step = 0;
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_fired_step = 0;
    }
}
