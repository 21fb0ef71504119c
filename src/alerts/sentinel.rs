use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};

use crate::models::IndicatorSnapshot;

use super::{Threshold, MICROSLEEP_THRESHOLD, SENTINEL_INTERVAL, YAWN_THRESHOLD};

/// Event-independent re-check: re-asserts the alarm on every tick while either
/// indicator sits above its base, whether or not a new step was crossed.
pub struct PeriodicSentinel {
    ticker: Interval,
    microsleep: Threshold,
    yawn: Threshold,
}

impl PeriodicSentinel {
    pub fn new() -> Self {
        Self::with_period(SENTINEL_INTERVAL)
    }

    pub fn with_period(period: Duration) -> Self {
        // First check happens one full period after the session opens.
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            microsleep: MICROSLEEP_THRESHOLD,
            yawn: YAWN_THRESHOLD,
        }
    }

    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    pub fn should_alarm(&self, snapshot: &IndicatorSnapshot) -> bool {
        self.microsleep.is_exceeded(snapshot.microsleeps)
            || self.yawn.is_exceeded(f64::from(snapshot.yawns))
    }
}

impl Default for PeriodicSentinel {
    fn default() -> Self {
        Self::new()
    }
}
