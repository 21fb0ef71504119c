use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const HIGH_HZ: f32 = 880.0;
const LOW_HZ: f32 = 660.0;
/// Each pitch lasts a quarter second.
const HALF_CYCLE_SECS: f32 = 0.25;

/// Built-in two-tone siren used when no alarm file is configured.
pub struct AlarmTone {
    sample_rate: u32,
    position: u64,
    total_samples: u64,
}

impl AlarmTone {
    pub fn new(duration: Duration) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            position: 0,
            total_samples: (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as u64,
        }
    }
}

impl Default for AlarmTone {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Iterator for AlarmTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let t = self.position as f32 / self.sample_rate as f32;
        self.position += 1;

        let frequency = if (t / HALF_CYCLE_SECS) as u32 % 2 == 0 {
            HIGH_HZ
        } else {
            LOW_HZ
        };

        Some((TAU * frequency * t).sin() * 0.4)
    }
}

impl Source for AlarmTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_samples as f64 / f64::from(self.sample_rate),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_is_finite_and_bounded() {
        let tone = AlarmTone::new(Duration::from_millis(100));
        let samples: Vec<f32> = tone.collect();

        assert_eq!(samples.len(), 4410);
        assert!(samples.iter().all(|s| s.abs() <= 0.4 + f32::EPSILON));
    }
}
