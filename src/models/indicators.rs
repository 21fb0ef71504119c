use serde::{Deserialize, Serialize};

/// One `indicators` object as streamed by the analysis service.
///
/// The service reports microsleeps as accumulated seconds rounded to two
/// decimals, so that field is carried as a real number.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct IndicatorReading {
    pub blinks: u32,
    pub microsleeps: f64,
    pub yawns: u32,
    #[serde(rename = "yawn_duration")]
    pub yawn_duration_secs: f64,
}

impl IndicatorReading {
    pub fn validate(&self) -> Result<(), String> {
        if !self.microsleeps.is_finite() || self.microsleeps < 0.0 {
            return Err(format!("invalid microsleeps value {}", self.microsleeps));
        }
        if !self.yawn_duration_secs.is_finite() || self.yawn_duration_secs < 0.0 {
            return Err(format!("invalid yawn_duration value {}", self.yawn_duration_secs));
        }
        Ok(())
    }
}

/// Cumulative indicator counts as understood by the operator client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub blinks: u32,
    pub microsleeps: f64,
    pub yawns: u32,
    pub yawn_duration_secs: f64,
}

impl IndicatorSnapshot {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Merges a reading into the snapshot.
    ///
    /// Microsleeps keep the running maximum for the whole session; every other
    /// field is replaced by the latest server value.
    pub fn apply(&self, incoming: &IndicatorReading) -> Self {
        Self {
            blinks: incoming.blinks,
            microsleeps: self.microsleeps.max(incoming.microsleeps),
            yawns: incoming.yawns,
            yawn_duration_secs: incoming.yawn_duration_secs,
        }
    }
}
