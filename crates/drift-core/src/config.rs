use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DRIFT_LIMIT;
use crate::error::{CoreError, Result};

/// Which side of an interacting pair moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfluencePolicy {
    /// Only the first entity drawn moves toward the second.
    #[default]
    OneWay,
    /// Both entities move toward each other's pre-interaction vector.
    Mutual,
}

/// Knobs of the diversity-preservation mechanisms. Fixed for one run.
///
/// Deserializes from a partial table; missing keys take the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanismConfig {
    /// Max per-dimension deviation from the anchor. `None` disables drift resistance.
    pub drift_limit: Option<f64>,
    pub use_time_decay: bool,
    pub use_adaptive_influence: bool,
    pub use_frequency_reduction: bool,
    pub base_influence_rate: f64,
    pub decay_rate: f64,
    pub decay_start_day: u32,
    pub decay_trigger_homogenization: f64,
    pub adaptive_trigger_homogenization: f64,
    /// Multiplier lost per unit of homogenization above the adaptive trigger.
    pub adaptive_slope: f64,
    pub adaptive_floor: f64,
    pub frequency_half_life_days: f64,
    pub influence_policy: InfluencePolicy,
}

impl Default for MechanismConfig {
    fn default() -> Self {
        Self {
            drift_limit: None,
            use_time_decay: false,
            use_adaptive_influence: false,
            use_frequency_reduction: false,
            base_influence_rate: 0.02,
            decay_rate: 0.001,
            decay_start_day: 30,
            decay_trigger_homogenization: 0.35,
            adaptive_trigger_homogenization: 0.45,
            adaptive_slope: 0.7,
            adaptive_floor: 0.6,
            frequency_half_life_days: 180.0,
            influence_policy: InfluencePolicy::OneWay,
        }
    }
}

impl MechanismConfig {
    /// Every mechanism off.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Drift resistance at the reference limit plus time decay and adaptive
    /// influence damping.
    pub fn all_on() -> Self {
        Self {
            drift_limit: Some(DEFAULT_DRIFT_LIMIT),
            use_time_decay: true,
            use_adaptive_influence: true,
            ..Self::default()
        }
    }

    pub fn with_drift_limit(mut self, limit: Option<f64>) -> Self {
        self.drift_limit = limit;
        self
    }

    pub fn with_time_decay(mut self, on: bool) -> Self {
        self.use_time_decay = on;
        self
    }

    pub fn with_adaptive_influence(mut self, on: bool) -> Self {
        self.use_adaptive_influence = on;
        self
    }

    pub fn with_frequency_reduction(mut self, on: bool) -> Self {
        self.use_frequency_reduction = on;
        self
    }

    pub fn with_base_influence_rate(mut self, rate: f64) -> Self {
        self.base_influence_rate = rate;
        self
    }

    pub fn with_influence_policy(mut self, policy: InfluencePolicy) -> Self {
        self.influence_policy = policy;
        self
    }

    /// Whether the day's homogenization rate must be measured.
    pub fn needs_trigger_signal(&self) -> bool {
        self.use_adaptive_influence || self.use_time_decay
    }

    /// Influence multiplier for a given homogenization rate.
    ///
    /// 1 up to the trigger, then falls linearly with `adaptive_slope`,
    /// never below `adaptive_floor`.
    pub fn adaptive_multiplier(&self, homogenization: f64) -> f64 {
        if !self.use_adaptive_influence || homogenization <= self.adaptive_trigger_homogenization {
            return 1.0;
        }
        let excess = homogenization - self.adaptive_trigger_homogenization;
        (1.0 - excess * self.adaptive_slope).max(self.adaptive_floor)
    }

    /// Fraction of the deviation from the anchor kept after time decay, for
    /// an entity of `age` days. 1 when decay does not apply.
    pub fn decay_factor(&self, age: u32, homogenization: f64) -> f64 {
        if !self.use_time_decay
            || age <= self.decay_start_day
            || homogenization <= self.decay_trigger_homogenization
        {
            return 1.0;
        }
        (-self.decay_rate * f64::from(age - self.decay_start_day)).exp()
    }

    /// Daily participation probability under frequency reduction.
    pub fn participation_probability(&self, age: u32) -> f64 {
        if !self.use_frequency_reduction || age == 0 {
            return 1.0;
        }
        1.0 / (1.0 + f64::from(age) / self.frequency_half_life_days)
    }

    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(CoreError::InvalidConfig(msg.to_string()))
            }
        }

        if let Some(limit) = self.drift_limit {
            check(limit.is_finite() && limit >= 0.0, "drift_limit must be >= 0")?;
        }
        check(
            self.base_influence_rate.is_finite() && self.base_influence_rate >= 0.0,
            "base_influence_rate must be >= 0",
        )?;
        check(
            self.decay_rate.is_finite() && self.decay_rate >= 0.0,
            "decay_rate must be >= 0",
        )?;
        check(
            self.adaptive_slope.is_finite() && self.adaptive_slope >= 0.0,
            "adaptive_slope must be >= 0",
        )?;
        check(
            (0.0..=1.0).contains(&self.adaptive_floor),
            "adaptive_floor must be in [0, 1]",
        )?;
        check(
            self.decay_trigger_homogenization.is_finite()
                && self.adaptive_trigger_homogenization.is_finite(),
            "homogenization triggers must be finite",
        )?;
        check(
            self.frequency_half_life_days.is_finite() && self.frequency_half_life_days > 0.0,
            "frequency_half_life_days must be > 0",
        )
    }
}
