// src/detection/smoother.rs
use crate::types::DropOffConfig;

/// Exponential moving average that reacts faster going up than coming down.
///
/// Rising samples are blended with `rise_weight`, falling ones with
/// `fall_weight`. With the defaults (0.5 / 0.2) a sudden drop registers on
/// the first frame while a single clean frame at a step edge cannot cancel
/// an active warning.
pub struct AsymmetricEma {
    value: f32,
    rise_weight: f32,
    fall_weight: f32,
}

impl AsymmetricEma {
    pub fn new(rise_weight: f32, fall_weight: f32) -> Self {
        Self {
            value: 0.0,
            rise_weight: rise_weight.clamp(0.0, 1.0),
            fall_weight: fall_weight.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &DropOffConfig) -> Self {
        Self::new(config.rise_weight, config.fall_weight)
    }

    /// Negative samples are treated as zero.
    pub fn update(&mut self, sample: f32) -> f32 {
        let sample = sample.max(0.0);
        let weight = if sample > self.value {
            self.rise_weight
        } else {
            self.fall_weight
        };
        self.value = self.value * (1.0 - weight) + sample * weight;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}
