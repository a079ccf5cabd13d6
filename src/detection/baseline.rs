// src/detection/baseline.rs
//
// Floor height under the user's feet. Fed only by the near-foot probe;
// the wide drop-off probes and the obstacle probes never touch it, so a
// ledge ahead cannot drag the reference down with it.

use super::geometry_probe::GeometryHit;
use crate::types::BaselineConfig;
use tracing::debug;

pub struct BaselineTracker {
    alpha: f32,
    floor_y: Option<f32>,
}

impl BaselineTracker {
    pub fn new(config: &BaselineConfig) -> Self {
        Self {
            alpha: config.alpha.clamp(0.0, 1.0),
            floor_y: None,
        }
    }

    /// Folds in this frame's near-foot hit and returns the current baseline.
    ///
    /// The first hit is adopted as is; later hits move the baseline by
    /// `alpha` of the difference. A frame without a hit leaves it alone.
    pub fn update(&mut self, near_foot_hit: Option<&GeometryHit>) -> Option<f32> {
        let Some(hit) = near_foot_hit else {
            return self.floor_y;
        };

        let hit_y = hit.y();
        let next = match self.floor_y {
            None => {
                debug!("Floor baseline established at y={:.3}", hit_y);
                hit_y
            }
            Some(current) => current * (1.0 - self.alpha) + hit_y * self.alpha,
        };
        self.floor_y = Some(next);
        self.floor_y
    }

    pub fn floor_y(&self) -> Option<f32> {
        self.floor_y
    }

    /// New scanning session
    pub fn reset(&mut self) {
        self.floor_y = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn hit(y: f32) -> GeometryHit {
        GeometryHit {
            world_position: Point3::new(0.0, y, -0.3),
            distance_from_camera: 1.0,
        }
    }

    #[test]
    fn test_first_hit_adopted_directly() {
        let mut tracker = BaselineTracker::new(&BaselineConfig::default());
        assert_eq!(tracker.update(None), None);
        assert_eq!(tracker.update(Some(&hit(-1.2))), Some(-1.2));
    }

    #[test]
    fn test_slow_adaptation() {
        let mut tracker = BaselineTracker::new(&BaselineConfig::default());
        tracker.update(Some(&hit(0.0)));
        let b = tracker.update(Some(&hit(1.0))).unwrap();
        assert!((b - 0.30).abs() < 1e-6);
    }

    #[test]
    fn test_missing_hit_carries_forward() {
        let mut tracker = BaselineTracker::new(&BaselineConfig::default());
        tracker.update(Some(&hit(0.4)));
        for _ in 0..10 {
            assert_eq!(tracker.update(None), Some(0.4));
        }
    }

    #[test]
    fn test_converges_within_twenty_updates() {
        // ceil(ln(0.001) / ln(0.70)) = 20
        let needed = (0.001_f64.ln() / 0.70_f64.ln()).ceil() as usize;
        assert_eq!(needed, 20);

        let mut tracker = BaselineTracker::new(&BaselineConfig::default());
        tracker.update(Some(&hit(1.0)));

        let target = 0.0;
        let mut b = 1.0;
        for _ in 0..needed {
            b = tracker.update(Some(&hit(target))).unwrap();
        }
        assert!((b - target).abs() < 0.001, "baseline {} not within 1mm", b);
    }

    #[test]
    fn test_reset() {
        let mut tracker = BaselineTracker::new(&BaselineConfig::default());
        tracker.update(Some(&hit(0.4)));
        tracker.reset();
        assert_eq!(tracker.floor_y(), None);
    }
}
