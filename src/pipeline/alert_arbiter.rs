// src/pipeline/alert_arbiter.rs
//
// Turns per-frame hazard flags into at most one alert per cooldown window.
//
//   quiet ──(streak ≥ min frames, cooled down)──→ fire ──→ quiet
//
// Each category keeps its own consecutive-frame streak. Drop-off is checked
// first; when it fires the obstacle streak keeps counting and may fire after
// the cooldown.

use crate::detection::HazardDecision;
use crate::types::{AlertConfig, HazardCategory};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct AlertArbiter {
    config: AlertConfig,
    drop_off_streak: u32,
    obstacle_streak: u32,
    last_alert: Option<Instant>,
}

impl AlertArbiter {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            drop_off_streak: 0,
            obstacle_streak: 0,
            last_alert: None,
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    fn cooled_down(&self, now: Instant) -> bool {
        match self.last_alert {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown(),
        }
    }

    /// Folds in one decision; returns the category to emit, if any.
    pub fn update(&mut self, decision: &HazardDecision, now: Instant) -> Option<HazardCategory> {
        self.drop_off_streak = if decision.is_drop_off {
            self.drop_off_streak + 1
        } else {
            0
        };
        self.obstacle_streak = if decision.is_obstacle {
            self.obstacle_streak + 1
        } else {
            0
        };

        if !self.cooled_down(now) {
            if decision.any_hazard() {
                debug!(
                    "Alert suppressed by cooldown (drop-off streak {}, obstacle streak {})",
                    self.drop_off_streak, self.obstacle_streak
                );
            }
            return None;
        }

        let fired = if self.drop_off_streak >= self.config.min_frames_drop_off {
            self.drop_off_streak = 0;
            HazardCategory::DropOff
        } else if self.obstacle_streak >= self.config.min_frames_obstacle {
            self.obstacle_streak = 0;
            HazardCategory::Obstacle
        } else {
            return None;
        };

        self.last_alert = Some(now);
        info!("⚠️  {} alert fired", fired);
        Some(fired)
    }

    pub fn drop_off_streak(&self) -> u32 {
        self.drop_off_streak
    }

    pub fn obstacle_streak(&self) -> u32 {
        self.obstacle_streak
    }

    pub fn reset(&mut self) {
        self.drop_off_streak = 0;
        self.obstacle_streak = 0;
        self.last_alert = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(drop_off: bool, obstacle: bool) -> HazardDecision {
        HazardDecision {
            is_drop_off: drop_off,
            is_obstacle: obstacle,
            ..Default::default()
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_needs_consecutive_frames() {
        let mut arbiter = AlertArbiter::new(AlertConfig::default());
        let t0 = Instant::now();

        assert_eq!(arbiter.update(&decision(true, false), t0), None);
        assert_eq!(arbiter.update(&decision(false, false), t0 + ms(80)), None);
        assert_eq!(arbiter.update(&decision(true, false), t0 + ms(160)), None);
        assert_eq!(
            arbiter.update(&decision(true, false), t0 + ms(240)),
            Some(HazardCategory::DropOff)
        );
        assert_eq!(arbiter.drop_off_streak(), 0);
    }

    #[test]
    fn test_cooldown_blocks_then_releases() {
        let mut arbiter = AlertArbiter::new(AlertConfig::default());
        let t0 = Instant::now();

        arbiter.update(&decision(true, false), t0);
        let fired_at = t0 + ms(80);
        assert_eq!(
            arbiter.update(&decision(true, false), fired_at),
            Some(HazardCategory::DropOff)
        );

        // Streak rebuilds but the window is closed
        assert_eq!(arbiter.update(&decision(true, false), fired_at + ms(500)), None);
        assert_eq!(arbiter.update(&decision(true, false), fired_at + ms(1000)), None);
        assert_eq!(arbiter.update(&decision(true, false), fired_at + ms(1500)), None);
        assert_eq!(
            arbiter.update(&decision(true, false), fired_at + ms(1600)),
            Some(HazardCategory::DropOff)
        );
    }

    #[test]
    fn test_drop_off_takes_priority() {
        let mut arbiter = AlertArbiter::new(AlertConfig::default());
        let t0 = Instant::now();

        arbiter.update(&decision(true, true), t0);
        assert_eq!(
            arbiter.update(&decision(true, true), t0 + ms(80)),
            Some(HazardCategory::DropOff)
        );
        // Obstacle streak survived and fires once the window reopens
        assert_eq!(arbiter.obstacle_streak(), 2);
        assert_eq!(
            arbiter.update(&decision(false, true), t0 + ms(1700)),
            Some(HazardCategory::Obstacle)
        );
    }

    #[test]
    fn test_single_emission_per_window() {
        let mut arbiter = AlertArbiter::new(AlertConfig::default());
        let t0 = Instant::now();
        let fired = (0..18)
            .filter_map(|i| arbiter.update(&decision(true, true), t0 + ms(i * 80)))
            .count();
        // 0..1360 ms fits inside one cooldown window after the first alert
        assert_eq!(fired, 1);
    }
}
