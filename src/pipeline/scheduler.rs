// src/pipeline/scheduler.rs
//
// Frame throttle. The host calls back on every rendered frame; only frames
// at least one scan interval apart are processed.

use crate::types::ScanConfig;
use std::time::{Duration, Instant};
use tracing::trace;

pub struct ScanScheduler {
    interval: Duration,
    last_scan: Option<Instant>,

    /// Frames offered
    offered: u64,

    /// Frames accepted for scanning
    scheduled: u64,
}

impl ScanScheduler {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            last_scan: None,
            offered: 0,
            scheduled: 0,
        }
    }

    /// Should the frame arriving at `now` be scanned?
    pub fn should_scan(&mut self, now: Instant) -> bool {
        self.offered += 1;

        if let Some(last) = self.last_scan {
            if now.saturating_duration_since(last) < self.interval {
                trace!("Frame throttled");
                return false;
            }
        }

        self.last_scan = Some(now);
        self.scheduled += 1;
        true
    }

    pub fn get_stats(&self) -> SchedulerStats {
        SchedulerStats {
            frames_offered: self.offered,
            frames_scheduled: self.scheduled,
            scan_fraction: if self.offered > 0 {
                self.scheduled as f32 / self.offered as f32
            } else {
                0.0
            },
        }
    }
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub frames_offered: u64,
    pub frames_scheduled: u64,
    pub scan_fraction: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_fps_throttled_to_interval() {
        let mut scheduler = ScanScheduler::default();
        let t0 = Instant::now();
        let frame = Duration::from_micros(16_667);

        let scanned: Vec<u32> = (0..60u32)
            .filter(|i| scheduler.should_scan(t0 + frame * *i))
            .collect();

        // Every 5th frame (83 ms) clears the 80 ms interval
        assert_eq!(scanned, vec![0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55]);
        let stats = scheduler.get_stats();
        assert_eq!(stats.frames_offered, 60);
        assert_eq!(stats.frames_scheduled, 12);
    }

    #[test]
    fn test_gap_exactly_interval_scans() {
        let mut scheduler = ScanScheduler::default();
        let t0 = Instant::now();
        assert!(scheduler.should_scan(t0));
        assert!(!scheduler.should_scan(t0 + Duration::from_millis(79)));
        assert!(scheduler.should_scan(t0 + Duration::from_millis(80)));
    }
}
