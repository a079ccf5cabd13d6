// src/pipeline/metrics.rs
//
// Counters shared between the host callback, the scan worker and the
// main-context hand-off. Logged as a summary at shutdown.

use crate::types::HazardCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    /// Host frame callbacks seen
    pub frames_offered: Arc<AtomicU64>,
    /// Frames rejected by the scan interval
    pub frames_throttled: Arc<AtomicU64>,
    /// Frames dropped because the worker was still busy
    pub frames_dropped_busy: Arc<AtomicU64>,
    /// Frames without a camera pose
    pub frames_without_pose: Arc<AtomicU64>,
    pub frames_scanned: Arc<AtomicU64>,
    pub frames_without_depth: Arc<AtomicU64>,
    pub drop_off_frames: Arc<AtomicU64>,
    pub obstacle_frames: Arc<AtomicU64>,
    pub drop_off_alerts: Arc<AtomicU64>,
    pub obstacle_alerts: Arc<AtomicU64>,
    pub handoff_failures: Arc<AtomicU64>,
    pub scan_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_offered: Arc::new(AtomicU64::new(0)),
            frames_throttled: Arc::new(AtomicU64::new(0)),
            frames_dropped_busy: Arc::new(AtomicU64::new(0)),
            frames_without_pose: Arc::new(AtomicU64::new(0)),
            frames_scanned: Arc::new(AtomicU64::new(0)),
            frames_without_depth: Arc::new(AtomicU64::new(0)),
            drop_off_frames: Arc::new(AtomicU64::new(0)),
            obstacle_frames: Arc::new(AtomicU64::new(0)),
            drop_off_alerts: Arc::new(AtomicU64::new(0)),
            obstacle_alerts: Arc::new(AtomicU64::new(0)),
            handoff_failures: Arc::new(AtomicU64::new(0)),
            scan_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration: Duration) {
        counter.store(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_alert(&self, category: HazardCategory) {
        match category {
            HazardCategory::DropOff => self.inc(&self.drop_off_alerts),
            HazardCategory::Obstacle => self.inc(&self.obstacle_alerts),
        }
    }

    pub fn scan_rate(&self) -> f64 {
        let frames = self.frames_scanned.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_offered: self.frames_offered.load(Ordering::Relaxed),
            frames_throttled: self.frames_throttled.load(Ordering::Relaxed),
            frames_dropped_busy: self.frames_dropped_busy.load(Ordering::Relaxed),
            frames_without_pose: self.frames_without_pose.load(Ordering::Relaxed),
            frames_scanned: self.frames_scanned.load(Ordering::Relaxed),
            frames_without_depth: self.frames_without_depth.load(Ordering::Relaxed),
            scan_rate: self.scan_rate(),
            drop_off_frames: self.drop_off_frames.load(Ordering::Relaxed),
            obstacle_frames: self.obstacle_frames.load(Ordering::Relaxed),
            drop_off_alerts: self.drop_off_alerts.load(Ordering::Relaxed),
            obstacle_alerts: self.obstacle_alerts.load(Ordering::Relaxed),
            handoff_failures: self.handoff_failures.load(Ordering::Relaxed),
            last_scan_us: self.scan_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_offered: u64,
    pub frames_throttled: u64,
    pub frames_dropped_busy: u64,
    pub frames_without_pose: u64,
    pub frames_scanned: u64,
    pub frames_without_depth: u64,
    pub scan_rate: f64,
    pub drop_off_frames: u64,
    pub obstacle_frames: u64,
    pub drop_off_alerts: u64,
    pub obstacle_alerts: u64,
    pub handoff_failures: u64,
    pub last_scan_us: u64,
    pub elapsed_secs: f64,
}
