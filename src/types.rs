// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub baseline: BaselineConfig,
    pub drop_off: DropOffConfig,
    pub obstacle: ObstacleConfig,
    pub alert: AlertConfig,
    pub probes: ProbeLayout,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum time between two processed frames
    pub interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { interval_ms: 80 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// EMA weight of a new near-foot hit
    pub alpha: f32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self { alpha: 0.30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropOffConfig {
    /// Camera pitch (radians) below which the user counts as looking down
    pub pitch_threshold: f32,
    /// Smoothed drop (meters) above which the floor is dangerous
    pub danger_height: f32,
    /// Wide probe hits and depth readings must be closer than this (meters)
    pub max_check_distance: f32,
    /// Forward depth increase (meters) that flags a ledge in the depth fallback
    pub depth_danger_gap: f32,
    /// Median kernel radius for the depth fallback samples
    pub depth_kernel_radius: usize,
    /// Weight of the new sample when the drop is rising
    pub rise_weight: f32,
    /// Weight of the new sample when the drop is falling
    pub fall_weight: f32,
}

impl Default for DropOffConfig {
    fn default() -> Self {
        Self {
            pitch_threshold: -0.05,
            danger_height: 0.10,
            max_check_distance: 1.5,
            depth_danger_gap: 0.6,
            depth_kernel_radius: 1,
            rise_weight: 0.5,
            fall_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Ray hits farther than this (meters) are ignored
    pub max_distance: f32,
    /// Ray and depth distances must agree within this (meters)
    pub depth_match_tolerance: f32,
    pub width_scan_radius_px: usize,
    pub width_scan_stride_px: usize,
    /// Depth deviation (meters) that ends the lateral width scan
    pub width_depth_tolerance: f32,
    /// Anything taller than this is a person regardless of width
    pub person_height: f32,
    pub person_mid_height: f32,
    pub person_width: f32,
    pub wide_width: f32,
    pub wide_min_height: f32,
    /// Non-person probes needed to report an obstacle
    pub min_votes: usize,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.2,
            depth_match_tolerance: 0.28,
            width_scan_radius_px: 12,
            width_scan_stride_px: 2,
            width_depth_tolerance: 0.20,
            person_height: 1.2,
            person_mid_height: 0.8,
            person_width: 0.35,
            wide_width: 0.55,
            wide_min_height: 0.5,
            min_votes: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub min_frames_drop_off: u32,
    pub min_frames_obstacle: u32,
    /// Quiet period after any fired alert
    pub cooldown_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_frames_drop_off: 2,
            min_frames_obstacle: 2,
            cooldown_ms: 1500,
        }
    }
}

/// Fixed screen-space probe tables, all in normalized view coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeLayout {
    /// Near-foot probe, the only source of the floor baseline
    pub baseline: ScreenPoint,
    /// Near-foot depth reference for the depth fallback
    pub depth_reference: ScreenPoint,
    /// Wide-stance probes: center, left, right
    pub drop_off: Vec<ScreenPoint>,
    pub obstacle: Vec<ScreenPoint>,
}

pub const BASELINE_PROBE: ScreenPoint = ScreenPoint::new(0.5, 0.95);
pub const DEPTH_REFERENCE_PROBE: ScreenPoint = ScreenPoint::new(0.5, 0.90);

pub const DROP_OFF_PROBES: [ScreenPoint; 3] = [
    ScreenPoint::new(0.5, 0.65), // center
    ScreenPoint::new(0.2, 0.65), // left wide
    ScreenPoint::new(0.8, 0.65), // right wide
];

pub const OBSTACLE_PROBES: [ScreenPoint; 5] = [
    ScreenPoint::new(0.5, 0.50),
    ScreenPoint::new(0.3, 0.50),
    ScreenPoint::new(0.7, 0.50),
    ScreenPoint::new(0.35, 0.85),
    ScreenPoint::new(0.65, 0.85),
];

impl Default for ProbeLayout {
    fn default() -> Self {
        Self {
            baseline: BASELINE_PROBE,
            depth_reference: DEPTH_REFERENCE_PROBE,
            drop_off: DROP_OFF_PROBES.to_vec(),
            obstacle: OBSTACLE_PROBES.to_vec(),
        }
    }
}

/// Virtual walk used by the simulation binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub camera_height: f32,
    pub camera_pitch: f32,
    pub walking_speed: f32,
    /// Forward distance of the step edge from the start position
    pub step_distance: f32,
    pub step_drop: f32,
    pub duration_secs: f64,
    /// Host render callback rate
    pub render_fps: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            camera_height: 1.0,
            camera_pitch: -0.9,
            walking_speed: 0.6,
            step_distance: 2.5,
            step_drop: 0.15,
            duration_secs: 6.0,
            render_fps: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "smart_cane=info".to_string(),
        }
    }
}

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Normalized (0..1) screen coordinate, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Pixel-space position inside the given viewport
    pub fn to_viewport(self, viewport: Viewport) -> (f32, f32) {
        (self.x * viewport.width, self.y * viewport.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Back to normalized coordinates; `None` for a degenerate viewport
    pub fn normalize(&self, px: f32, py: f32) -> Option<ScreenPoint> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(ScreenPoint::new(px / self.width, py / self.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardCategory {
    DropOff,
    Obstacle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HapticCue {
    /// Error-style notification pattern
    ErrorNotification,
    /// Single heavy impact
    HeavyImpact,
}

impl HazardCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::DropOff => "DROP_OFF",
            HazardCategory::Obstacle => "OBSTACLE",
        }
    }

    /// Phrase spoken when this category fires
    pub fn announcement(&self) -> &'static str {
        match self {
            HazardCategory::DropOff => "Drop-off ahead",
            HazardCategory::Obstacle => "Obstacle ahead",
        }
    }

    pub fn haptic(&self) -> HapticCue {
        match self {
            HazardCategory::DropOff => HapticCue::ErrorNotification,
            HazardCategory::Obstacle => HapticCue::HeavyImpact,
        }
    }

    /// Drop-off also plays an alert tone on top of speech
    pub fn plays_alert_tone(&self) -> bool {
        matches!(self, HazardCategory::DropOff)
    }
}

impl std::fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STARTUP_ANNOUNCEMENT: &str = "Smart cane started, wide drop-off mode.";
