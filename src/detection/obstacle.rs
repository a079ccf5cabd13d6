// src/detection/obstacle.rs
//
// Forward obstacle voting.
//
// Each of the obstacle probes goes through a chain of rejections:
//   no ray hit → beyond range → no depth → ray/depth disagree → person?
// and only what survives as "not a person" votes. A minimum number of votes
// reports an obstacle. Person vs obstacle is a coarse size heuristic.

use super::depth_sampler::DepthSampler;
use super::geometry_probe::GeometryHit;
use super::types::MarkState;
use crate::types::{ObstacleConfig, ScreenPoint};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NoHit,
    OutOfRange,
    NoDepth,
    /// Ray and depth distances disagree by the match tolerance or more
    Inconsistent,
    Person,
    Obstacle,
}

impl ProbeOutcome {
    pub fn votes(&self) -> bool {
        matches!(self, ProbeOutcome::Obstacle)
    }

    pub fn mark_state(&self) -> MarkState {
        match self {
            ProbeOutcome::NoHit | ProbeOutcome::OutOfRange | ProbeOutcome::NoDepth => {
                MarkState::NoHit
            }
            ProbeOutcome::Inconsistent => MarkState::Inconsistent,
            ProbeOutcome::Person => MarkState::Person,
            ProbeOutcome::Obstacle => MarkState::Obstacle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReading {
    pub index: usize,
    pub point: ScreenPoint,
    pub outcome: ProbeOutcome,
    pub ray_distance: Option<f32>,
    pub depth: Option<f32>,
    /// Only estimated on the depth path, zero otherwise
    pub width: f32,
    pub height: Option<f32>,
}

impl ProbeReading {
    fn rejected(index: usize, point: ScreenPoint, outcome: ProbeOutcome) -> Self {
        Self {
            index,
            point,
            outcome,
            ray_distance: None,
            depth: None,
            width: 0.0,
            height: None,
        }
    }

    fn is_classified(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Person | ProbeOutcome::Obstacle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleAssessment {
    pub readings: Vec<ProbeReading>,
    pub votes: usize,
    pub is_obstacle: bool,
    /// False when the frame had no depth and the ray-only rules were used
    pub used_depth: bool,
}

impl ObstacleAssessment {
    /// Diagnostic lines for the overlay.
    ///
    /// The depth path lists every classified probe; the ray-only path just
    /// says so.
    pub fn narrative(&self) -> String {
        if !self.used_depth {
            return "Fallback Obs\n".to_string();
        }

        self.readings
            .iter()
            .filter(|r| r.is_classified())
            .map(|r| {
                format!(
                    "pt{} d:{:.2} r:{:.2} w:{:.2} h:{:.2} P:{}",
                    r.index,
                    r.depth.unwrap_or(0.0),
                    r.ray_distance.unwrap_or(0.0),
                    r.width,
                    r.height.unwrap_or(0.0),
                    r.outcome == ProbeOutcome::Person
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Height of a hit above the floor baseline, or below the camera without one.
pub fn estimate_height(hit_y: f32, floor_y: Option<f32>, camera_y: f32) -> f32 {
    match floor_y {
        Some(floor) => hit_y - floor,
        None => camera_y - hit_y,
    }
}

/// Lateral extent of the surface under `point`, in meters.
///
/// Walks the depth row left and right from the probe pixel in steps of
/// `stride_px`, up to `radius_px`, and stops at the first pixel that is
/// invalid or deviates from the center depth by more than the tolerance.
/// The pixel span is converted with the depth-map focal length.
pub fn estimate_width(
    sampler: &DepthSampler<'_>,
    point: ScreenPoint,
    focal_px: f32,
    config: &ObstacleConfig,
) -> f32 {
    let Some(center_depth) = sampler.value_at(point) else {
        return 0.0;
    };
    let Some((cx, cy)) = sampler.texel_for(point) else {
        return 0.0;
    };
    if focal_px <= 0.0 {
        return 0.0;
    }

    let frame = sampler.frame();
    let width = frame.width() as isize;
    let cx = cx as isize;
    let radius = config.width_scan_radius_px as isize;
    let stride = config.width_scan_stride_px.max(1) as isize;

    let matches_center = |px: isize| {
        frame
            .get(px as usize, cy)
            .is_some_and(|v| (v - center_depth).abs() <= config.width_depth_tolerance)
    };

    let mut left = cx;
    let lo = (cx - radius).max(0);
    let mut px = cx;
    while px > lo {
        if !matches_center(px) {
            break;
        }
        left = px;
        px -= stride;
    }

    let mut right = cx;
    let hi = (cx + radius).min(width - 1);
    px = cx;
    while px < hi {
        if !matches_center(px) {
            break;
        }
        right = px;
        px += stride;
    }

    let span = (right - left).max(1) as f32;
    center_depth * span / focal_px
}

pub struct ObstacleClassifier {
    config: ObstacleConfig,
}

impl ObstacleClassifier {
    pub fn new(config: ObstacleConfig) -> Self {
        Self { config }
    }

    pub fn is_likely_person(&self, height: f32, width: f32) -> bool {
        let c = &self.config;
        height > c.person_height
            || (height > c.person_mid_height && width > c.person_width)
            || (width > c.wide_width && height > c.wide_min_height)
    }

    /// Classifies one frame of obstacle probes.
    ///
    /// `hits` lines up with `probes`. With a depth sampler every hit is
    /// cross-checked against the depth map and sized; without one only ray
    /// distance and height are used.
    pub fn classify(
        &self,
        probes: &[ScreenPoint],
        hits: &[Option<GeometryHit>],
        depth: Option<&DepthSampler<'_>>,
        focal_px: f32,
        floor_y: Option<f32>,
        camera_y: f32,
    ) -> ObstacleAssessment {
        let readings: Vec<ProbeReading> = probes
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let hit = hits.get(index).copied().flatten();
                match depth {
                    Some(sampler) => {
                        self.classify_with_depth(index, *point, hit, sampler, focal_px, floor_y, camera_y)
                    }
                    None => self.classify_ray_only(index, *point, hit, floor_y, camera_y),
                }
            })
            .collect();

        let votes = readings.iter().filter(|r| r.outcome.votes()).count();
        let is_obstacle = votes >= self.config.min_votes;

        if is_obstacle {
            debug!("Obstacle quorum reached: {}/{} probes", votes, probes.len());
        }

        ObstacleAssessment {
            readings,
            votes,
            is_obstacle,
            used_depth: depth.is_some(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn classify_with_depth(
        &self,
        index: usize,
        point: ScreenPoint,
        hit: Option<GeometryHit>,
        sampler: &DepthSampler<'_>,
        focal_px: f32,
        floor_y: Option<f32>,
        camera_y: f32,
    ) -> ProbeReading {
        let Some(hit) = hit else {
            return ProbeReading::rejected(index, point, ProbeOutcome::NoHit);
        };
        let ray_distance = hit.distance_from_camera;
        if ray_distance > self.config.max_distance {
            return ProbeReading {
                ray_distance: Some(ray_distance),
                ..ProbeReading::rejected(index, point, ProbeOutcome::OutOfRange)
            };
        }

        let Some(depth) = sampler.value_at(point) else {
            return ProbeReading {
                ray_distance: Some(ray_distance),
                ..ProbeReading::rejected(index, point, ProbeOutcome::NoDepth)
            };
        };

        if (depth - ray_distance).abs() >= self.config.depth_match_tolerance {
            return ProbeReading {
                ray_distance: Some(ray_distance),
                depth: Some(depth),
                ..ProbeReading::rejected(index, point, ProbeOutcome::Inconsistent)
            };
        }

        let width = estimate_width(sampler, point, focal_px, &self.config);
        let height = estimate_height(hit.y(), floor_y, camera_y);
        let outcome = if self.is_likely_person(height, width) {
            ProbeOutcome::Person
        } else {
            ProbeOutcome::Obstacle
        };

        ProbeReading {
            index,
            point,
            outcome,
            ray_distance: Some(ray_distance),
            depth: Some(depth),
            width,
            height: Some(height),
        }
    }

    fn classify_ray_only(
        &self,
        index: usize,
        point: ScreenPoint,
        hit: Option<GeometryHit>,
        floor_y: Option<f32>,
        camera_y: f32,
    ) -> ProbeReading {
        let Some(hit) = hit else {
            return ProbeReading::rejected(index, point, ProbeOutcome::NoHit);
        };

        let ray_distance = hit.distance_from_camera;
        let height = estimate_height(hit.y(), floor_y, camera_y);
        let outcome = if height > self.config.person_height {
            ProbeOutcome::Person
        } else if ray_distance >= self.config.max_distance {
            ProbeOutcome::OutOfRange
        } else {
            ProbeOutcome::Obstacle
        };

        ProbeReading {
            index,
            point,
            outcome,
            ray_distance: Some(ray_distance),
            depth: None,
            width: 0.0,
            height: Some(height),
        }
    }
}
