// src/sim.rs
//
// Synthetic world for running the pipeline without a device.
//
// World frame: Y up, the user walks toward -Z. The floor is y = 0 up to an
// optional step edge, and y = -drop beyond it. Box obstacles are vertical
// front faces standing on the floor.
//
// Query semantics:
//   - Horizontal alignment sees floors only (detected planes).
//   - Estimated planes with any alignment see obstacle faces only; the floor
//     is only known to the tracker as plane geometry.
//   - The depth map sees everything.

use crate::detection::ProbeMark;
use crate::host::{
    CameraPose, DepthFrame, DisplayTransform, HazardSink, InterfaceOrientation, Intrinsics,
    PlaneAlignment, RayCaster, RayQuery, SensingSubsystem,
};
use crate::pipeline::EventBus;
use crate::types::{HazardCategory, SimulationConfig, Viewport};
use nalgebra::{Point3, Rotation3, Vector3};
use std::sync::Arc;

const IMAGE_WIDTH: usize = 480;
const IMAGE_HEIGHT: usize = 640;
const FOCAL_LENGTH_PX: f32 = 500.0;
const DEPTH_WIDTH: usize = 48;
const DEPTH_HEIGHT: usize = 64;
const DEPTH_MAX_RANGE: f32 = 5.0;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxObstacle {
    pub center_x: f32,
    /// World z of the face turned toward the user
    pub front_z: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    edge_z: f32,
    drop: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticScene {
    step: Option<Step>,
    boxes: Vec<BoxObstacle>,
}

impl SyntheticScene {
    pub fn flat_floor() -> Self {
        Self::default()
    }

    /// Step down `drop` meters, with the edge `edge_distance` ahead of z = 0.
    pub fn with_step(mut self, edge_distance: f32, drop: f32) -> Self {
        self.step = Some(Step {
            edge_z: -edge_distance,
            drop: drop.max(0.0),
        });
        self
    }

    pub fn with_box(mut self, obstacle: BoxObstacle) -> Self {
        self.boxes.push(obstacle);
        self
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::flat_floor().with_step(config.step_distance, config.step_drop)
    }

    fn floor_y_at(&self, z: f32) -> f32 {
        match self.step {
            Some(step) if z < step.edge_z => -step.drop,
            _ => 0.0,
        }
    }

    fn floor_hit(&self, origin: &Point3<f32>, dir: &Vector3<f32>) -> Option<f32> {
        if dir.y >= 0.0 {
            return None;
        }

        let t_upper = -origin.y / dir.y;
        if t_upper > 0.0 && self.floor_y_at(origin.z + dir.z * t_upper) == 0.0 {
            return Some(t_upper);
        }

        let step = self.step?;
        let t_lower = (-step.drop - origin.y) / dir.y;
        let z = origin.z + dir.z * t_lower;
        (t_lower > 0.0 && z < step.edge_z).then_some(t_lower)
    }

    fn box_hit(&self, origin: &Point3<f32>, dir: &Vector3<f32>) -> Option<f32> {
        if dir.z >= 0.0 {
            return None;
        }

        self.boxes
            .iter()
            .filter_map(|b| {
                let t = (b.front_z - origin.z) / dir.z;
                if t <= 0.0 {
                    return None;
                }
                let p = *origin + *dir * t;
                let base = self.floor_y_at(b.front_z);
                let inside = (p.x - b.center_x).abs() <= b.width / 2.0
                    && p.y >= base
                    && p.y <= base + b.height;
                inside.then_some(t)
            })
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Ray parameter of the first surface hit, if any.
    pub fn intersect(
        &self,
        origin: &Point3<f32>,
        dir: &Vector3<f32>,
        floors: bool,
        obstacles: bool,
    ) -> Option<f32> {
        let floor = if floors { self.floor_hit(origin, dir) } else { None };
        let boxes = if obstacles { self.box_hit(origin, dir) } else { None };
        match (floor, boxes) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Camera walking through a synthetic scene. Plays the host's main
/// context: sensing, ray casting and the output sink in one place.
pub struct SimulatedHost {
    scene: SyntheticScene,
    pose: CameraPose,
    viewport: Viewport,
    depth_enabled: bool,
    depth: Option<Arc<DepthFrame>>,
    sink: EventBus,
}

impl SimulatedHost {
    pub fn new(scene: SyntheticScene, camera_height: f32, pitch: f32) -> Self {
        let mut host = Self {
            scene,
            pose: CameraPose {
                pitch,
                position: Point3::new(0.0, camera_height, 0.0),
                intrinsics: Intrinsics {
                    focal_length_x: FOCAL_LENGTH_PX,
                    focal_length_y: FOCAL_LENGTH_PX,
                },
                image_resolution: (IMAGE_WIDTH, IMAGE_HEIGHT),
            },
            viewport: Viewport::new(IMAGE_WIDTH as f32, IMAGE_HEIGHT as f32),
            depth_enabled: true,
            depth: None,
            sink: EventBus::new(EVENT_CAPACITY),
        };
        host.render_depth();
        host
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            SyntheticScene::from_config(config),
            config.camera_height,
            config.camera_pitch,
        )
    }

    /// Hosts without a depth sensor
    pub fn without_depth(mut self) -> Self {
        self.depth_enabled = false;
        self.depth = None;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    /// Distance walked toward -Z from the start position.
    pub fn walked(&self) -> f32 {
        -self.pose.position.z
    }

    pub fn walk(&mut self, meters: f32) {
        self.pose.position.z -= meters;
        self.render_depth();
    }

    pub fn sink_mut(&mut self) -> &mut EventBus {
        &mut self.sink
    }

    /// World-space ray through a normalized image point
    fn ray(&self, u: f32, v: f32) -> (Point3<f32>, Vector3<f32>) {
        let (w, h) = self.pose.image_resolution;
        let camera_dir = Vector3::new(
            (u - 0.5) * w as f32 / self.pose.intrinsics.focal_length_x,
            -(v - 0.5) * h as f32 / self.pose.intrinsics.focal_length_y,
            -1.0,
        );
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), self.pose.pitch);
        (self.pose.position, pitch * camera_dir)
    }

    fn render_depth(&mut self) {
        if !self.depth_enabled {
            return;
        }
        let frame = DepthFrame::from_fn(DEPTH_WIDTH, DEPTH_HEIGHT, |x, y| {
            let u = (x as f32 + 0.5) / DEPTH_WIDTH as f32;
            let v = (y as f32 + 0.5) / DEPTH_HEIGHT as f32;
            let (origin, dir) = self.ray(u, v);
            match self.scene.intersect(&origin, &dir, true, true) {
                Some(t) if t * dir.norm() <= DEPTH_MAX_RANGE => t * dir.norm(),
                _ => 0.0,
            }
        });
        self.depth = Some(Arc::new(frame));
    }
}

impl SensingSubsystem for SimulatedHost {
    fn current_camera_pose(&self) -> Option<CameraPose> {
        Some(self.pose)
    }

    fn current_depth_frame(&self) -> Option<Arc<DepthFrame>> {
        self.depth.clone()
    }

    fn display_transform(
        &self,
        _orientation: InterfaceOrientation,
        _viewport: Viewport,
    ) -> DisplayTransform {
        DisplayTransform::identity()
    }
}

impl RayCaster for SimulatedHost {
    fn ray_cast(&self, query: &RayQuery) -> Option<Point3<f32>> {
        let point = self.viewport.normalize(query.point.x, query.point.y)?;
        let (origin, dir) = self.ray(point.x, point.y);
        let (floors, obstacles) = match query.alignment {
            PlaneAlignment::Horizontal => (true, false),
            PlaneAlignment::Any => (false, true),
        };
        let t = self.scene.intersect(&origin, &dir, floors, obstacles)?;
        Some(origin + dir * t)
    }
}

impl HazardSink for SimulatedHost {
    fn emit(&mut self, category: HazardCategory) {
        self.sink.emit(category);
    }

    fn announce(&mut self, text: &str) {
        self.sink.announce(text);
    }

    fn show_debug(&mut self, narrative: &str) {
        self.sink.show_debug(narrative);
    }

    fn show_probe_marks(&mut self, marks: &[ProbeMark]) {
        self.sink.show_probe_marks(marks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{InlineGeometry, ProbeOutcome};
    use crate::host::RaycastTarget;
    use crate::pipeline::{FrameContext, HazardPipeline};
    use crate::types::Config;
    use nalgebra::Point2;
    use std::time::{Duration, Instant};

    fn horizontal(host: &SimulatedHost, u: f32, v: f32) -> Option<Point3<f32>> {
        let viewport = host.viewport();
        host.ray_cast(&RayQuery {
            point: Point2::new(u * viewport.width, v * viewport.height),
            target: RaycastTarget::ExistingPlaneGeometry,
            alignment: PlaneAlignment::Horizontal,
        })
    }

    fn run_frames(host: &SimulatedHost, frames: u32) -> Vec<crate::pipeline::FrameOutcome> {
        let mut pipeline = HazardPipeline::new(&Config::default());
        let geometry = InlineGeometry(host);
        let t0 = Instant::now();
        (0..frames)
            .map(|i| {
                let now = t0 + Duration::from_millis(80) * i;
                let ctx = FrameContext::capture(i as u64, host, host.viewport(), now).unwrap();
                pipeline.process_frame(&ctx, &geometry)
            })
            .collect()
    }

    #[test]
    fn test_near_foot_probe_hits_floor_under_camera() {
        let host = SimulatedHost::new(SyntheticScene::flat_floor(), 1.0, -0.9);
        let hit = horizontal(&host, 0.5, 0.95).unwrap();
        assert!(hit.y.abs() < 1e-5);
        assert!(hit.z < 0.0 && hit.z > -0.3, "near-foot hit at z={}", hit.z);
    }

    #[test]
    fn test_wide_probes_see_lower_floor_past_edge() {
        let host = SimulatedHost::new(SyntheticScene::flat_floor().with_step(0.35, 0.15), 1.0, -0.9);
        for u in [0.5, 0.2, 0.8] {
            let hit = horizontal(&host, u, 0.65).unwrap();
            assert!((hit.y + 0.15).abs() < 1e-4);
            assert!(nalgebra::distance(&hit, &host.pose().position) < 1.5);
        }
        // Near-foot probe stays on the upper floor
        assert!(horizontal(&host, 0.5, 0.95).unwrap().y.abs() < 1e-5);
    }

    #[test]
    fn test_depth_map_matches_ray_distance() {
        let host = SimulatedHost::new(SyntheticScene::flat_floor(), 1.0, -0.9);
        let frame = host.current_depth_frame().unwrap();
        // Pixel (24, 32) is centered on u=0.5104, v=0.5078
        let (origin, dir) = host.ray(24.5 / 48.0, 32.5 / 64.0);
        let t = host.scene.intersect(&origin, &dir, true, false).unwrap();
        assert!((frame.get(24, 32).unwrap() - t * dir.norm()).abs() < 1e-4);
    }

    #[test]
    fn test_step_detected_within_three_frames() {
        let host = SimulatedHost::new(SyntheticScene::flat_floor().with_step(0.35, 0.15), 1.0, -0.9);
        let outcomes = run_frames(&host, 3);

        assert!(outcomes.iter().all(|o| !o.decision.is_obstacle));
        assert!(outcomes[1].decision.is_drop_off || outcomes[2].decision.is_drop_off);
        assert_eq!(outcomes[2].alert, Some(HazardCategory::DropOff));
    }

    #[test]
    fn test_flat_floor_stays_quiet() {
        let host = SimulatedHost::new(SyntheticScene::flat_floor(), 1.0, -0.9);
        let outcomes = run_frames(&host, 10);
        assert!(outcomes.iter().all(|o| o.alert.is_none()));
        assert!(outcomes.iter().all(|o| !o.decision.is_drop_off));
    }

    #[test]
    fn test_box_ahead_is_an_obstacle() {
        let scene = SyntheticScene::flat_floor().with_box(BoxObstacle {
            center_x: 0.0,
            front_z: -0.8,
            width: 0.5,
            height: 0.9,
        });
        let host = SimulatedHost::new(scene, 1.0, -0.3);
        let outcomes = run_frames(&host, 2);

        let assessment = outcomes[0].decision.obstacle.as_ref().unwrap();
        assert!(assessment.used_depth);
        assert!(assessment.votes >= 2);
        assert!(assessment
            .readings
            .iter()
            .all(|r| r.outcome != ProbeOutcome::Person));
        assert_eq!(outcomes[1].alert, Some(HazardCategory::Obstacle));
    }

    #[test]
    fn test_without_depth_uses_ray_only_path() {
        let scene = SyntheticScene::flat_floor().with_box(BoxObstacle {
            center_x: 0.0,
            front_z: -0.8,
            width: 0.5,
            height: 0.9,
        });
        let host = SimulatedHost::new(scene, 1.0, -0.3).without_depth();
        let outcomes = run_frames(&host, 1);

        let assessment = outcomes[0].decision.obstacle.as_ref().unwrap();
        assert!(!assessment.used_depth);
        assert!(outcomes[0].decision.debug_narrative.ends_with("Fallback Obs\n"));
    }
}
