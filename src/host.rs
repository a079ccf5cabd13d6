// src/host.rs
//
// Contracts with the host platform. The sensing subsystem hands us camera
// pose, depth and the display transform; the ray caster resolves screen
// points against detected planes and only works on the host's main context;
// the hazard sink turns decisions into speech, haptics and overlay updates.

use crate::detection::ProbeMark;
use crate::types::{HazardCategory, Viewport};
use anyhow::{bail, Result};
use nalgebra::{Matrix3, Point2, Point3};
use std::sync::Arc;

// ============================================================================
// CAMERA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub focal_length_x: f32,
    pub focal_length_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Rotation about the horizontal axis, negative when looking down
    pub pitch: f32,
    pub position: Point3<f32>,
    pub intrinsics: Intrinsics,
    /// Camera image size (width, height) the intrinsics refer to
    pub image_resolution: (usize, usize),
}

impl CameraPose {
    pub fn height(&self) -> f32 {
        self.position.y
    }

    pub fn distance_to(&self, point: &Point3<f32>) -> f32 {
        nalgebra::distance(&self.position, point)
    }

    /// Horizontal focal length rescaled to a depth map `depth_width` pixels wide.
    pub fn focal_length_px_for(&self, depth_width: usize) -> f32 {
        let image_width = self.image_resolution.0;
        if image_width == 0 {
            return self.intrinsics.focal_length_x;
        }
        self.intrinsics.focal_length_x * depth_width as f32 / image_width as f32
    }
}

// ============================================================================
// DEPTH
// ============================================================================

/// Row-major buffer of per-pixel distances in meters.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthFrame {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            bail!(
                "depth buffer has {} values, expected {}x{}",
                data.len(),
                width,
                height
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// A usable reading: inside the buffer, finite and positive.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let v = self.data[y * self.width + x];
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Affine map from normalized depth-texture space to normalized view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform(Matrix3<f32>);

impl DisplayTransform {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`
    pub fn from_affine(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self(Matrix3::new(a, c, tx, b, d, ty, 0.0, 0.0, 1.0))
    }

    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        self.0.transform_point(&p)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::identity()
    }
}

pub trait SensingSubsystem {
    fn current_camera_pose(&self) -> Option<CameraPose>;

    fn current_depth_frame(&self) -> Option<Arc<DepthFrame>>;

    fn display_transform(
        &self,
        orientation: InterfaceOrientation,
        viewport: Viewport,
    ) -> DisplayTransform;
}

// ============================================================================
// RAY CASTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaycastTarget {
    /// Planes already detected by the tracking session
    ExistingPlaneGeometry,
    /// Planes estimated on the fly around the hit
    EstimatedPlane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneAlignment {
    Horizontal,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    /// Viewport pixel coordinates
    pub point: Point2<f32>,
    pub target: RaycastTarget,
    pub alignment: PlaneAlignment,
}

/// Host plane hit test. Implementations may only be called on the host's
/// main context.
pub trait RayCaster {
    /// World position of the first surface hit, if any
    fn ray_cast(&self, query: &RayQuery) -> Option<Point3<f32>>;
}

// ============================================================================
// OUTPUT
// ============================================================================

pub trait HazardSink {
    /// Haptic, tone and speech feedback for a fired alert
    fn emit(&mut self, category: HazardCategory);

    fn announce(&mut self, text: &str);

    /// Per-frame diagnostic text for the overlay
    fn show_debug(&mut self, narrative: &str);

    fn show_probe_marks(&mut self, _marks: &[ProbeMark]) {}
}
