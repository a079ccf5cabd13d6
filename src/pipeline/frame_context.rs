// src/pipeline/frame_context.rs
//
// Everything the worker needs about one frame, captured on the host side
// at scan time. The worker never goes back to the sensing subsystem, so
// pose, depth and display transform always belong to the same instant.

use crate::detection::DepthSampler;
use crate::host::{CameraPose, DepthFrame, DisplayTransform, InterfaceOrientation, SensingSubsystem};
use crate::types::Viewport;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_id: u64,
    pub captured_at: Instant,
    pub pose: CameraPose,
    pub depth: Option<Arc<DepthFrame>>,
    pub display_transform: DisplayTransform,
    pub viewport: Viewport,
}

impl FrameContext {
    /// Snapshot of the sensing subsystem; `None` while tracking has no pose.
    pub fn capture<S: SensingSubsystem + ?Sized>(
        frame_id: u64,
        sensing: &S,
        viewport: Viewport,
        captured_at: Instant,
    ) -> Option<Self> {
        let pose = sensing.current_camera_pose()?;
        Some(Self {
            frame_id,
            captured_at,
            pose,
            depth: sensing.current_depth_frame(),
            display_transform: sensing.display_transform(InterfaceOrientation::Portrait, viewport),
            viewport,
        })
    }

    /// Sampler over this frame's depth map, if it has a usable one
    pub fn depth_sampler(&self) -> Option<DepthSampler<'_>> {
        let frame = self.depth.as_deref()?;
        DepthSampler::new(frame, self.display_transform)
    }

    /// Horizontal focal length in depth-map pixels
    pub fn focal_length_px(&self) -> f32 {
        match &self.depth {
            Some(frame) => self.pose.focal_length_px_for(frame.width()),
            None => 0.0,
        }
    }

    pub fn is_looking_down(&self, pitch_threshold: f32) -> bool {
        self.pose.pitch < pitch_threshold
    }
}
