// src/detection/depth_sampler.rs
//
// Reads distances out of the depth frame at screen-space probe locations.
// Screen points go through the inverse display transform into depth-texture
// space first; anything landing outside the buffer is simply missing data.

use crate::host::{DepthFrame, DisplayTransform};
use crate::types::ScreenPoint;
use nalgebra::Point2;

pub struct DepthSampler<'a> {
    frame: &'a DepthFrame,
    to_texture: DisplayTransform,
}

impl<'a> DepthSampler<'a> {
    /// `None` when the display transform cannot be inverted.
    pub fn new(frame: &'a DepthFrame, display: DisplayTransform) -> Option<Self> {
        Some(Self {
            frame,
            to_texture: display.inverse()?,
        })
    }

    pub fn frame(&self) -> &'a DepthFrame {
        self.frame
    }

    /// Depth pixel under a normalized screen point
    pub fn texel_for(&self, point: ScreenPoint) -> Option<(usize, usize)> {
        let tex = self.to_texture.apply(Point2::new(point.x, point.y));
        let px = (tex.x * self.frame.width() as f32).floor();
        let py = (tex.y * self.frame.height() as f32).floor();

        if !px.is_finite() || !py.is_finite() {
            return None;
        }
        if px < 0.0 || py < 0.0 || px >= self.frame.width() as f32 || py >= self.frame.height() as f32
        {
            return None;
        }
        Some((px as usize, py as usize))
    }

    /// Single-pixel reading, no filtering
    pub fn value_at(&self, point: ScreenPoint) -> Option<f32> {
        let (x, y) = self.texel_for(point)?;
        self.frame.get(x, y)
    }

    /// Median of the valid readings in the (2r+1)² window around the point.
    ///
    /// Holes and invalid pixels are skipped; the window is clipped at the
    /// buffer edges. A radius of zero degrades to [`Self::value_at`].
    pub fn sample(&self, point: ScreenPoint, kernel_radius: usize) -> Option<f32> {
        if kernel_radius == 0 {
            return self.value_at(point);
        }

        let (cx, cy) = self.texel_for(point)?;
        let r = kernel_radius as isize;
        let mut values = Vec::with_capacity((2 * kernel_radius + 1).pow(2));

        for dy in -r..=r {
            for dx in -r..=r {
                let x = cx as isize + dx;
                let y = cy as isize + dy;
                if x < 0 || y < 0 {
                    continue;
                }
                if let Some(v) = self.frame.get(x as usize, y as usize) {
                    values.push(v);
                }
            }
        }

        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(values[values.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center_of(frame: &DepthFrame, x: usize, y: usize) -> ScreenPoint {
        ScreenPoint::new(
            (x as f32 + 0.5) / frame.width() as f32,
            (y as f32 + 0.5) / frame.height() as f32,
        )
    }

    #[test]
    fn test_median_rejects_noise_spike() {
        let mut data = vec![2.0; 25];
        data[12] = 9.0; // spike at the center pixel
        data[6] = f32::NAN;
        let frame = DepthFrame::new(5, 5, data).unwrap();
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();

        let p = center_of(&frame, 2, 2);
        assert_eq!(sampler.value_at(p), Some(9.0));
        assert_eq!(sampler.sample(p, 1), Some(2.0));
    }

    #[test]
    fn test_all_holes_is_missing() {
        let frame = DepthFrame::filled(4, 4, 0.0);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        assert_eq!(sampler.sample(ScreenPoint::new(0.5, 0.5), 1), None);
    }

    #[test]
    fn test_out_of_bounds_point() {
        let frame = DepthFrame::filled(4, 4, 1.0);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        assert_eq!(sampler.sample(ScreenPoint::new(1.2, 0.5), 1), None);
        assert_eq!(sampler.value_at(ScreenPoint::new(0.5, -0.01)), None);
    }

    #[test]
    fn test_kernel_clipped_at_corner() {
        let frame = DepthFrame::from_fn(4, 4, |x, y| 1.0 + (x + y) as f32);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        // Window at (0,0) keeps only {1,2,2,3}
        assert_eq!(sampler.sample(center_of(&frame, 0, 0), 1), Some(2.0));
    }

    #[test]
    fn test_display_transform_is_inverted() {
        // View x = 1 - texture x (mirrored)
        let frame = DepthFrame::from_fn(10, 1, |x, _| 1.0 + x as f32);
        let mirror = DisplayTransform::from_affine(-1.0, 0.0, 0.0, 1.0, 1.0, 0.0);
        let sampler = DepthSampler::new(&frame, mirror).unwrap();
        assert_eq!(sampler.value_at(ScreenPoint::new(0.05, 0.5)), Some(10.0));
    }

    #[test]
    fn test_singular_transform() {
        let frame = DepthFrame::filled(4, 4, 1.0);
        let flat = DisplayTransform::from_affine(0.0, 0.0, 0.0, 0.0, 0.5, 0.5);
        assert!(DepthSampler::new(&frame, flat).is_none());
    }
}
