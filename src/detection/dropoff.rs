// src/detection/dropoff.rs
//
// Wide-stance drop-off estimation.
//
// Signal flow per frame:
//   wide ray hits (center/left/right) ─→ drop below baseline ─┐
//                                                             ├→ max → asymmetric EMA → danger
//   near-foot depth vs wide depths ───→ forward gap (fallback)┘
//
// The depth fallback only runs when the rays found nothing close enough or
// nothing dangerous, and only contributes when it flags a ledge itself.
// Forward gap and vertical drop are different quantities that happen to
// share the max(); they should be tuned separately.

use super::depth_sampler::DepthSampler;
use super::geometry_probe::GeometryHit;
use super::smoother::AsymmetricEma;
use crate::types::{DropOffConfig, ScreenPoint};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthDropEstimate {
    pub near_foot_depth: f32,
    /// Largest positive `probe depth - near-foot depth` among gated probes
    pub max_forward_gap: f32,
    pub is_danger: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropOffReading {
    pub baseline: f32,
    /// `None` when no wide probe hit within the distance gate
    pub ray_max_drop: Option<f32>,
    pub depth: Option<DepthDropEstimate>,
    /// Merged drop fed into the smoother
    pub max_drop: f32,
    pub smoothed: f32,
    pub is_danger: bool,
}

/// Worst drop below the baseline among hits closer than `max_distance`.
///
/// Hits above the baseline count as zero. Returns `None` when no hit
/// survives the distance gate.
pub fn ray_max_drop(baseline: f32, hits: &[Option<GeometryHit>], max_distance: f32) -> Option<f32> {
    let mut retained = hits
        .iter()
        .flatten()
        .filter(|h| h.distance_from_camera < max_distance)
        .peekable();

    retained.peek()?;
    Some(retained.fold(0.0_f32, |worst, h| worst.max(baseline - h.y())))
}

/// Forward-gap estimate from the depth map.
///
/// Compares each wide probe's median depth against the near-foot reference.
/// Probes whose raw depth is beyond the distance gate are skipped.
pub fn depth_drop_estimate(
    sampler: &DepthSampler<'_>,
    reference: ScreenPoint,
    probes: &[ScreenPoint],
    config: &DropOffConfig,
) -> Option<DepthDropEstimate> {
    let near_foot_depth = sampler.sample(reference, config.depth_kernel_radius)?;

    let mut max_forward_gap = 0.0_f32;
    let mut danger_probes = 0;

    for probe in probes {
        let Some(depth) = sampler.sample(*probe, config.depth_kernel_radius) else {
            continue;
        };
        if depth >= config.max_check_distance {
            continue;
        }

        let forward_gap = depth - near_foot_depth;
        max_forward_gap = max_forward_gap.max(forward_gap);
        if forward_gap > config.depth_danger_gap {
            danger_probes += 1;
        }
    }

    Some(DepthDropEstimate {
        near_foot_depth,
        max_forward_gap,
        is_danger: danger_probes > 0,
    })
}

pub struct DropOffEstimator {
    config: DropOffConfig,
    smoothed: AsymmetricEma,
}

impl DropOffEstimator {
    pub fn new(config: DropOffConfig) -> Self {
        let smoothed = AsymmetricEma::from_config(&config);
        Self { config, smoothed }
    }

    /// One frame of drop-off estimation against an established baseline.
    ///
    /// `wide_hits` lines up with `wide_probes`; `depth` is absent when the
    /// frame carried no usable depth map.
    pub fn estimate(
        &mut self,
        baseline: f32,
        wide_hits: &[Option<GeometryHit>],
        depth: Option<&DepthSampler<'_>>,
        depth_reference: ScreenPoint,
        wide_probes: &[ScreenPoint],
    ) -> DropOffReading {
        let ray = ray_max_drop(baseline, wide_hits, self.config.max_check_distance);
        let mut max_drop = ray.unwrap_or(0.0);
        let mut depth_estimate = None;

        if ray.is_none() || max_drop < self.config.danger_height {
            if let Some(sampler) = depth {
                depth_estimate =
                    depth_drop_estimate(sampler, depth_reference, wide_probes, &self.config);
                if let Some(est) = depth_estimate.filter(|e| e.is_danger) {
                    debug!(
                        "Depth fallback flagged ledge: forward gap {:.3}m",
                        est.max_forward_gap
                    );
                    max_drop = max_drop.max(est.max_forward_gap);
                }
            }
        }

        let smoothed = self.smoothed.update(max_drop);

        DropOffReading {
            baseline,
            ray_max_drop: ray,
            depth: depth_estimate,
            max_drop,
            smoothed,
            is_danger: smoothed > self.config.danger_height,
        }
    }

    pub fn smoothed(&self) -> f32 {
        self.smoothed.value()
    }

    pub fn reset(&mut self) {
        self.smoothed.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DepthFrame, DisplayTransform};
    use crate::types::DROP_OFF_PROBES;
    use nalgebra::Point3;

    fn hit(y: f32, dist: f32) -> Option<GeometryHit> {
        Some(GeometryHit {
            world_position: Point3::new(0.0, y, -0.6),
            distance_from_camera: dist,
        })
    }

    const REFERENCE: ScreenPoint = ScreenPoint::new(0.5, 0.90);

    fn estimator() -> DropOffEstimator {
        DropOffEstimator::new(DropOffConfig::default())
    }

    #[test]
    fn test_worst_probe_wins() {
        let hits = [hit(1.00, 1.0), hit(1.00, 1.0), hit(0.85, 1.0)];
        let drop = ray_max_drop(1.00, &hits, 1.5).unwrap();
        assert!((drop - 0.15).abs() < 1e-5);
    }

    #[test]
    fn test_distance_gate() {
        let hits = [hit(0.2, 1.6), None, hit(1.0, 1.49)];
        assert_eq!(ray_max_drop(1.0, &hits, 1.5), Some(0.0));
        assert_eq!(ray_max_drop(1.0, &[hit(0.2, 1.5), None], 1.5), None);
    }

    #[test]
    fn test_lowering_one_probe_never_reduces_max_drop() {
        let baseline = 0.0;
        for delta in [0.01_f32, 0.05, 0.2, 1.0] {
            for lowered in 0..3 {
                let level: Vec<_> = (0..3).map(|_| hit(-0.02, 1.0)).collect();
                let mut stepped = level.clone();
                stepped[lowered] = hit(-0.02 - delta, 1.0);

                let a = ray_max_drop(baseline, &level, 1.5).unwrap();
                let b = ray_max_drop(baseline, &stepped, 1.5).unwrap();
                assert!(b >= a, "lowering probe {} by {} reduced drop", lowered, delta);
            }
        }
    }

    #[test]
    fn test_scenario_step_under_left_probe() {
        let mut est = estimator();
        let hits = [hit(1.00, 1.2), hit(1.00, 1.2), hit(0.85, 1.3)];

        let first = est.estimate(1.0, &hits, None, REFERENCE, &DROP_OFF_PROBES);
        assert!((first.max_drop - 0.15).abs() < 1e-5);
        assert!(!first.is_danger);

        let second = est.estimate(1.0, &hits, None, REFERENCE, &DROP_OFF_PROBES);
        assert!(second.is_danger);
        assert!(second.smoothed > 0.10);
    }

    #[test]
    fn test_fast_rise_flags_same_frame() {
        let mut est = estimator();
        let hits = [hit(0.5, 1.0), None, None];
        let reading = est.estimate(1.0, &hits, None, REFERENCE, &DROP_OFF_PROBES);
        assert!(reading.is_danger);
    }

    #[test]
    fn test_slow_fall_holds_after_spike() {
        let mut est = estimator();
        let spike = [hit(0.5, 1.0), None, None];
        let level = [hit(1.0, 1.0), hit(1.0, 1.0), hit(1.0, 1.0)];

        assert!(est.estimate(1.0, &spike, None, REFERENCE, &DROP_OFF_PROBES).is_danger);
        let after = est.estimate(1.0, &level, None, REFERENCE, &DROP_OFF_PROBES);
        assert_eq!(after.max_drop, 0.0);
        assert!(after.is_danger, "warning cancelled by one clean frame");
    }

    fn ledge_depth(near: f32, far: f32) -> DepthFrame {
        // Rows above the 0.8 line read `far`, below read `near`
        DepthFrame::from_fn(32, 40, |_, y| if y < 32 { far } else { near })
    }

    #[test]
    fn test_depth_fallback_flags_ledge() {
        let frame = ledge_depth(0.6, 1.3);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        let mut est = estimator();

        let reading = est.estimate(1.0, &[None, None, None], Some(&sampler), REFERENCE, &DROP_OFF_PROBES);
        let depth = reading.depth.unwrap();
        assert!(depth.is_danger);
        assert!((reading.max_drop - 0.7).abs() < 1e-5);
        assert!(reading.is_danger);
    }

    #[test]
    fn test_depth_gap_below_threshold_not_merged() {
        let frame = ledge_depth(0.9, 1.3);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        let mut est = estimator();

        let reading = est.estimate(1.0, &[None, None, None], Some(&sampler), REFERENCE, &DROP_OFF_PROBES);
        let depth = reading.depth.unwrap();
        assert!(!depth.is_danger);
        assert!((depth.max_forward_gap - 0.4).abs() < 1e-5);
        assert_eq!(reading.max_drop, 0.0);
        assert!(!reading.is_danger);
    }

    #[test]
    fn test_depth_beyond_gate_ignored() {
        let frame = ledge_depth(0.6, 2.0);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        let est = depth_drop_estimate(&sampler, REFERENCE, &DROP_OFF_PROBES, &DropOffConfig::default())
            .unwrap();
        assert_eq!(est.max_forward_gap, 0.0);
        assert!(!est.is_danger);
    }

    #[test]
    fn test_dangerous_ray_skips_depth() {
        let frame = ledge_depth(0.6, 1.3);
        let sampler = DepthSampler::new(&frame, DisplayTransform::identity()).unwrap();
        let mut est = estimator();

        let hits = [hit(0.8, 1.0), None, None];
        let reading = est.estimate(1.0, &hits, Some(&sampler), REFERENCE, &DROP_OFF_PROBES);
        assert!(reading.depth.is_none());
        assert!((reading.max_drop - 0.2).abs() < 1e-5);
    }
}
