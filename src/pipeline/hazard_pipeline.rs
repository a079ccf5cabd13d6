// src/pipeline/hazard_pipeline.rs
//
// One frame, start to finish:
//
//   looking down? ── yes → baseline + wide probes (one batch)
//        │                  → baseline update → drop-off estimate
//        │ no → "Pitch high"
//        ▼
//   obstacle probes (one batch) → classify (depth or ray-only)
//        ▼
//   HazardDecision → alert arbiter → Option<HazardCategory>
//
// All state that lives across frames (baseline, drop EMA, alert streaks)
// is owned here and only touched by the worker running this pipeline.

use super::alert_arbiter::AlertArbiter;
use super::frame_context::FrameContext;
use crate::detection::{
    BaselineTracker, DropOffEstimator, GeometryProbe, GeometrySource, HazardDecision, MarkState,
    ObstacleClassifier, ProbeMark, ProbeRole,
};
use crate::host::{PlaneAlignment, RaycastTarget};
use crate::types::{Config, DropOffConfig, HazardCategory, ProbeLayout};
use std::fmt::Write;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub decision: HazardDecision,
    pub alert: Option<HazardCategory>,
}

pub struct HazardPipeline {
    layout: ProbeLayout,
    drop_off_config: DropOffConfig,
    baseline: BaselineTracker,
    drop_off: DropOffEstimator,
    obstacles: ObstacleClassifier,
    arbiter: AlertArbiter,
}

impl HazardPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: config.probes.clone(),
            drop_off_config: config.drop_off.clone(),
            baseline: BaselineTracker::new(&config.baseline),
            drop_off: DropOffEstimator::new(config.drop_off.clone()),
            obstacles: ObstacleClassifier::new(config.obstacle.clone()),
            arbiter: AlertArbiter::new(config.alert.clone()),
        }
    }

    /// Decision plus arbitration for one frame.
    pub fn process_frame<G: GeometrySource + ?Sized>(
        &mut self,
        ctx: &FrameContext,
        geometry: &G,
    ) -> FrameOutcome {
        let decision = self.decide(ctx, geometry);
        let alert = self.arbiter.update(&decision, ctx.captured_at);
        FrameOutcome { decision, alert }
    }

    /// Per-frame hazard decision without arbitration.
    pub fn decide<G: GeometrySource + ?Sized>(
        &mut self,
        ctx: &FrameContext,
        geometry: &G,
    ) -> HazardDecision {
        let probe = GeometryProbe::new(geometry, ctx.pose.position, ctx.viewport);
        let sampler = ctx.depth_sampler();
        let mut decision = HazardDecision::default();

        if ctx.is_looking_down(self.drop_off_config.pitch_threshold) {
            let mut points = Vec::with_capacity(self.layout.drop_off.len() + 1);
            points.push(self.layout.baseline);
            points.extend_from_slice(&self.layout.drop_off);

            let hits = probe.probe_all(
                &points,
                RaycastTarget::ExistingPlaneGeometry,
                PlaneAlignment::Horizontal,
            );
            let (baseline_hit, wide_hits) = match hits.split_first() {
                Some((first, rest)) => (*first, rest),
                None => (None, &[][..]),
            };

            decision.probe_marks.push(ProbeMark {
                role: ProbeRole::Baseline,
                point: self.layout.baseline,
                state: if baseline_hit.is_some() {
                    MarkState::Idle
                } else {
                    MarkState::NoHit
                },
            });

            match self.baseline.update(baseline_hit.as_ref()) {
                Some(floor_y) => {
                    let reading = self.drop_off.estimate(
                        floor_y,
                        wide_hits,
                        sampler.as_ref(),
                        self.layout.depth_reference,
                        &self.layout.drop_off,
                    );
                    let _ = writeln!(
                        decision.debug_narrative,
                        "Base:{:.3} MaxDrop:{:.3} EMA:{:.3}",
                        reading.baseline, reading.max_drop, reading.smoothed
                    );
                    decision.is_drop_off = reading.is_danger;
                    decision.drop_off = Some(reading);
                }
                None => decision.debug_narrative.push_str("Baseline N/A\n"),
            }

            let drop_state = if decision.is_drop_off {
                MarkState::Danger
            } else {
                MarkState::Idle
            };
            decision
                .probe_marks
                .extend(self.layout.drop_off.iter().enumerate().map(|(i, point)| ProbeMark {
                    role: ProbeRole::DropOff(i),
                    point: *point,
                    state: drop_state,
                }));
        } else {
            decision
                .debug_narrative
                .push_str("Pitch high (not looking down)\n");
        }

        let obstacle_hits = probe.probe_all(
            &self.layout.obstacle,
            RaycastTarget::EstimatedPlane,
            PlaneAlignment::Any,
        );
        let assessment = self.obstacles.classify(
            &self.layout.obstacle,
            &obstacle_hits,
            sampler.as_ref(),
            ctx.focal_length_px(),
            self.baseline.floor_y(),
            ctx.pose.height(),
        );

        decision.is_obstacle = assessment.is_obstacle;
        decision.debug_narrative.push_str(&assessment.narrative());
        decision
            .probe_marks
            .extend(assessment.readings.iter().map(|r| ProbeMark {
                role: ProbeRole::Obstacle(r.index),
                point: r.point,
                state: r.outcome.mark_state(),
            }));
        decision.obstacle = Some(assessment);

        debug!(
            "Frame {}: drop_off={} obstacle={} votes={}",
            ctx.frame_id,
            decision.is_drop_off,
            decision.is_obstacle,
            decision.obstacle_votes()
        );

        decision
    }

    pub fn floor_y(&self) -> Option<f32> {
        self.baseline.floor_y()
    }

    pub fn smoothed_drop(&self) -> f32 {
        self.drop_off.smoothed()
    }

    pub fn arbiter(&self) -> &AlertArbiter {
        &self.arbiter
    }

    /// New scanning session: forget the floor, the drop EMA and the streaks
    pub fn reset(&mut self) {
        self.baseline.reset();
        self.drop_off.reset();
        self.arbiter.reset();
    }
}
