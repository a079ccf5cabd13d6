// src/detection/types.rs
use super::dropoff::DropOffReading;
use super::obstacle::ObstacleAssessment;
use crate::types::ScreenPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRole {
    Baseline,
    /// Index into the wide-stance table
    DropOff(usize),
    /// Index into the obstacle table
    Obstacle(usize),
}

/// Overlay color class of a probe mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkState {
    /// Probed, nothing notable
    Idle,
    /// Part of an active drop-off warning
    Danger,
    NoHit,
    /// Ray and depth disagreed
    Inconsistent,
    Person,
    Obstacle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeMark {
    pub role: ProbeRole,
    pub point: ScreenPoint,
    pub state: MarkState,
}

/// Per-frame result of the detection pipeline.
#[derive(Debug, Clone, Default)]
pub struct HazardDecision {
    pub is_drop_off: bool,
    pub is_obstacle: bool,
    pub debug_narrative: String,
    pub probe_marks: Vec<ProbeMark>,
    /// Present only when a baseline existed and the camera looked down
    pub drop_off: Option<DropOffReading>,
    pub obstacle: Option<ObstacleAssessment>,
}

impl HazardDecision {
    pub fn any_hazard(&self) -> bool {
        self.is_drop_off || self.is_obstacle
    }

    pub fn obstacle_votes(&self) -> usize {
        self.obstacle.as_ref().map_or(0, |o| o.votes)
    }
}
