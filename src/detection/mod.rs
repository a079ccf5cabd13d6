// src/detection/mod.rs

mod baseline;
mod depth_sampler;
mod dropoff;
mod geometry_probe;
mod obstacle;
mod smoother;
mod types;

// Re-export public APIs
pub use baseline::BaselineTracker;
pub use depth_sampler::DepthSampler;
pub use dropoff::{
    depth_drop_estimate, ray_max_drop, DepthDropEstimate, DropOffEstimator, DropOffReading,
};
pub use geometry_probe::{GeometryHit, GeometryProbe, GeometrySource, InlineGeometry};
pub use obstacle::{
    estimate_height, estimate_width, ObstacleAssessment, ObstacleClassifier, ProbeOutcome,
    ProbeReading,
};
pub use smoother::AsymmetricEma;
pub use types::*;
