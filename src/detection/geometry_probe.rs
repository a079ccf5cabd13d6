// src/detection/geometry_probe.rs
//
// Screen point -> world hit, through whatever answers ray casts. On device
// that is the main-context queue (see pipeline::main_queue); in tests and
// single-threaded hosts it is a plain RayCaster wrapped in InlineGeometry.

use crate::host::{PlaneAlignment, RayCaster, RayQuery, RaycastTarget};
use crate::types::{ScreenPoint, Viewport};
use nalgebra::{Point2, Point3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryHit {
    pub world_position: Point3<f32>,
    pub distance_from_camera: f32,
}

impl GeometryHit {
    pub fn y(&self) -> f32 {
        self.world_position.y
    }
}

/// Answers a batch of ray casts in one round trip.
pub trait GeometrySource {
    /// One entry per query, in order
    fn ray_cast_batch(&self, queries: &[RayQuery]) -> Vec<Option<Point3<f32>>>;
}

/// Calls the ray caster directly on the current thread.
pub struct InlineGeometry<'a, R>(pub &'a R);

impl<R: RayCaster> GeometrySource for InlineGeometry<'_, R> {
    fn ray_cast_batch(&self, queries: &[RayQuery]) -> Vec<Option<Point3<f32>>> {
        queries.iter().map(|q| self.0.ray_cast(q)).collect()
    }
}

pub struct GeometryProbe<'a, G: ?Sized> {
    source: &'a G,
    camera: Point3<f32>,
    viewport: Viewport,
}

impl<'a, G: GeometrySource + ?Sized> GeometryProbe<'a, G> {
    pub fn new(source: &'a G, camera: Point3<f32>, viewport: Viewport) -> Self {
        Self {
            source,
            camera,
            viewport,
        }
    }

    pub fn query(
        &self,
        point: ScreenPoint,
        target: RaycastTarget,
        alignment: PlaneAlignment,
    ) -> RayQuery {
        let (px, py) = point.to_viewport(self.viewport);
        RayQuery {
            point: Point2::new(px, py),
            target,
            alignment,
        }
    }

    pub fn probe(
        &self,
        point: ScreenPoint,
        target: RaycastTarget,
        alignment: PlaneAlignment,
    ) -> Option<GeometryHit> {
        self.probe_all(&[point], target, alignment)
            .into_iter()
            .next()
            .flatten()
    }

    /// Probes every point with one call into the geometry source.
    pub fn probe_all(
        &self,
        points: &[ScreenPoint],
        target: RaycastTarget,
        alignment: PlaneAlignment,
    ) -> Vec<Option<GeometryHit>> {
        let queries: Vec<RayQuery> = points
            .iter()
            .map(|p| self.query(*p, target, alignment))
            .collect();

        let mut positions = self.source.ray_cast_batch(&queries);
        positions.resize(queries.len(), None);

        positions
            .into_iter()
            .map(|hit| {
                hit.map(|world_position| GeometryHit {
                    world_position,
                    distance_from_camera: nalgebra::distance(&world_position, &self.camera),
                })
            })
            .collect()
    }
}
