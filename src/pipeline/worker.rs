// src/pipeline/worker.rs
//
// Threading model:
//
//   host frame loop (main context)          scan worker thread
//   ──────────────────────────────          ──────────────────
//   on_frame_update → throttle → capture ──→ [frame slot] ──wake──→ take
//                                             process_frame
//   pump() ←── ray casts (run_sync, blocks) ──┤
//   pump() ←── narrative / marks / alert ─────┘ (dispatch)
//
// The worker owns the HazardPipeline outright, so baseline, drop EMA and
// alert streaks are single-writer without locks. The slot holds at most
// one waiting frame; a newer capture replaces it, so the worker always
// picks up the latest pose and depth map.

use super::frame_context::FrameContext;
use super::hazard_pipeline::{FrameOutcome, HazardPipeline};
use super::main_queue::{MainLoop, MainQueue};
use super::metrics::PipelineMetrics;
use super::scheduler::ScanScheduler;
use crate::detection::GeometrySource;
use crate::host::{HazardSink, RayCaster, RayQuery, SensingSubsystem};
use crate::types::{Config, Viewport, STARTUP_ANNOUNCEMENT};
use anyhow::{anyhow, Context, Result};
use nalgebra::Point3;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Geometry source that runs ray casts on the main context.
pub struct MainThreadGeometry<C> {
    queue: MainQueue<C>,
    metrics: PipelineMetrics,
}

impl<C> MainThreadGeometry<C> {
    pub fn new(queue: MainQueue<C>, metrics: PipelineMetrics) -> Self {
        Self { queue, metrics }
    }
}

impl<C: RayCaster + 'static> GeometrySource for MainThreadGeometry<C> {
    fn ray_cast_batch(&self, queries: &[RayQuery]) -> Vec<Option<Point3<f32>>> {
        let batch = queries.to_vec();
        let n = batch.len();

        match self
            .queue
            .run_sync(move |host: &mut C| batch.iter().map(|q| host.ray_cast(q)).collect())
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Ray cast hand-off failed, treating {} probes as misses: {}", n, e);
                self.metrics.inc(&self.metrics.handoff_failures);
                vec![None; n]
            }
        }
    }
}

/// Latest-wins hand-off between the frame loop and the worker.
#[derive(Default)]
struct FrameSlot {
    waiting: Mutex<Option<FrameContext>>,
}

impl FrameSlot {
    /// Stores `ctx`, returning the frame it replaced.
    fn put(&self, ctx: FrameContext) -> Option<FrameContext> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ctx)
    }

    fn take(&self) -> Option<FrameContext> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

pub struct ScanWorker {
    slot: Arc<FrameSlot>,
    wake: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    metrics: PipelineMetrics,
}

impl ScanWorker {
    pub fn spawn<C>(
        mut pipeline: HazardPipeline,
        queue: MainQueue<C>,
        metrics: PipelineMetrics,
    ) -> Result<Self>
    where
        C: RayCaster + HazardSink + 'static,
    {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let slot = Arc::new(FrameSlot::default());
        let worker_slot = Arc::clone(&slot);
        let geometry = MainThreadGeometry::new(queue.clone(), metrics.clone());
        let worker_metrics = metrics.clone();

        let handle = thread::Builder::new()
            .name("hazard-scan".to_string())
            .spawn(move || {
                debug!("Scan worker started");
                while wake_rx.blocking_recv().is_some() {
                    // Already taken along with an earlier wake-up
                    let Some(ctx) = worker_slot.take() else {
                        continue;
                    };
                    let started = Instant::now();
                    let FrameOutcome { decision, alert } = pipeline.process_frame(&ctx, &geometry);

                    let m = &worker_metrics;
                    m.inc(&m.frames_scanned);
                    m.set_timing(&m.scan_time_us, started.elapsed());
                    if ctx.depth.is_none() {
                        m.inc(&m.frames_without_depth);
                    }
                    if decision.is_drop_off {
                        m.inc(&m.drop_off_frames);
                    }
                    if decision.is_obstacle {
                        m.inc(&m.obstacle_frames);
                    }
                    if let Some(category) = alert {
                        m.record_alert(category);
                    }

                    let delivered = queue.dispatch(move |host: &mut C| {
                        host.show_debug(&decision.debug_narrative);
                        host.show_probe_marks(&decision.probe_marks);
                        if let Some(category) = alert {
                            host.emit(category);
                        }
                    });
                    if delivered.is_err() {
                        warn!("Main context gone, stopping scan worker");
                        break;
                    }
                }
                debug!("Scan worker stopped");
            })
            .context("failed to spawn scan worker thread")?;

        Ok(Self {
            slot,
            wake: Some(wake_tx),
            handle: Some(handle),
            metrics,
        })
    }

    /// Hands a frame to the worker, replacing any frame still waiting.
    /// Returns false if the worker has stopped.
    pub fn submit(&self, ctx: FrameContext) -> bool {
        let Some(wake) = &self.wake else {
            return false;
        };

        if let Some(stale) = self.slot.put(ctx) {
            debug!("Worker busy, frame {} superseded", stale.frame_id);
            self.metrics.inc(&self.metrics.frames_dropped_busy);
        }

        match wake.try_send(()) {
            // A full channel means a wake-up is already pending
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => {
                warn!("Scan worker is not running");
                self.slot.take();
                false
            }
        }
    }

    /// Stops the worker after its pending frame.
    ///
    /// Keeps pumping the main loop while waiting, since the worker may be
    /// blocked on a ray cast hand-off.
    pub fn shutdown<C: 'static>(mut self, main_loop: &mut MainLoop<C>) -> Result<()> {
        self.wake.take();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        while !handle.is_finished() {
            main_loop.pump();
            thread::sleep(Duration::from_millis(1));
        }
        handle
            .join()
            .map_err(|_| anyhow!("scan worker panicked"))?;

        // Deliver whatever the worker dispatched last
        main_loop.pump();
        Ok(())
    }
}

/// Host-facing entry point: throttles frame callbacks and feeds the worker.
pub struct HazardScanner {
    scheduler: ScanScheduler,
    worker: ScanWorker,
    viewport: Viewport,
    metrics: PipelineMetrics,
    next_frame_id: u64,
}

impl HazardScanner {
    pub fn start<C>(
        config: &Config,
        queue: MainQueue<C>,
        viewport: Viewport,
        metrics: PipelineMetrics,
    ) -> Result<Self>
    where
        C: RayCaster + HazardSink + 'static,
    {
        let pipeline = HazardPipeline::new(config);
        let worker = ScanWorker::spawn(pipeline, queue.clone(), metrics.clone())?;

        queue.dispatch(|host: &mut C| host.announce(STARTUP_ANNOUNCEMENT))?;
        info!(
            "🦯 Hazard scanner started (scan every {}ms, {} obstacle probes)",
            config.scan.interval_ms,
            config.probes.obstacle.len()
        );

        Ok(Self {
            scheduler: ScanScheduler::new(&config.scan),
            worker,
            viewport,
            metrics,
            next_frame_id: 0,
        })
    }

    /// Host frame callback. Returns true when the frame went to the worker.
    pub fn on_frame_update<S: SensingSubsystem + ?Sized>(&mut self, sensing: &S, now: Instant) -> bool {
        self.metrics.inc(&self.metrics.frames_offered);

        if !self.scheduler.should_scan(now) {
            self.metrics.inc(&self.metrics.frames_throttled);
            return false;
        }

        let Some(ctx) = FrameContext::capture(self.next_frame_id, sensing, self.viewport, now) else {
            debug!("No camera pose yet, skipping scan");
            self.metrics.inc(&self.metrics.frames_without_pose);
            return false;
        };
        self.next_frame_id += 1;

        self.worker.submit(ctx)
    }

    pub fn shutdown<C: 'static>(self, main_loop: &mut MainLoop<C>) -> Result<()> {
        let stats = self.scheduler.get_stats();
        info!(
            "🛑 Hazard scanner stopping: {}/{} frames scheduled ({:.0}%)",
            stats.frames_scheduled,
            stats.frames_offered,
            stats.scan_fraction * 100.0
        );
        self.worker.shutdown(main_loop)
    }
}
