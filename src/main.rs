// src/main.rs
//
// Simulated walk: a cane-mounted camera moves toward a step down while the
// scanner runs on its worker thread. This loop plays the host's main
// context, pumping ray casts and sink updates every rendered frame.

use anyhow::Result;
use smart_cane::pipeline::{main_queue, HazardScanner, PipelineEvent, PipelineMetrics};
use smart_cane::sim::SimulatedHost;
use smart_cane::Config;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::load(CONFIG_PATH);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🦯 Smart cane hazard simulation starting");
    match loaded {
        Ok(_) => info!("✓ Configuration loaded from {}", CONFIG_PATH),
        Err(e) => warn!("Using default configuration: {:#}", e),
    }

    let sim = config.simulation.clone();
    info!(
        "Scene: camera {:.2}m high, pitch {:.2} rad, {:.2}m step {:.2}m ahead, walking {:.2} m/s",
        sim.camera_height, sim.camera_pitch, sim.step_drop, sim.step_distance, sim.walking_speed
    );

    let host = SimulatedHost::from_config(&sim);
    let viewport = host.viewport();
    let (queue, mut main_loop) = main_queue(host);
    let metrics = PipelineMetrics::new();

    let mut scanner = HazardScanner::start(&config, queue, viewport, metrics.clone())?;

    let frame_period = Duration::from_secs_f64(1.0 / f64::from(sim.render_fps.max(1)));
    let mut ticker = tokio::time::interval(frame_period);
    let started = Instant::now();
    let mut last_tick = started;

    while started.elapsed().as_secs_f64() < sim.duration_secs {
        ticker.tick().await;
        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        main_loop.context_mut().walk(sim.walking_speed * dt);
        main_loop.pump();
        scanner.on_frame_update(main_loop.context(), now);
        report_events(main_loop.context_mut());
    }

    tokio::task::block_in_place(|| scanner.shutdown(&mut main_loop))?;
    report_events(main_loop.context_mut());

    let summary = metrics.summary();
    info!("\n========================================");
    info!("✓ Simulation finished");
    info!("  Frames offered: {}", summary.frames_offered);
    info!(
        "  Frames scanned: {} ({:.1}/s)",
        summary.frames_scanned, summary.scan_rate
    );
    info!(
        "  Throttled: {}  Dropped (worker busy): {}",
        summary.frames_throttled, summary.frames_dropped_busy
    );
    info!(
        "  🕳️  Drop-off frames: {}  alerts: {}",
        summary.drop_off_frames, summary.drop_off_alerts
    );
    info!(
        "  🚧 Obstacle frames: {}  alerts: {}",
        summary.obstacle_frames, summary.obstacle_alerts
    );
    if summary.handoff_failures > 0 {
        warn!("  Ray cast hand-off failures: {}", summary.handoff_failures);
    }
    info!("========================================\n");
    debug!("Metrics summary:\n{}", serde_yaml::to_string(&summary)?);

    Ok(())
}

/// Drains the simulated sink and logs what the user would have heard.
fn report_events(host: &mut SimulatedHost) {
    let walked = host.walked();
    for event in host.sink_mut().drain() {
        match event {
            PipelineEvent::HazardEmitted { category, .. } => {
                info!("   {} after {:.2}m walked", category, walked);
            }
            PipelineEvent::Narrative(text) => {
                debug!("{}", text.trim_end().replace('\n', " | "));
            }
            PipelineEvent::Announcement(_) | PipelineEvent::ProbeMarks(_) => {}
        }
    }
}
