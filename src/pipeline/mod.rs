// src/pipeline/mod.rs

pub mod alert_arbiter;
pub mod event_bus;
pub mod frame_context;
pub mod hazard_pipeline;
pub mod main_queue;
pub mod metrics;
pub mod scheduler;
pub mod worker;

pub use alert_arbiter::AlertArbiter;
pub use event_bus::{EventBus, PipelineEvent};
pub use frame_context::FrameContext;
pub use hazard_pipeline::{FrameOutcome, HazardPipeline};
pub use main_queue::{main_queue, MainLoop, MainQueue};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use scheduler::{ScanScheduler, SchedulerStats};
pub use worker::{HazardScanner, MainThreadGeometry, ScanWorker};
