//! Pipeline orchestration for run processing.

mod metrics;
mod run_worker;
mod scheduler;
mod split;


pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot};
pub use run_worker::{RunOutput, RunWorker};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerOutput, SchedulerStats};
pub use split::{shuffle_and_split, split_points, CorpusSplit, SHUFFLE_SEED};
