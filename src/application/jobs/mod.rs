mod context;
mod missed_sweep;
mod refill;

pub use context::{ScheduleJobContext, job_failed};
pub use missed_sweep::{DEFAULT_SWEEP_CRON, MissedSweepJob, process_missed_sweep_job};
pub use refill::{DEFAULT_REFILL_CRON, RefillJob, process_refill_job};
