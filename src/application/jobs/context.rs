use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::schedule::{RefillService, SlotCalendar, SlotOutcomeService};

/// Services shared by the cron workers.
#[derive(Clone)]
pub struct ScheduleJobContext {
    pub refill: Arc<RefillService>,
    pub outcomes: Arc<SlotOutcomeService>,
    pub calendar: SlotCalendar,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
