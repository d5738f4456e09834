use std::sync::Arc;

use crate::application::admin_auth::AdminAuth;
use crate::application::pool::PoolAdminService;
use crate::application::repos::HealthRepo;
use crate::application::schedule::{
    ForecastService, ReconcileService, RefillService, SlotCalendar, SlotOutcomeService,
};

#[derive(Clone)]
pub struct AdminState {
    pub auth: Arc<AdminAuth>,
    pub calendar: SlotCalendar,
    pub forecast: Arc<ForecastService>,
    pub refill: Arc<RefillService>,
    pub reconcile: Arc<ReconcileService>,
    pub outcomes: Arc<SlotOutcomeService>,
    pub pool: Arc<PoolAdminService>,
    pub health: Arc<dyn HealthRepo>,
}
