use std::sync::Arc;
use crate::domain::services::scheduler::SchedulerService;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub scheduler: Arc<SchedulerService>,
}
