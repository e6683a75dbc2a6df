use std::sync::Arc;

use upwatch_service::database::DatabaseImpl;
use upwatch_service::monitoring::{CheckScheduler, ProbeExecutor};

/// Shared handles every route receives through `web::Data`
pub struct AppState {
    pub scheduler: Arc<CheckScheduler>,
    pub database: Arc<DatabaseImpl>,
    pub executor: Arc<ProbeExecutor>,
}
