pub mod health;
pub mod monitors;
pub mod scheduler;

/// Register every route group on the app
pub fn routes(cfg: &mut actix_web::web::ServiceConfig) {
    health::routes(cfg);
    monitors::routes(cfg);
    scheduler::routes(cfg);
}
