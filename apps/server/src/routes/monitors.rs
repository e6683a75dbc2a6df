use std::time::SystemTime;

use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use upwatch_service::database::models::Monitor;
use upwatch_service::database::{MonitorRegistry, ResultSink};
use upwatch_service::monitoring::checker::CheckType;
use upwatch_service::monitoring::executor::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_PAUSE};
use upwatch_service::monitoring::scheduler::SchedulerError;
use upwatch_service::monitoring::validation::validate_monitor;

use crate::api_error::ApiError;
use crate::state::AppState;

macros_utils::routes! {
    route list_monitors,
    route create_monitor,
    route check_all,
    route system_stats,
    route get_monitor,
    route update_monitor,
    route delete_monitor,
    route monitor_checks,
    route monitor_stats,
}

#[derive(Debug, Deserialize)]
pub struct CreateMonitorRequest {
    pub name: String,
    pub target: String,
    pub check_type: String,
    pub interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMonitorRequest {
    pub name: Option<String>,
    pub target: Option<String>,
    pub check_type: Option<String>,
    pub interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChecksQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub hours: Option<i64>,
}

/// The scheduler may legitimately be stopped; the monitor is picked up
/// on the next start or reconcile in that case
fn schedule_if_running(result: Result<(), SchedulerError>) -> Result<(), ApiError> {
    match result {
        Ok(()) | Err(SchedulerError::NotRunning) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[get("/api/monitors")]
pub async fn list_monitors(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let monitors = state.database.find_all().await?;
    Ok(web::Json(monitors))
}

#[post("/api/monitors")]
pub async fn create_monitor(
    state: web::Data<AppState>,
    body: web::Json<CreateMonitorRequest>,
) -> Result<impl Responder, ApiError> {
    let check_type: CheckType = body
        .check_type
        .parse()
        .map_err(|e: anyhow::Error| ApiError::Validation(e.to_string()))?;

    let mut monitor = Monitor::new(body.name.clone(), body.target.clone(), check_type);
    if let Some(interval) = body.interval_seconds {
        monitor.interval_seconds = interval;
    }
    if let Some(timeout) = body.timeout_seconds {
        monitor.timeout_seconds = timeout;
    }
    if let Some(enabled) = body.enabled {
        monitor.enabled = enabled;
    }
    validate_monitor(&monitor).map_err(|e| ApiError::Validation(e.to_string()))?;

    let id = state.database.create_monitor(&monitor).await?;
    monitor.id = Some(id);
    schedule_if_running(state.scheduler.schedule_monitor(&monitor).await)?;

    Ok(HttpResponse::Created().json(monitor))
}

#[get("/api/monitors/{id}")]
pub async fn get_monitor(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let monitor = state.database.find_by_id(path.into_inner()).await?.ok_or(ApiError::NotFound)?;
    Ok(web::Json(monitor))
}

#[put("/api/monitors/{id}")]
pub async fn update_monitor(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateMonitorRequest>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    let mut monitor = state.database.find_by_id(id).await?.ok_or(ApiError::NotFound)?;

    if let Some(name) = &body.name {
        monitor.name = name.clone();
    }
    if let Some(target) = &body.target {
        monitor.target = target.clone();
    }
    if let Some(check_type) = &body.check_type {
        monitor.check_type =
            check_type.parse().map_err(|e: anyhow::Error| ApiError::Validation(e.to_string()))?;
    }
    if let Some(interval) = body.interval_seconds {
        monitor.interval_seconds = interval;
    }
    if let Some(timeout) = body.timeout_seconds {
        monitor.timeout_seconds = timeout;
    }
    if let Some(enabled) = body.enabled {
        monitor.enabled = enabled;
    }
    monitor.updated_at = SystemTime::now();
    validate_monitor(&monitor).map_err(|e| ApiError::Validation(e.to_string()))?;

    if !state.database.update_monitor(&monitor).await? {
        return Err(ApiError::NotFound);
    }
    schedule_if_running(state.scheduler.schedule_monitor(&monitor).await)?;

    Ok(web::Json(monitor))
}

#[delete("/api/monitors/{id}")]
pub async fn delete_monitor(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();

    // Stop the timer first so no check fires against a deleted row
    state.scheduler.unschedule_monitor(id).await;
    if !state.database.delete_monitor(id).await? {
        return Err(ApiError::NotFound);
    }

    Ok(HttpResponse::NoContent().finish())
}

#[get("/api/monitors/{id}/checks")]
pub async fn monitor_checks(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<ChecksQuery>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    state.database.find_by_id(id).await?.ok_or(ApiError::NotFound)?;

    let limit = query.limit.unwrap_or(100).min(1000);
    let checks = state.database.recent_checks(id, limit).await?;
    Ok(web::Json(checks))
}

#[get("/api/monitors/{id}/stats")]
pub async fn monitor_stats(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<StatsQuery>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    state.database.find_by_id(id).await?.ok_or(ApiError::NotFound)?;

    let hours = query.hours.unwrap_or(24).clamp(1, 24 * 90);
    let stats = state.database.monitor_stats(id, hours).await?;
    Ok(web::Json(stats))
}

#[get("/api/system/stats")]
pub async fn system_stats(
    state: web::Data<AppState>,
    query: web::Query<StatsQuery>,
) -> Result<impl Responder, ApiError> {
    let hours = query.hours.unwrap_or(24).clamp(1, 24 * 90);
    let stats = state.database.system_stats(hours).await?;
    Ok(web::Json(stats))
}

#[post("/api/monitors/check-all")]
pub async fn check_all(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let monitors = state.database.find_all_active().await?;
    let results = state
        .executor
        .check_batch(&monitors, DEFAULT_BATCH_CONCURRENCY, Some(DEFAULT_BATCH_PAUSE))
        .await;

    for result in &results {
        if let Err(e) = state.database.record(result).await {
            error!("Failed to record result for monitor {}: {:#}", result.monitor_id, e);
        }
    }

    Ok(web::Json(json!({ "checked": results.len(), "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use std::sync::Arc;
    use tempfile::TempDir;
    use upwatch_service::database::{self, DatabaseImpl};
    use upwatch_service::monitoring::{CheckScheduler, ProbeExecutor};

    async fn test_state() -> (web::Data<AppState>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("api.db");
        let pool = database::connect(&db_path.to_string_lossy()).await.unwrap();
        let database = Arc::new(DatabaseImpl::new_from_pool(pool));
        let executor = Arc::new(ProbeExecutor::new().unwrap());
        let scheduler =
            Arc::new(CheckScheduler::new(database.clone(), database.clone(), executor.clone()));

        (web::Data::new(AppState { scheduler, database, executor }), dir)
    }

    #[actix_web::test]
    async fn create_rejects_invalid_targets() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/monitors")
            .set_json(json!({
                "name": "bad",
                "target": "ftp://example.com",
                "check_type": "http",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn create_and_fetch_monitor() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/monitors")
            .set_json(json!({
                "name": "internal db",
                "target": "db.internal:5432",
                "check_type": "tcp",
                "interval_seconds": 30,
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: Monitor = test::read_body_json(res).await;
        assert_eq!(created.interval_seconds, 30);

        let req = test::TestRequest::get()
            .uri(&format!("/api/monitors/{}", created.uuid))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let fetched: Monitor = test::read_body_json(res).await;
        assert_eq!(fetched.name, "internal db");
    }

    #[actix_web::test]
    async fn missing_monitor_is_not_found() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/monitors/{}", Uuid::new_v4()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn delete_removes_monitor_and_answers_again_with_404() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/monitors")
            .set_json(json!({
                "name": "short lived",
                "target": "example.com:443",
                "check_type": "tcp",
            }))
            .to_request();
        let created: Monitor = test::read_body_json(test::call_service(&app, req).await).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/monitors/{}", created.uuid))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/monitors/{}", created.uuid))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
