use actix_web::{Responder, get, post, web};
use serde_json::json;
use uuid::Uuid;

use upwatch_service::monitoring::scheduler::CheckOutcome;

use crate::api_error::ApiError;
use crate::state::AppState;

macros_utils::routes! {
    route start_scheduler,
    route stop_scheduler,
    route restart_scheduler,
    route scheduler_status,
    route scheduler_jobs,
    route run_check,
}

#[post("/api/scheduler/start")]
pub async fn start_scheduler(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let scheduled = state.scheduler.start().await?;
    Ok(web::Json(json!({ "scheduled": scheduled })))
}

#[post("/api/scheduler/stop")]
pub async fn stop_scheduler(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let stopped = state.scheduler.stop().await?;
    Ok(web::Json(json!({ "stopped": stopped })))
}

#[post("/api/scheduler/restart")]
pub async fn restart_scheduler(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let scheduled = state.scheduler.restart().await?;
    Ok(web::Json(json!({ "scheduled": scheduled })))
}

#[get("/api/scheduler/status")]
pub async fn scheduler_status(state: web::Data<AppState>) -> impl Responder {
    web::Json(state.scheduler.get_status().await)
}

#[get("/api/scheduler/jobs")]
pub async fn scheduler_jobs(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let summary = state.scheduler.scheduled_jobs().await?;
    Ok(web::Json(summary))
}

/// Run one check immediately, bypassing the monitor's timer
#[post("/api/scheduler/run/{id}")]
pub async fn run_check(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    match state.scheduler.run_monitor_check(path.into_inner()).await? {
        CheckOutcome::Completed(result) => Ok(web::Json(result)),
        CheckOutcome::Skipped => Err(ApiError::NotFound),
    }
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

    use crate::state::AppState;

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
    async fn status_reports_stopped_scheduler() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::get().uri("/api/scheduler/status").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["running"], json!(false));
        assert_eq!(body["scheduled_count"], json!(0));
        assert_eq!(body["stats"]["total_checks"], json!(0));
    }

    #[actix_web::test]
    async fn stop_without_start_conflicts() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post().uri("/api/scheduler/stop").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn start_then_status_then_stop() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post().uri("/api/scheduler/start").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["scheduled"], json!(0));

        let req = test::TestRequest::get().uri("/api/scheduler/status").to_request();
        let body: serde_json::Value =
            test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["running"], json!(true));

        let req = test::TestRequest::post().uri("/api/scheduler/stop").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn run_check_on_unknown_monitor_is_not_found() {
        let (state, _dir) = test_state().await;
        let app =
            test::init_service(App::new().app_data(state).configure(crate::routes::routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/scheduler/run/{}", Uuid::new_v4()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
