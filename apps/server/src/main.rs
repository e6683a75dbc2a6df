#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::info;

mod api_error;
mod error;
mod routes;
mod state;

use error::AppError;
use logger::init_tracing;
use state::AppState;
use upwatch_service::config::Config;
use upwatch_service::database::{self, DatabaseImpl};
use upwatch_service::monitoring::{CheckScheduler, ProbeExecutor};
use upwatch_service::retention::{RetentionCleanup, RetentionPolicy};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_path = std::env::var_os("UPWATCH_CONFIG").map(PathBuf::from);
    let config = Config::from_config(config_path.as_deref())?;
    info!("{}", config);

    let addr: SocketAddr = format!("{}:{}", config.api.bind, config.api.port).parse()?;

    let pool = database::connect(&config.database.path).await?;
    let database = Arc::new(DatabaseImpl::new_from_pool(pool));
    let executor = Arc::new(ProbeExecutor::new()?);
    let scheduler =
        Arc::new(CheckScheduler::new(database.clone(), database.clone(), executor.clone()));

    let scheduled = scheduler.start().await?;
    info!("Monitoring {} targets", scheduled);

    let retention = RetentionCleanup::new(
        database.clone(),
        RetentionPolicy { result_days: config.monitoring.retention_days },
    );
    let _retention_handle = retention.start_periodic_cleanup();

    let state = web::Data::new(AppState { scheduler, database, executor });
    run_server(addr, state).await
}

async fn run_server(addr: SocketAddr, state: web::Data<AppState>) -> Result<(), AppError> {
    info!("API listening on {}", addr);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
