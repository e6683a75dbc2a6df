use std::io::Error as IoError;

use thiserror::Error;

use upwatch_service::monitoring::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] upwatch_service::config::Error),
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("{0:#}")]
    Setup(#[from] anyhow::Error),
}
