//! Core uptime monitoring engine: scheduling, probes, and storage.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod pool;
pub mod retention;
