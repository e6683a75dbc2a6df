use anyhow::{Result, bail};
use async_trait::async_trait;
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{CheckRecord, CheckStats, Monitor, SystemStats};
use crate::monitoring::types::{CheckResult, CheckStatus};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Read access to monitor definitions, as the scheduler consumes them
#[async_trait]
pub trait MonitorRegistry: Send + Sync {
    /// Get all enabled monitors
    async fn find_all_active(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by UUID, enabled or not
    async fn find_by_id(&self, uuid: Uuid) -> Result<Option<Monitor>>;
}

/// Destination for completed check results
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist one check result, returning its row id
    async fn record(&self, result: &CheckResult) -> Result<i64>;

    /// Delete results older than the given number of days, returning how
    /// many rows were removed
    async fn purge_older_than(&self, days: i64) -> Result<u64>;
}

/// LibSQL-backed store for monitors and their check history
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// Get all monitors, newest first
    pub async fn find_all(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT id, uuid, name, target, check_type, interval_seconds, timeout_seconds, enabled, created_at, updated_at FROM monitors ORDER BY created_at DESC")
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    /// Insert a new monitor, returning its row id
    pub async fn create_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let conn = self.get_conn().await?;
        let created_at = Monitor::timestamp_to_i64(monitor.created_at);
        let updated_at = Monitor::timestamp_to_i64(monitor.updated_at);

        conn.execute(
            "INSERT INTO monitors (uuid, name, target, check_type, interval_seconds, timeout_seconds, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                monitor.uuid.to_string(),
                monitor.name.clone(),
                monitor.target.clone(),
                monitor.check_type.to_string(),
                monitor.interval_seconds as i64,
                monitor.timeout_seconds as i64,
                if monitor.enabled { 1 } else { 0 },
                created_at,
                updated_at
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    /// Update a monitor by UUID, returning whether a row changed
    pub async fn update_monitor(&self, monitor: &Monitor) -> Result<bool> {
        let conn = self.get_conn().await?;
        let updated_at = Monitor::timestamp_to_i64(monitor.updated_at);

        let affected = conn
            .execute(
                "UPDATE monitors SET name = ?, target = ?, check_type = ?, interval_seconds = ?, timeout_seconds = ?, enabled = ?, updated_at = ? WHERE uuid = ?",
                params![
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.check_type.to_string(),
                    monitor.interval_seconds as i64,
                    monitor.timeout_seconds as i64,
                    if monitor.enabled { 1 } else { 0 },
                    updated_at,
                    monitor.uuid.to_string()
                ],
            )
            .await?;

        Ok(affected > 0)
    }

    /// Delete a monitor by UUID, returning whether it existed
    pub async fn delete_monitor(&self, uuid: Uuid) -> Result<bool> {
        let conn = self.get_conn().await?;

        // Check history goes with it via ON DELETE CASCADE
        let affected = conn
            .execute("DELETE FROM monitors WHERE uuid = ?", params![uuid.to_string()])
            .await?;

        Ok(affected > 0)
    }

    /// Get recent check results for a monitor, newest first
    pub async fn recent_checks(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<CheckRecord>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT id, monitor_uuid, timestamp, status, response_time_ms, status_code, error_message FROM checks WHERE monitor_uuid = ? ORDER BY timestamp DESC LIMIT ?")
            .await?;

        let mut rows = stmt.query(params![monitor_uuid.to_string(), limit as i64]).await?;
        let mut records = Vec::new();

        while let Some(row) = rows.next().await? {
            let monitor_uuid_str: String = row.get(1)?;
            let timestamp: i64 = row.get(2)?;
            let status_str: String = row.get(3)?;

            records.push(CheckRecord {
                id: Some(row.get(0)?),
                monitor_uuid: Uuid::parse_str(&monitor_uuid_str)?,
                timestamp: Monitor::i64_to_timestamp(timestamp),
                status: match status_str.as_str() {
                    "up" => CheckStatus::Up,
                    "down" => CheckStatus::Down,
                    _ => CheckStatus::Error,
                },
                response_time_ms: row.get::<Option<i64>>(4)?.map(|v| v as u64),
                status_code: row.get::<Option<i64>>(5)?.map(|v| v as u16),
                error_message: row.get(6)?,
            });
        }

        Ok(records)
    }

    /// Aggregate check outcomes for one monitor over the last `hours`
    pub async fn monitor_stats(&self, monitor_uuid: Uuid, hours: i64) -> Result<CheckStats> {
        let conn = self.get_conn().await?;
        let cutoff = chrono::Utc::now().timestamp() - hours.max(0) * 3600;

        let mut rows = conn
            .query(
                "SELECT COUNT(*),
                        SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END),
                        AVG(response_time_ms), MIN(response_time_ms), MAX(response_time_ms)
                 FROM checks WHERE monitor_uuid = ? AND timestamp >= ?",
                params![monitor_uuid.to_string(), cutoff],
            )
            .await?;

        match rows.next().await? {
            Some(row) => stats_from_row(&row),
            None => Ok(CheckStats::default()),
        }
    }

    /// Monitor counts plus check aggregates across the whole deployment
    pub async fn system_stats(&self, hours: i64) -> Result<SystemStats> {
        let conn = self.get_conn().await?;

        let mut rows = conn
            .query("SELECT COUNT(*), SUM(CASE WHEN enabled = 1 THEN 1 ELSE 0 END) FROM monitors", ())
            .await?;
        let (total_monitors, enabled_monitors) = match rows.next().await? {
            Some(row) => {
                let total: i64 = row.get(0)?;
                let enabled: Option<i64> = row.get(1)?;
                (total.max(0) as u64, enabled.unwrap_or(0).max(0) as u64)
            }
            None => (0, 0),
        };

        let cutoff = chrono::Utc::now().timestamp() - hours.max(0) * 3600;
        let mut rows = conn
            .query(
                "SELECT COUNT(*),
                        SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END),
                        AVG(response_time_ms), MIN(response_time_ms), MAX(response_time_ms)
                 FROM checks WHERE timestamp >= ?",
                params![cutoff],
            )
            .await?;
        let checks = match rows.next().await? {
            Some(row) => stats_from_row(&row)?,
            None => CheckStats::default(),
        };

        Ok(SystemStats { total_monitors, enabled_monitors, checks })
    }
}

fn monitor_from_row(row: &Row) -> Result<Monitor> {
    let uuid_str: String = row.get(1)?;
    let check_type_str: String = row.get(4)?;
    let created_at: i64 = row.get(8)?;
    let updated_at: i64 = row.get(9)?;

    Ok(Monitor {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        name: row.get(2)?,
        target: row.get(3)?,
        check_type: check_type_str.parse()?,
        interval_seconds: row.get::<i64>(5)? as u64,
        timeout_seconds: row.get::<i64>(6)? as u64,
        enabled: row.get::<i64>(7)? != 0,
        created_at: Monitor::i64_to_timestamp(created_at),
        updated_at: Monitor::i64_to_timestamp(updated_at),
    })
}

fn stats_from_row(row: &Row) -> Result<CheckStats> {
    let total: i64 = row.get(0)?;
    // SUM and the response-time aggregates are NULL when no rows matched
    let up: Option<i64> = row.get(1)?;
    let down: Option<i64> = row.get(2)?;
    let error: Option<i64> = row.get(3)?;
    let avg: Option<f64> = row.get(4)?;
    let min: Option<i64> = row.get(5)?;
    let max: Option<i64> = row.get(6)?;

    let total_checks = total.max(0) as u64;
    let up_checks = up.unwrap_or(0).max(0) as u64;

    Ok(CheckStats {
        total_checks,
        up_checks,
        down_checks: down.unwrap_or(0).max(0) as u64,
        error_checks: error.unwrap_or(0).max(0) as u64,
        avg_response_time_ms: avg,
        min_response_time_ms: min.map(|v| v.max(0) as u64),
        max_response_time_ms: max.map(|v| v.max(0) as u64),
        uptime_percentage: (total_checks > 0)
            .then(|| up_checks as f64 / total_checks as f64 * 100.0),
    })
}

#[async_trait]
impl MonitorRegistry for DatabaseImpl {
    async fn find_all_active(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT id, uuid, name, target, check_type, interval_seconds, timeout_seconds, enabled, created_at, updated_at FROM monitors WHERE enabled = 1")
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn find_by_id(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT id, uuid, name, target, check_type, interval_seconds, timeout_seconds, enabled, created_at, updated_at FROM monitors WHERE uuid = ?")
            .await?;

        let mut rows = stmt.query(params![uuid.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResultSink for DatabaseImpl {
    async fn record(&self, result: &CheckResult) -> Result<i64> {
        if matches!(result.status_code, Some(0)) {
            bail!("status_code 0 is not a valid HTTP status");
        }

        let conn = self.get_conn().await?;
        let timestamp = Monitor::timestamp_to_i64(result.timestamp);

        conn.execute(
            "INSERT INTO checks (monitor_uuid, timestamp, status, response_time_ms, status_code, error_message) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.monitor_id.to_string(),
                timestamp,
                result.status.to_string(),
                result.response_time_ms.map(|v| v as i64),
                result.status_code.map(|v| v as i64),
                result.error_message.clone()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn purge_older_than(&self, days: i64) -> Result<u64> {
        let conn = self.get_conn().await?;
        let cutoff = chrono::Utc::now().timestamp() - days.max(0) * 24 * 3600;

        let affected = conn
            .execute("DELETE FROM checks WHERE timestamp < ?", params![cutoff])
            .await?;

        Ok(affected)
    }
}
