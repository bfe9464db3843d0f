use crate::domain::{models::schedule::AvailabilitySchedule, ports::ScheduleRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{Row, PgPool};
use chrono::Utc;

pub struct PostgresScheduleRepo {
    pool: PgPool,
}

impl PostgresScheduleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode(version: i64, raw: &str) -> Result<AvailabilitySchedule, AppError> {
    let mut schedule: AvailabilitySchedule = serde_json::from_str(raw)
        .map_err(|e| AppError::InternalWithMsg(format!("Stored schedule is invalid: {}", e)))?;
    schedule.version = version;
    Ok(schedule)
}

fn encode(schedule: &AvailabilitySchedule) -> Result<String, AppError> {
    serde_json::to_string(schedule).map_err(|e| AppError::InternalWithMsg(format!("Cannot encode schedule: {}", e)))
}

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepo {
    async fn get(&self) -> Result<AvailabilitySchedule, AppError> {
        let row = sqlx::query("SELECT version, config_json FROM schedule_config WHERE id = 1").fetch_optional(&self.pool).await.map_err(AppError::Database)?;
        match row {
            Some(row) => decode(row.try_get("version")?, &row.try_get::<String, _>("config_json")?),
            None => Ok(AvailabilitySchedule::default()),
        }
    }
    async fn save(&self, schedule: &AvailabilitySchedule, expected_version: i64) -> Result<Option<AvailabilitySchedule>, AppError> {
        let next = expected_version + 1;
        let stored = AvailabilitySchedule { version: next, ..schedule.clone() };
        let json = encode(&stored)?;

        // Version 0 is the implicit default: the first save inserts the row.
        let result = if expected_version == 0 {
            sqlx::query("INSERT INTO schedule_config (id, version, config_json, updated_at) VALUES (1, $1, $2, $3) ON CONFLICT(id) DO NOTHING").bind(next).bind(&json).bind(Utc::now()).execute(&self.pool).await.map_err(AppError::Database)?
        } else {
            sqlx::query("UPDATE schedule_config SET version = $1, config_json = $2, updated_at = $3 WHERE id = 1 AND version = $4").bind(next).bind(&json).bind(Utc::now()).bind(expected_version).execute(&self.pool).await.map_err(AppError::Database)?
        };

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(stored))
    }
}
