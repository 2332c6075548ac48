//! Incident history.
//!
//! Postgres when a `DATABASE_URL` is configured, a bounded in-memory log
//! otherwise.

use crate::error::{Result, SentinelError};
use crate::model::{Incident, Location};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn record(&self, incident: &Incident) -> Result<()>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Incident>>;
}

pub struct MemoryIncidentStore {
    capacity: usize,
    incidents: Mutex<VecDeque<Incident>>,
}

impl MemoryIncidentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            incidents: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.lock().is_empty()
    }
}

impl Default for MemoryIncidentStore {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn record(&self, incident: &Incident) -> Result<()> {
        let mut incidents = self.incidents.lock();
        if incidents.len() == self.capacity {
            incidents.pop_front();
        }
        incidents.push_back(incident.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Incident>> {
        Ok(self.incidents.lock().iter().rev().take(limit).cloned().collect())
    }
}

pub struct PgIncidentStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct IncidentRow {
    id: Uuid,
    kind: String,
    status: String,
    severity: String,
    detected_at: DateTime<Utc>,
    peak_magnitude: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    contacts_attempted: i32,
    contacts_notified: i32,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = SentinelError;

    fn try_from(row: IncidentRow) -> Result<Self> {
        let decode = |e: String| SentinelError::Storage(sqlx::Error::Decode(e.into()));
        Ok(Incident {
            id: row.id,
            kind: row.kind.parse().map_err(decode)?,
            status: row.status.parse().map_err(decode)?,
            severity: row.severity.parse().map_err(decode)?,
            detected_at: row.detected_at,
            peak_magnitude: row.peak_magnitude,
            location: match (row.latitude, row.longitude) {
                (Some(lat), Some(lon)) => Some(Location::new(lat, lon)),
                _ => None,
            },
            contacts_attempted: row.contacts_attempted.max(0) as u32,
            contacts_notified: row.contacts_notified.max(0) as u32,
        })
    }
}

impl PgIncidentStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                severity TEXT NOT NULL,
                detected_at TIMESTAMPTZ NOT NULL,
                peak_magnitude DOUBLE PRECISION,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
                contacts_attempted INTEGER NOT NULL,
                contacts_notified INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn record(&self, incident: &Incident) -> Result<()> {
        sqlx::query(
            "INSERT INTO incidents (id, kind, status, severity, detected_at, peak_magnitude, \
             latitude, longitude, contacts_attempted, contacts_notified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(incident.id)
        .bind(incident.kind.as_str())
        .bind(incident.status.as_str())
        .bind(incident.severity.as_str())
        .bind(incident.detected_at)
        .bind(incident.peak_magnitude)
        .bind(incident.location.map(|l| l.latitude))
        .bind(incident.location.map(|l| l.longitude))
        .bind(incident.contacts_attempted as i32)
        .bind(incident.contacts_notified as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Incident>> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT id, kind, status, severity, detected_at, peak_magnitude,
                   latitude, longitude, contacts_attempted, contacts_notified
            FROM incidents
            ORDER BY detected_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Incident::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertKind, IncidentStatus, Severity};

    fn incident(notified: u32) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            kind: AlertKind::Fall,
            status: IncidentStatus::Dispatched,
            severity: Severity::Fall,
            detected_at: Utc::now(),
            peak_magnitude: Some(16.2),
            location: None,
            contacts_attempted: 3,
            contacts_notified: notified,
        }
    }

    #[tokio::test]
    async fn memory_store_returns_newest_first_and_evicts_oldest() {
        let store = MemoryIncidentStore::new(2);
        for notified in 1..=3 {
            store.record(&incident(notified)).await.unwrap();
        }

        let recent = store.recent(10).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(recent[0].contacts_notified, 3);
        assert_eq!(recent[1].contacts_notified, 2);

        assert_eq!(store.recent(1).await.unwrap().len(), 1);
    }

    #[test]
    fn row_with_unknown_kind_is_rejected() {
        let row = IncidentRow {
            id: Uuid::new_v4(),
            kind: "earthquake".to_string(),
            status: "dispatched".to_string(),
            severity: "fall".to_string(),
            detected_at: Utc::now(),
            peak_magnitude: None,
            latitude: Some(1.0),
            longitude: None,
            contacts_attempted: 0,
            contacts_notified: 0,
        };
        assert!(Incident::try_from(row).is_err());
    }
}
