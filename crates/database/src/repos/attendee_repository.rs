//! Attendee repository for database operations.

use crate::entities::{Attendee, AttendeePatch, NewAttendee};
use crate::types::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;
use tracing::{debug, info};

const ATTENDEE_COLUMNS: &str = "id, first_name, last_name, nickname";

/// Repository for attendee database operations
#[derive(Clone)]
pub struct AttendeeRepository {
    pool: SqlitePool,
}

impl AttendeeRepository {
    /// Create a new attendee repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All attendees ordered by id ascending
    pub async fn list(&self) -> DatabaseResult<Vec<Attendee>> {
        let attendees = sqlx::query_as::<_, Attendee>(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM attendees ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        debug!(count = attendees.len(), "listed attendees");
        Ok(attendees)
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Attendee>> {
        sqlx::query_as::<_, Attendee>(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }

    /// Insert one row and return it with its assigned id
    pub async fn insert(&self, request: &NewAttendee) -> DatabaseResult<Attendee> {
        let attendee = sqlx::query_as::<_, Attendee>(&format!(
            "INSERT INTO attendees (first_name, last_name, nickname) VALUES (?, ?, ?) RETURNING {ATTENDEE_COLUMNS}"
        ))
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.nickname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        info!(attendee_id = attendee.id, "attendee inserted");
        Ok(attendee)
    }

    /// Apply the supplied fields only; `Ok(None)` when no row has this id
    pub async fn update_by_id(
        &self,
        id: i64,
        patch: &AttendeePatch,
    ) -> DatabaseResult<Option<Attendee>> {
        let updated = sqlx::query_as::<_, Attendee>(&format!(
            "UPDATE attendees SET \
                first_name = COALESCE(?, first_name), \
                last_name = COALESCE(?, last_name), \
                nickname = COALESCE(?, nickname) \
             WHERE id = ? RETURNING {ATTENDEE_COLUMNS}"
        ))
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.nickname)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        match &updated {
            Some(_) => info!(attendee_id = id, "attendee updated"),
            None => debug!(attendee_id = id, "no attendee matched update"),
        }
        Ok(updated)
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(count)
    }
}
