//! Readings repository
//!
//! The durable record of observations, keyed uniquely by timestamp.
//! Supports windowed/ordered/paged range query, latest-record query,
//! idempotent transactional batch upsert, and windowed deletion that
//! returns the removed rows.

use crate::db::models::{GlucoseReading, Observation, SortOrder};
use crate::{Error, Result};
use sqlx::SqlitePool;

/// Parameters for a range query over stored readings
///
/// Timestamp bounds are inclusive when present. `skip` offsets the ordered
/// result; absent `limit` returns all matching rows from the offset onward.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub from_ts: Option<i64>,
    pub to_ts: Option<i64>,
    pub skip: i64,
    pub limit: Option<i64>,
    pub order: SortOrder,
}

/// Fetch readings matching the query, ordered by timestamp
pub async fn fetch_readings(pool: &SqlitePool, query: &ReadingQuery) -> Result<Vec<GlucoseReading>> {
    let mut sql = String::from("SELECT id, value, timestamp FROM glucose_readings");
    let mut clauses = Vec::new();
    if query.from_ts.is_some() {
        clauses.push("timestamp >= ?");
    }
    if query.to_ts.is_some() {
        clauses.push("timestamp <= ?");
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY timestamp {} LIMIT ? OFFSET ?",
        query.order.as_sql()
    ));

    let mut stmt = sqlx::query_as::<_, GlucoseReading>(&sql);
    if let Some(from_ts) = query.from_ts {
        stmt = stmt.bind(from_ts);
    }
    if let Some(to_ts) = query.to_ts {
        stmt = stmt.bind(to_ts);
    }
    // SQLite: LIMIT -1 means no limit
    stmt = stmt.bind(query.limit.unwrap_or(-1)).bind(query.skip);

    Ok(stmt.fetch_all(pool).await?)
}

/// Fetch the single reading with the maximum timestamp
pub async fn fetch_latest(pool: &SqlitePool) -> Result<Option<GlucoseReading>> {
    let reading = sqlx::query_as::<_, GlucoseReading>(
        "SELECT id, value, timestamp FROM glucose_readings ORDER BY timestamp DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(reading)
}

/// Fetch a single reading by surrogate id
pub async fn fetch_reading(pool: &SqlitePool, id: i64) -> Result<Option<GlucoseReading>> {
    let reading = sqlx::query_as::<_, GlucoseReading>(
        "SELECT id, value, timestamp FROM glucose_readings WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(reading)
}

/// Insert a single reading (direct client creation), returning the stored row
///
/// Unlike the batch upsert, a timestamp collision here is the caller's
/// mistake and is surfaced as invalid input.
pub async fn insert_reading(pool: &SqlitePool, observation: Observation) -> Result<GlucoseReading> {
    let reading = sqlx::query_as::<_, GlucoseReading>(
        "INSERT INTO glucose_readings (value, timestamp) VALUES (?, ?)
         RETURNING id, value, timestamp",
    )
    .bind(observation.value)
    .bind(observation.timestamp)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::InvalidInput(format!(
            "a reading with timestamp {} already exists",
            observation.timestamp
        )),
        _ => Error::from(e),
    })?;

    Ok(reading)
}

/// Idempotent batch upsert, atomic per batch
///
/// Inserts a new row for each absent timestamp; an already-stored timestamp
/// has only its value updated in place (id and timestamp never change).
/// The whole batch commits or the store is left untouched.
pub async fn upsert_readings(pool: &SqlitePool, observations: &[Observation]) -> Result<()> {
    if observations.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for observation in observations {
        sqlx::query(
            "INSERT INTO glucose_readings (value, timestamp) VALUES (?, ?)
             ON CONFLICT(timestamp) DO UPDATE SET value = excluded.value",
        )
        .bind(observation.value)
        .bind(observation.timestamp)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Delete readings by ids and/or time window, returning the removed rows
///
/// When `ids` is given, deletion is restricted to matching identifiers
/// within the optional window; otherwise the full windowed range is
/// deleted. An empty result is not an error. Select and delete run in one
/// transaction so the returned rows are exactly the rows removed.
pub async fn delete_readings(
    pool: &SqlitePool,
    ids: Option<&[i64]>,
    from_ts: Option<i64>,
    to_ts: Option<i64>,
) -> Result<Vec<GlucoseReading>> {
    let mut clauses = Vec::new();
    if from_ts.is_some() {
        clauses.push("timestamp >= ?".to_string());
    }
    if to_ts.is_some() {
        clauses.push("timestamp <= ?".to_string());
    }
    if let Some(ids) = ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        clauses.push(format!("id IN ({})", placeholders));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let mut tx = pool.begin().await?;

    let select_sql = format!(
        "SELECT id, value, timestamp FROM glucose_readings{} ORDER BY timestamp ASC",
        where_clause
    );
    let mut select = sqlx::query_as::<_, GlucoseReading>(&select_sql);
    if let Some(from_ts) = from_ts {
        select = select.bind(from_ts);
    }
    if let Some(to_ts) = to_ts {
        select = select.bind(to_ts);
    }
    if let Some(ids) = ids {
        for id in ids {
            select = select.bind(id);
        }
    }
    let removed = select.fetch_all(&mut *tx).await?;

    if !removed.is_empty() {
        // Same predicate and transaction as the select, so the deleted rows
        // are exactly the rows returned, without binding one id per row
        let delete_sql = format!("DELETE FROM glucose_readings{}", where_clause);
        let mut delete = sqlx::query(&delete_sql);
        if let Some(from_ts) = from_ts {
            delete = delete.bind(from_ts);
        }
        if let Some(to_ts) = to_ts {
            delete = delete.bind(to_ts);
        }
        if let Some(ids) = ids {
            for id in ids {
                delete = delete.bind(id);
            }
        }
        delete.execute(&mut *tx).await?;
    }

    tx.commit().await?;

    Ok(removed)
}
