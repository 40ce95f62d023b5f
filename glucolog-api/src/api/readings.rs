//! Glucose reading CRUD handlers

use crate::api::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use glucolog_common::db::models::{GlucoseReading, Observation, SortOrder};
use glucolog_common::db::readings as repo;
use glucolog_common::db::readings::ReadingQuery;
use glucolog_common::Error;
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing and exporting readings
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Inclusive lower timestamp bound
    pub from: Option<i64>,
    /// Inclusive upper timestamp bound
    pub to: Option<i64>,
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: SortOrder,
}

impl ListQuery {
    pub(crate) fn to_reading_query(&self) -> ReadingQuery {
        ReadingQuery {
            from_ts: self.from,
            to_ts: self.to,
            skip: self.skip,
            limit: self.limit,
            order: self.order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReading {
    pub value: f64,
    pub timestamp: i64,
}

impl CreateReading {
    fn validate(&self) -> Result<Observation, Error> {
        if self.value <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "glucose value must be positive, got {}",
                self.value
            )));
        }
        Ok(Observation {
            value: self.value,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Comma-separated list of reading ids
    pub ids: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkImportResponse {
    pub imported: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/glucose-readings - list readings with optional window/paging
pub async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GlucoseReading>>, ApiError> {
    let readings = repo::fetch_readings(&state.db, &query.to_reading_query()).await?;
    Ok(Json(readings))
}

/// POST /api/glucose-readings - create a single reading
pub async fn create_reading(
    State(state): State<AppState>,
    Json(request): Json<CreateReading>,
) -> Result<(StatusCode, Json<GlucoseReading>), ApiError> {
    let observation = request.validate()?;
    let reading = repo::insert_reading(&state.db, observation).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// POST /api/glucose-readings/bulk - bulk import with upsert semantics
pub async fn bulk_import(
    State(state): State<AppState>,
    Json(request): Json<Vec<CreateReading>>,
) -> Result<Json<BulkImportResponse>, ApiError> {
    let observations = request
        .iter()
        .map(CreateReading::validate)
        .collect::<Result<Vec<_>, _>>()?;

    repo::upsert_readings(&state.db, &observations).await?;
    info!("Bulk imported {} readings", observations.len());

    Ok(Json(BulkImportResponse {
        imported: observations.len(),
    }))
}

/// DELETE /api/glucose-readings - delete by ids and/or time window,
/// responding with the removed rows
pub async fn delete_collection(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Vec<GlucoseReading>>, ApiError> {
    let ids = query.ids.as_deref().map(parse_id_list).transpose()?;
    let removed =
        repo::delete_readings(&state.db, ids.as_deref(), query.from, query.to).await?;
    if !removed.is_empty() {
        info!("Deleted {} readings", removed.len());
    }
    Ok(Json(removed))
}

/// GET /api/glucose-readings/latest - the reading with maximum timestamp
pub async fn latest_reading(
    State(state): State<AppState>,
) -> Result<Json<GlucoseReading>, ApiError> {
    let reading = repo::fetch_latest(&state.db)
        .await?
        .ok_or_else(|| Error::NotFound("no readings stored".to_string()))?;
    Ok(Json(reading))
}

/// GET /api/glucose-readings/remote - trigger one fetch+save cycle on demand
pub async fn fetch_remote(
    State(state): State<AppState>,
) -> Result<Json<Vec<Observation>>, ApiError> {
    let observations = state.ingestor.fetch_and_store().await?;
    Ok(Json(observations))
}

/// GET /api/glucose-readings/:id - fetch a single reading
pub async fn get_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GlucoseReading>, ApiError> {
    let reading = repo::fetch_reading(&state.db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("reading {id} not found")))?;
    Ok(Json(reading))
}

/// DELETE /api/glucose-readings/:id - delete a single reading,
/// responding with the removed row
pub async fn delete_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GlucoseReading>, ApiError> {
    let mut removed = repo::delete_readings(&state.db, Some(&[id]), None, None).await?;
    let reading = removed
        .pop()
        .ok_or_else(|| Error::NotFound(format!("reading {id} not found")))?;
    Ok(Json(reading))
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>, Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| Error::InvalidInput(format!("invalid reading id: {part:?}")))
        })
        .collect()
}
