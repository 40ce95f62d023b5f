//! Bulk export rendering (json, csv, html)
//!
//! Presentation only: the same windowed query as the list endpoint,
//! rendered into a downloadable format.

use crate::api::error::ApiError;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use glucolog_common::db::models::{GlucoseReading, SortOrder};
use glucolog_common::db::readings as repo;
use glucolog_common::db::readings::ReadingQuery;
use glucolog_common::Error;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Html,
}

/// Export parameters: the list filter plus a format selector.
/// Fields are spelled out because `Query` cannot deserialize numbers
/// through `#[serde(flatten)]`.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    pub from: Option<i64>,
    pub to: Option<i64>,
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: SortOrder,
}

impl ExportQuery {
    fn filter(&self) -> ReadingQuery {
        ReadingQuery {
            from_ts: self.from,
            to_ts: self.to,
            skip: self.skip,
            limit: self.limit,
            order: self.order,
        }
    }
}

/// GET /api/glucose-readings/export - export readings in json/csv/html
pub async fn export_readings(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let readings = repo::fetch_readings(&state.db, &query.filter()).await?;

    let response = match query.format {
        ExportFormat::Json => Json(readings).into_response(),
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"glucose_readings.csv\"",
                ),
            ],
            render_csv(&readings)?,
        )
            .into_response(),
        ExportFormat::Html => Html(render_html(&readings)).into_response(),
    };

    Ok(response)
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "invalid".to_string())
}

fn render_csv(readings: &[GlucoseReading]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", "value_mmol_l", "timestamp", "time_utc"])
        .map_err(|e| Error::Internal(format!("csv write failed: {e}")))?;

    for reading in readings {
        writer
            .write_record([
                reading.id.to_string(),
                reading.value.to_string(),
                reading.timestamp.to_string(),
                format_time(reading.timestamp),
            ])
            .map_err(|e| Error::Internal(format!("csv write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("csv write failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("csv encoding failed: {e}")))
}

/// Classification thresholds in mmol/L
fn value_class(value: f64) -> &'static str {
    if value < 3.9 {
        "low"
    } else if value > 10.0 {
        "high"
    } else {
        "normal"
    }
}

fn render_html(readings: &[GlucoseReading]) -> String {
    let mut rows = String::new();
    for reading in readings {
        rows.push_str(&format!(
            "      <tr><td>{}</td><td class=\"{}\">{} mmol/L</td><td>{}</td></tr>\n",
            reading.id,
            value_class(reading.value),
            reading.value,
            format_time(reading.timestamp),
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
           <meta charset=\"utf-8\">\n\
           <title>Glucose Readings Export</title>\n\
           <style>\n\
             body {{ font-family: sans-serif; margin: 2em; }}\n\
             table {{ border-collapse: collapse; }}\n\
             th, td {{ padding: 0.4em 1em; border-bottom: 1px solid #ddd; text-align: left; }}\n\
             .low {{ color: #c0392b; font-weight: bold; }}\n\
             .high {{ color: #e67e22; font-weight: bold; }}\n\
             .normal {{ color: #27ae60; }}\n\
           </style>\n\
         </head>\n\
         <body>\n\
           <h1>Glucose Readings</h1>\n\
           <p>{} readings exported</p>\n\
           <table>\n\
             <thead><tr><th>ID</th><th>Value</th><th>Time (UTC)</th></tr></thead>\n\
             <tbody>\n{}    </tbody>\n\
           </table>\n\
         </body>\n\
         </html>\n",
        readings.len(),
        rows
    )
}
