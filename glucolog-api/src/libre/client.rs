//! LibreLinkUp graph endpoint client
//!
//! Normalizes the remote payload into a flat sequence of observations:
//! every `data.graphData[]` point, plus the live snapshot from
//! `data.connection.glucoseMeasurement` when present (appended to the
//! sequence and also returned separately). No deduplication or sorting
//! happens here; reconciliation owns that.

use super::{LLU_PRODUCT, LLU_VERSION};
use chrono::NaiveDateTime;
use glucolog_common::config::LibreConfig;
use glucolog_common::db::models::Observation;
use glucolog_common::{Error, Result};
use serde::Deserialize;
use tracing::debug;

/// Remote timestamps arrive as local-format strings, interpreted as UTC
const REMOTE_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Result of one graph fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// All observations, in payload order; includes the live snapshot last
    /// when the remote supplied one
    pub observations: Vec<Observation>,
    /// The live snapshot, when the remote supplied one
    pub current: Option<Observation>,
}

/// LibreLinkUp graph API client
pub struct LibreClient {
    http: reqwest::Client,
    host: String,
    patient_id: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphData {
    #[serde(rename = "graphData", default)]
    graph_data: Vec<GraphPoint>,
    connection: Option<GraphConnection>,
}

#[derive(Debug, Deserialize)]
struct GraphConnection {
    #[serde(rename = "glucoseMeasurement")]
    glucose_measurement: Option<GraphPoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphPoint {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Value")]
    value: f64,
}

impl LibreClient {
    pub fn new(config: &LibreConfig) -> Result<Self> {
        Ok(Self {
            http: super::http_client()?,
            host: config.host.trim_end_matches('/').to_string(),
            patient_id: config.patient_id.clone(),
        })
    }

    /// Fetch and normalize the graph endpoint
    pub async fn fetch(&self, token: &str) -> Result<FetchResult> {
        let url = format!("{}/connections/{}/graph", self.host, self.patient_id);
        debug!("Fetching LibreLinkUp graph data");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("version", LLU_VERSION)
            .header("product", LLU_PRODUCT)
            .send()
            .await
            .map_err(|e| Error::Network(format!("graph request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read graph response: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(Error::Upstream {
                status,
                message: body,
            });
        }

        let payload: GraphResponse = serde_json::from_str(&body).map_err(|e| Error::Upstream {
            status,
            message: format!("malformed graph payload: {e}"),
        })?;

        normalize(payload, status)
    }
}

/// Flatten the graph payload into observations
fn normalize(payload: GraphResponse, status: u16) -> Result<FetchResult> {
    let data = payload.data.unwrap_or_default();

    let mut observations = Vec::with_capacity(data.graph_data.len() + 1);
    for point in &data.graph_data {
        observations.push(to_observation(point, status)?);
    }

    let current = data
        .connection
        .and_then(|c| c.glucose_measurement)
        .map(|point| to_observation(&point, status))
        .transpose()?;
    if let Some(current) = current {
        observations.push(current);
    }

    Ok(FetchResult {
        observations,
        current,
    })
}

fn to_observation(point: &GraphPoint, status: u16) -> Result<Observation> {
    Ok(Observation {
        value: point.value,
        timestamp: parse_remote_timestamp(&point.timestamp, status)?,
    })
}

/// Parse a remote graph timestamp, tagging it UTC (no timezone conversion)
fn parse_remote_timestamp(raw: &str, status: u16) -> Result<i64> {
    let parsed = NaiveDateTime::parse_from_str(raw, REMOTE_TIMESTAMP_FORMAT).map_err(|e| {
        Error::Upstream {
            status,
            message: format!("unparseable timestamp {raw:?}: {e}"),
        }
    })?;
    Ok(parsed.and_utc().timestamp())
}
