//! HTTP API handlers for glucolog-api

pub mod error;
pub mod export;
pub mod health;
pub mod readings;
pub mod sse;

pub use error::ApiError;
pub use export::export_readings;
pub use health::health;
pub use readings::{
    bulk_import, create_reading, delete_collection, delete_reading, fetch_remote, get_reading,
    latest_reading, list_readings,
};
pub use sse::event_stream;
