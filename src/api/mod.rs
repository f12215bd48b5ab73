//! HTTP Surface
//!
//! Thin axum layer over `Edfs`: query parameters in, `{response, status}`
//! envelopes out.

pub mod handlers;
pub mod protocol;

use axum::{Router, extract::Extension, routing::get};
use handlers::*;
use protocol::*;
use std::sync::Arc;

use crate::service::Edfs;

pub fn router(edfs: Arc<Edfs>) -> Router {
    Router::new()
        .route(ENDPOINT_MKDIR, get(handle_mkdir))
        .route(ENDPOINT_LS, get(handle_ls))
        .route(ENDPOINT_RM, get(handle_rm))
        .route(ENDPOINT_CAT, get(handle_cat))
        .route(ENDPOINT_PUT, get(handle_put))
        .route(ENDPOINT_PARTITION_LOCATIONS, get(handle_partition_locations))
        .route(ENDPOINT_READ_PARTITION, get(handle_read_partition))
        .route(ENDPOINT_AVG, get(handle_avg))
        .route(ENDPOINT_MAX, get(handle_max))
        .route(ENDPOINT_MIN, get(handle_min))
        .route(ENDPOINT_DATANODES, get(handle_datanodes))
        .layer(Extension(edfs))
}

#[cfg(test)]
mod tests;
