//! Liveness and schema endpoints

use axum::Json;
use utoipa::OpenApi;

use hostvars_api::requests::{CreateHostRequest, CreateHostgroupRequest, SetFactsRequest};
use hostvars_api::responses::{GroupListing, InventoryMeta};

use crate::api::error::ApiError;

#[derive(OpenApi)]
#[openapi(components(schemas(
    CreateHostgroupRequest,
    CreateHostRequest,
    SetFactsRequest,
    GroupListing,
    InventoryMeta,
    ApiError
)))]
pub struct ApiDoc;

/// Liveness probe
pub async fn ping() -> &'static str {
    "Pong"
}

/// Schema of the request and response types
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
