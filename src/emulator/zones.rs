use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::identity::Authenticated;
use super::{
    ApiVersionQuery, MAX_RECORD_SETS_PER_ZONE, SharedState, base_url, operation_url, precondition,
    require_api_version,
};
use crate::config::zone_resource_id;
use crate::error::DnsError;
use crate::management::types::{OperationStatus, ZoneResource};
use crate::model::{GLOBAL_LOCATION, Zone};

#[derive(Debug, Deserialize)]
pub struct ZonePath {
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
}

impl ZonePath {
    pub fn resource_id(&self) -> String {
        zone_resource_id(&self.subscription_id, &self.resource_group, &self.zone_name)
    }
}

fn zone_response(status: StatusCode, path: &ZonePath, zone: &Zone) -> Response {
    let body = ZoneResource::from_zone(zone, path.resource_id(), MAX_RECORD_SETS_PER_ZONE);
    match &zone.etag {
        Some(etag) => (status, [(header::ETAG, etag.to_string())], Json(body)).into_response(),
        None => (status, Json(body)).into_response(),
    }
}

// GET {zone}
pub async fn get_zone(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<ZonePath>,
    Query(query): Query<ApiVersionQuery>,
) -> Result<Response, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let zone = state.store.zone(&path.resource_group, &path.zone_name)?;
    Ok(zone_response(StatusCode::OK, &path, &zone))
}

// PUT {zone}
pub async fn put_zone(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<ZonePath>,
    Query(query): Query<ApiVersionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let resource: ZoneResource = serde_json::from_slice(&body)
        .map_err(|e| DnsError::Invalid(format!("The request body is malformed: {e}")))?;
    if !resource.location.eq_ignore_ascii_case(GLOBAL_LOCATION) {
        return Err(DnsError::Invalid(format!(
            "The location '{}' is not supported; DNS zones are global.",
            resource.location
        )));
    }

    let (zone, created) = state.store.put_zone(
        &path.resource_group,
        &path.zone_name,
        &resource.tags,
        &precondition(&headers)?,
    )?;
    info!(zone = %zone.name, created, "zone written");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(zone_response(status, &path, &zone))
}

// DELETE {zone}
//
// Deletion completes immediately; existing zones still answer 202 with a
// status link, the way the service reports long-running deletes.
pub async fn delete_zone(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<ZonePath>,
    Query(query): Query<ApiVersionQuery>,
    headers: HeaderMap,
) -> Result<Response, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let base = base_url(&headers)?;

    if !state.store.remove_zone(&path.resource_group, &path.zone_name) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    info!(zone = %path.zone_name, "zone deleted");

    let operation_id = state.start_operation();
    let link = operation_url(&base, &path.subscription_id, &operation_id);
    Ok((
        StatusCode::ACCEPTED,
        [
            ("azure-asyncoperation", link.clone()),
            ("location", link),
            ("retry-after", "0".to_string()),
        ],
    )
        .into_response())
}

// GET /subscriptions/{sub}/providers/Microsoft.Network/locations/global/operationResults/{id}
pub async fn operation_result(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path((_subscription_id, operation_id)): Path<(String, String)>,
) -> Result<Json<OperationStatus>, DnsError> {
    if !state.has_operation(&operation_id) {
        return Err(DnsError::not_found(format!(
            "The operation '{operation_id}' was not found."
        )));
    }
    Ok(Json(OperationStatus {
        status: "Succeeded".to_string(),
        error: None,
    }))
}
