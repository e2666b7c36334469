use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use super::identity::Authenticated;
use super::zones::ZonePath;
use super::{ApiVersionQuery, SharedState, base_url, precondition, require_api_version};
use crate::api::PageRequest;
use crate::config::zone_resource_id;
use crate::error::DnsError;
use crate::management::types::{RecordSetListResult, RecordSetResource};
use crate::model::{ContinuationToken, RecordSet, RecordType};

#[derive(Debug, Deserialize)]
pub struct RecordTypePath {
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
    pub record_type: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordSetPath {
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
    pub record_type: String,
    pub name: String,
}

impl RecordSetPath {
    fn zone_id(&self) -> String {
        zone_resource_id(&self.subscription_id, &self.resource_group, &self.zone_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "api-version")]
    pub api_version: Option<String>,
    #[serde(rename = "$top")]
    pub top: Option<u32>,
    #[serde(rename = "$skipToken")]
    pub skip_token: Option<String>,
}

fn record_set_response(status: StatusCode, zone_id: &str, record_set: &RecordSet) -> Response {
    let body = RecordSetResource::from_record_set(record_set, zone_id);
    match &record_set.etag {
        Some(etag) => (status, [(header::ETAG, etag.to_string())], Json(body)).into_response(),
        None => (status, Json(body)).into_response(),
    }
}

// GET {zone}/recordsets
pub async fn list_all(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(zone): Path<ZonePath>,
    Query(query): Query<ListQuery>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<RecordSetListResult>, DnsError> {
    list(&state, &zone, None, query, &uri, &headers)
}

// GET {zone}/{record_type}
pub async fn list_by_type(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<RecordTypePath>,
    Query(query): Query<ListQuery>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<RecordSetListResult>, DnsError> {
    let record_type: RecordType = path.record_type.parse()?;
    let zone = ZonePath {
        subscription_id: path.subscription_id,
        resource_group: path.resource_group,
        zone_name: path.zone_name,
    };
    list(&state, &zone, Some(record_type), query, &uri, &headers)
}

/// One page of a listing. `nextLink` points back at the same path with
/// the store's continuation token as `$skipToken`.
fn list(
    state: &SharedState,
    zone: &ZonePath,
    record_type: Option<RecordType>,
    query: ListQuery,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Json<RecordSetListResult>, DnsError> {
    let api_version = require_api_version(query.api_version.as_deref())?;

    let request = match query.skip_token {
        Some(token) => PageRequest::Next(ContinuationToken::new(token)),
        None => PageRequest::First {
            page_size: query.top,
            record_type,
        },
    };
    let page = state
        .store
        .page(&zone.resource_group, &zone.zone_name, &request)?;

    let zone_id = zone.resource_id();
    let next_link = match page.continuation {
        Some(token) => Some(format!(
            "{}{}?api-version={api_version}&$skipToken={}",
            base_url(headers)?,
            uri.path(),
            token.as_str()
        )),
        None => None,
    };
    debug!(
        zone = %zone.zone_name,
        items = page.items.len(),
        more = next_link.is_some(),
        "listed record sets"
    );

    Ok(Json(RecordSetListResult {
        value: page
            .items
            .iter()
            .map(|rs| RecordSetResource::from_record_set(rs, &zone_id))
            .collect(),
        next_link,
    }))
}

// GET {zone}/{record_type}/{name}
pub async fn get_record_set(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<RecordSetPath>,
    Query(query): Query<ApiVersionQuery>,
) -> Result<Response, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let record_type: RecordType = path.record_type.parse()?;
    let record_set =
        state
            .store
            .record_set(&path.resource_group, &path.zone_name, &path.name, record_type)?;
    Ok(record_set_response(StatusCode::OK, &path.zone_id(), &record_set))
}

// PUT {zone}/{record_type}/{name}
pub async fn put_record_set(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<RecordSetPath>,
    Query(query): Query<ApiVersionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let record_type: RecordType = path.record_type.parse()?;
    let resource: RecordSetResource = serde_json::from_slice(&body)
        .map_err(|e| DnsError::Invalid(format!("The request body is malformed: {e}")))?;
    let record_set = resource.properties.into_record_set(&path.name, record_type)?;

    let (saved, created) = state.store.put_record_set(
        &path.resource_group,
        &path.zone_name,
        &record_set,
        &precondition(&headers)?,
    )?;
    info!(zone = %path.zone_name, name = %saved.name, %record_type, created, "record set written");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(record_set_response(status, &path.zone_id(), &saved))
}

// DELETE {zone}/{record_type}/{name}
pub async fn delete_record_set(
    _auth: Authenticated,
    Extension(state): Extension<SharedState>,
    Path(path): Path<RecordSetPath>,
    Query(query): Query<ApiVersionQuery>,
) -> Result<StatusCode, DnsError> {
    require_api_version(query.api_version.as_deref())?;
    let record_type: RecordType = path.record_type.parse()?;
    let existed = state.store.remove_record_set(
        &path.resource_group,
        &path.zone_name,
        &path.name,
        record_type,
    )?;
    if existed {
        info!(zone = %path.zone_name, name = %path.name, %record_type, "record set deleted");
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}
