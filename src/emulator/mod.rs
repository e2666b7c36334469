//! Local stand-in for the DNS management service and its token endpoint,
//! served over HTTP from an [`InMemoryZoneStore`].
pub mod identity;
pub mod record_sets;
pub mod zones;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Router,
    http::{HeaderMap, header},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::api::Precondition;
use crate::config::API_VERSION;
use crate::error::DnsError;
use crate::model::ETag;
use crate::store::{InMemoryZoneStore, StoreOptions};

/// Reported as `maxNumberOfRecordSets` on every zone.
pub const MAX_RECORD_SETS_PER_ZONE: u64 = 10_000;

const ZONE_PATH: &str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Network/dnsZones/{zone_name}";

/// A service principal the token endpoint accepts.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmulatorConfig {
    pub credentials: Vec<ClientCredentials>,
    /// Bearer tokens accepted without going through the token endpoint.
    pub static_tokens: Vec<String>,
    pub store: StoreOptions,
}

pub struct EmulatorState {
    pub config: EmulatorConfig,
    pub store: InMemoryZoneStore,
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
    operations: Mutex<HashSet<String>>,
    counter: AtomicU64,
}

pub type SharedState = Arc<EmulatorState>;

impl EmulatorState {
    pub fn new(config: EmulatorConfig) -> SharedState {
        let store = InMemoryZoneStore::new(config.store.clone());
        Arc::new(Self {
            config,
            store,
            issued: Mutex::new(HashMap::new()),
            operations: Mutex::new(HashSet::new()),
            counter: AtomicU64::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn remember_token(&self, token: String, expires_at: DateTime<Utc>) {
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, expires_at);
    }

    pub(crate) fn accepts_token(&self, token: &str) -> bool {
        if self.config.static_tokens.iter().any(|t| t == token) {
            return true;
        }
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        issued.retain(|_, expires_at| *expires_at > now);
        issued.contains_key(token)
    }

    pub(crate) fn start_operation(&self) -> String {
        let id = format!("op-{:08x}", self.next_id());
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone());
        id
    }

    pub(crate) fn has_operation(&self, id: &str) -> bool {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }
}

pub fn create_router(state: SharedState) -> Router {
    let record_type_path = format!("{ZONE_PATH}/{{record_type}}");
    let record_set_path = format!("{ZONE_PATH}/{{record_type}}/{{name}}");

    Router::new()
        // identity
        .route("/{tenant_id}/oauth2/v2.0/token", post(identity::issue_token))
        // zones
        .route(
            ZONE_PATH,
            get(zones::get_zone)
                .put(zones::put_zone)
                .delete(zones::delete_zone),
        )
        .route(
            "/subscriptions/{subscription_id}/providers/Microsoft.Network/locations/global/operationResults/{operation_id}",
            get(zones::operation_result),
        )
        // record sets
        .route(
            &format!("{ZONE_PATH}/recordsets"),
            get(record_sets::list_all),
        )
        .route(&record_type_path, get(record_sets::list_by_type))
        .route(
            &record_set_path,
            get(record_sets::get_record_set)
                .put(record_sets::put_record_set)
                .delete(record_sets::delete_record_set),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

#[derive(Debug, Deserialize)]
pub struct ApiVersionQuery {
    #[serde(rename = "api-version")]
    pub api_version: Option<String>,
}

/// Every management request must name the API version it speaks.
pub(crate) fn require_api_version(api_version: Option<&str>) -> Result<&str, DnsError> {
    match api_version {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DnsError::Invalid(
            "The api-version query parameter (?api-version=) is required for all requests."
                .into(),
        )),
    }
}

/// `http://{host}` of the request, used to build absolute links back to
/// this emulator.
pub(crate) fn base_url(headers: &HeaderMap) -> Result<String, DnsError> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{host}"))
        .ok_or_else(|| DnsError::Invalid("missing Host header".into()))
}

/// Precondition carried by the conditional-request headers.
pub(crate) fn precondition(headers: &HeaderMap) -> Result<Precondition, DnsError> {
    match (
        etag_header(headers, header::IF_MATCH)?,
        etag_header(headers, header::IF_NONE_MATCH)?,
    ) {
        (Some(_), Some(_)) => Err(DnsError::Invalid(
            "If-Match and If-None-Match cannot be combined.".into(),
        )),
        (Some(tag), None) if tag == "*" => Ok(Precondition::IfExists),
        (Some(tag), None) => Ok(Precondition::IfMatch(ETag::new(tag))),
        (None, Some(tag)) if tag == "*" => Ok(Precondition::IfNoneMatch),
        (None, Some(tag)) => Err(DnsError::Invalid(format!(
            "If-None-Match only supports '*', got '{tag}'."
        ))),
        (None, None) => Ok(Precondition::None),
    }
}

fn etag_header(headers: &HeaderMap, name: header::HeaderName) -> Result<Option<String>, DnsError> {
    let Some(value) = headers.get(&name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| DnsError::Invalid(format!("invalid {name} header")))?;
    Ok(Some(value.trim().trim_matches('"').to_string()))
}

pub(crate) fn operation_url(base: &str, subscription_id: &str, operation_id: &str) -> String {
    format!(
        "{base}/subscriptions/{subscription_id}/providers/Microsoft.Network/locations/global/operationResults/{operation_id}?api-version={API_VERSION}"
    )
}
