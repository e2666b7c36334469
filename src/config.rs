use std::time::Duration;

use crate::model::{RecordType, Tags};

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const API_VERSION: &str = "2018-05-01";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Resource provider segment shared by every zone path.
const DNS_PROVIDER: &str = "providers/Microsoft.Network/dnsZones";

/// Connection settings for the management API client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub management_endpoint: String, // e.g. "https://management.azure.com"
    pub subscription_id: String,
    pub api_version: String,
    /// Per-request timeout; also bounds asynchronous-operation polling.
    pub timeout: Duration,
    /// Delay between polls of an asynchronous operation when the service
    /// gives no `Retry-After`.
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(management_endpoint: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            management_endpoint: management_endpoint.into(),
            subscription_id: subscription_id.into(),
            api_version: API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Endpoint without a trailing slash.
    pub fn endpoint_root(&self) -> &str {
        self.management_endpoint.trim_end_matches('/')
    }

    /// OAuth2 scope requested for management tokens.
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.endpoint_root())
    }

    /// Absolute URL of a zone resource.
    pub fn zone_url(&self, resource_group: &str, zone_name: &str) -> String {
        format!(
            "{}{}",
            self.endpoint_root(),
            zone_resource_id(&self.subscription_id, resource_group, zone_name)
        )
    }

    /// Absolute URL of a record set resource.
    pub fn record_set_url(
        &self,
        resource_group: &str,
        zone_name: &str,
        record_type: RecordType,
        name: &str,
    ) -> String {
        format!(
            "{}/{}/{}",
            self.zone_url(resource_group, zone_name),
            record_type.as_str(),
            name
        )
    }
}

/// Resource id of a zone (`/subscriptions/.../dnsZones/{zone}`).
pub fn zone_resource_id(subscription_id: &str, resource_group: &str, zone_name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/{}/{}",
        subscription_id, resource_group, DNS_PROVIDER, zone_name
    )
}

/// Inputs of one workflow run.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub resource_group: String,
    pub zone_name: String,
    /// Page size hint for enumeration steps.
    pub page_size: u32,
    /// Upper bound on any single step.
    pub step_timeout: Duration,
    pub zone_tags: Tags,
}

impl WorkflowConfig {
    pub fn new(resource_group: impl Into<String>, zone_name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            zone_name: zone_name.into(),
            page_size: 2,
            step_timeout: DEFAULT_TIMEOUT,
            zone_tags: Tags::from([("dept".to_string(), "finance".to_string())]),
        }
    }
}
