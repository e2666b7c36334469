use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::api::{Page, PageRequest, Precondition, ZoneApi};
use crate::auth::TokenCredential;
use crate::config::ClientConfig;
use crate::error::{DnsError, ErrorResponseBody};
use crate::management::types::{
    OperationStatus, RecordSetListResult, RecordSetResource, ZoneResource,
};
use crate::model::{ContinuationToken, ETag, RecordSet, RecordType, Tags, Zone};
use crate::validation::validate_record_set;

/// Headers that may point at the status of an accepted asynchronous operation.
const OPERATION_HEADERS: [&str; 2] = ["azure-asyncoperation", "location"];

/// `ZoneApi` over the REST surface of the DNS management service.
#[derive(Clone)]
pub struct DnsManagementClient {
    http: Client,
    config: ClientConfig,
    credential: Arc<dyn TokenCredential>,
}

impl DnsManagementClient {
    pub fn new(
        config: ClientConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, DnsError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_http_client(http, config, credential))
    }

    pub fn with_http_client(
        http: Client,
        config: ClientConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            http,
            config,
            credential,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Acquires a token up front so bad credentials fail before any request.
    pub async fn authenticate(&self) -> Result<(), DnsError> {
        let token = self.credential.get_token().await?;
        debug!(expires_at = %token.expires_at, "credential accepted");
        Ok(())
    }

    async fn auth_header(&self, req: RequestBuilder) -> Result<RequestBuilder, DnsError> {
        let token = self.credential.get_token().await?;
        Ok(req.bearer_auth(token.token))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .query(&[("api-version", self.config.api_version.as_str())])
    }

    /// Sends an authorized request; unsuccessful statuses become errors.
    async fn send(&self, req: RequestBuilder) -> Result<Response, DnsError> {
        let request = self.auth_header(req).await?.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let res = self.http.execute(request).await?;
        let status = res.status();
        debug!(%method, %url, %status, "management request");
        if status.is_success() {
            return Ok(res);
        }
        Err(error_from_response(res).await)
    }

    /// Parses a link returned by the service, refusing other origins so the
    /// bearer token never leaves the configured endpoint.
    fn same_origin(&self, link: &str) -> Result<Url, DnsError> {
        let endpoint = Url::parse(self.config.endpoint_root())
            .map_err(|e| DnsError::unknown(format!("invalid management endpoint: {e}")))?;
        let target = Url::parse(link)
            .map_err(|e| DnsError::unknown(format!("invalid link '{link}': {e}")))?;
        if target.origin() != endpoint.origin() {
            return Err(DnsError::unknown(format!(
                "refusing to follow link to foreign origin '{}'",
                target.origin().ascii_serialization()
            )));
        }
        Ok(target)
    }

    /// Polls an asynchronous operation until it settles or the configured
    /// timeout passes.
    async fn wait_for_operation(&self, link: &str) -> Result<(), DnsError> {
        let url = self.same_origin(link)?;
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let res = self.send(self.http.get(url.clone())).await?;
            let delay = retry_after(&res).unwrap_or(self.config.poll_interval);

            if res.status() != StatusCode::ACCEPTED {
                let text = res.text().await?;
                if text.trim().is_empty() {
                    return Ok(());
                }
                let op: OperationStatus = serde_json::from_str(&text).map_err(|e| {
                    DnsError::unknown(format!("malformed operation status: {e}"))
                })?;
                debug!(%url, status = %op.status, "operation status");
                match op.status.as_str() {
                    "Succeeded" => return Ok(()),
                    "Failed" | "Canceled" => {
                        let message = match op.error {
                            Some(detail) => detail.message,
                            None => format!("operation {}", op.status.to_ascii_lowercase()),
                        };
                        return Err(DnsError::unknown(message));
                    }
                    _ => {}
                }
            }

            if Instant::now() + delay > deadline {
                return Err(DnsError::Transient(format!(
                    "operation did not complete within {:?}",
                    self.config.timeout
                )));
            }
            sleep(delay).await;
        }
    }

    async fn read_record_set(
        res: Response,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        let body = res.json::<RecordSetResource>().await?;
        let mut record_set = body
            .properties
            .into_record_set(body.name.as_deref().unwrap_or(name), record_type)?;
        record_set.etag = body.etag.map(ETag::new);
        Ok(record_set)
    }
}

async fn error_from_response(res: Response) -> DnsError {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponseBody>(&text) {
        Ok(body) => body.error.message,
        Err(_) if text.trim().is_empty() => format!("request failed with {status}"),
        Err(_) => text,
    };
    DnsError::from_status(status.as_u16(), message)
}

fn operation_url(res: &Response) -> Option<String> {
    OPERATION_HEADERS
        .into_iter()
        .find_map(|name| res.headers().get(name)?.to_str().ok().map(str::to_string))
}

fn retry_after(res: &Response) -> Option<Duration> {
    res.headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl ZoneApi for DnsManagementClient {
    async fn create_zone(
        &self,
        resource_group: &str,
        zone_name: &str,
        tags: &Tags,
    ) -> Result<Zone, DnsError> {
        let url = self.config.zone_url(resource_group, zone_name);
        let req = self
            .request(Method::PUT, &url)
            .header(header::IF_NONE_MATCH, "*")
            .json(&ZoneResource::for_create(tags));
        let res = match self.send(req).await {
            Err(DnsError::PreconditionFailed(msg)) => return Err(DnsError::AlreadyExists(msg)),
            other => other?,
        };
        let body = res.json::<ZoneResource>().await?;
        Ok(body.into_zone(resource_group, zone_name))
    }

    async fn get_zone(&self, resource_group: &str, zone_name: &str) -> Result<Zone, DnsError> {
        let url = self.config.zone_url(resource_group, zone_name);
        let res = self.send(self.request(Method::GET, &url)).await?;
        let body = res.json::<ZoneResource>().await?;
        Ok(body.into_zone(resource_group, zone_name))
    }

    async fn delete_zone(&self, resource_group: &str, zone_name: &str) -> Result<(), DnsError> {
        let url = self.config.zone_url(resource_group, zone_name);
        let res = match self.send(self.request(Method::DELETE, &url)).await {
            Err(DnsError::NotFound(_)) => return Ok(()),
            other => other?,
        };
        if res.status() == StatusCode::ACCEPTED {
            if let Some(link) = operation_url(&res) {
                self.wait_for_operation(&link).await?;
            }
        }
        Ok(())
    }

    async fn upsert_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        record_set: &RecordSet,
        precondition: &Precondition,
    ) -> Result<RecordSet, DnsError> {
        validate_record_set(record_set)?;

        let record_type = record_set.record_type();
        let url =
            self.config
                .record_set_url(resource_group, zone_name, record_type, &record_set.name);
        let req = self
            .request(Method::PUT, &url)
            .json(&RecordSetResource::for_upsert(record_set));
        let req = match precondition {
            Precondition::None => req,
            Precondition::IfMatch(tag) => req.header(header::IF_MATCH, tag.as_str()),
            Precondition::IfNoneMatch => req.header(header::IF_NONE_MATCH, "*"),
            Precondition::IfExists => req.header(header::IF_MATCH, "*"),
        };

        let res = match self.send(req).await {
            Err(DnsError::PreconditionFailed(msg))
                if *precondition == Precondition::IfNoneMatch =>
            {
                return Err(DnsError::AlreadyExists(msg));
            }
            other => other?,
        };
        Self::read_record_set(res, &record_set.name, record_type).await
    }

    async fn get_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        let url = self
            .config
            .record_set_url(resource_group, zone_name, record_type, name);
        let res = self.send(self.request(Method::GET, &url)).await?;
        Self::read_record_set(res, name, record_type).await
    }

    async fn delete_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsError> {
        let url = self
            .config
            .record_set_url(resource_group, zone_name, record_type, name);
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn list_record_sets_page(
        &self,
        resource_group: &str,
        zone_name: &str,
        request: &PageRequest,
    ) -> Result<Page<RecordSet>, DnsError> {
        let req = match request {
            PageRequest::First {
                page_size,
                record_type,
            } => {
                let zone_url = self.config.zone_url(resource_group, zone_name);
                let url = match record_type {
                    Some(t) => format!("{zone_url}/{t}"),
                    None => format!("{zone_url}/recordsets"),
                };
                let req = self.request(Method::GET, &url);
                match page_size {
                    Some(top) => req.query(&[("$top", top)]),
                    None => req,
                }
            }
            PageRequest::Next(token) => self.http.get(self.same_origin(token.as_str())?),
        };

        let res = self.send(req).await?;
        let body = res.json::<RecordSetListResult>().await?;
        let items = body
            .value
            .into_iter()
            .map(|resource| resource.into_record_set().map_err(DnsError::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            continuation: body
                .next_link
                .filter(|link| !link.is_empty())
                .map(ContinuationToken::new),
        })
    }
}
