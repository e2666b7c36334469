//! In-process zone store that enforces the management service's rules:
//! existence preconditions, concurrency tokens that change on every write,
//! cascade delete and cursor-based paging.
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{Page, PageRequest, Precondition, ZoneApi};
use crate::error::DnsError;
use crate::model::{
    ContinuationToken, ETag, RecordPayload, RecordSet, RecordType, SoaRecord, Tags, Zone,
};
use crate::validation::{validate_record_set, validate_zone_name};

pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
const APEX_NS_TTL: u32 = 172_800;
const APEX_SOA_TTL: u32 = 3600;
const SOA_EMAIL: &str = "azuredns-hostmaster.microsoft.com";

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// When non-empty, new zones get apex NS and SOA record sets naming these.
    pub apex_name_servers: Vec<String>,
    /// Upper bound applied to page size hints.
    pub max_page_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            apex_name_servers: Vec::new(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

type ZoneKey = (String, String);
type RecordKey = (RecordType, String);

struct StoredZone {
    zone: Zone,
    record_sets: BTreeMap<RecordKey, RecordSet>,
}

impl StoredZone {
    fn snapshot(&self) -> Zone {
        let mut zone = self.zone.clone();
        zone.number_of_record_sets = self.record_sets.len() as u64;
        zone
    }
}

#[derive(Default)]
struct StoreState {
    zones: HashMap<ZoneKey, StoredZone>,
    revision: u64,
}

impl StoreState {
    fn next_etag(&mut self) -> ETag {
        self.revision += 1;
        ETag::new(format!("{:016x}", self.revision))
    }
}

/// Position of a listing, handed out as an opaque continuation token.
#[derive(Serialize, Deserialize)]
struct Cursor {
    resource_group: String,
    zone: String,
    #[serde(default)]
    record_type: Option<RecordType>,
    top: u32,
    after: RecordKey,
}

impl Cursor {
    fn encode(&self) -> Result<ContinuationToken, DnsError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| DnsError::unknown(format!("failed to encode cursor: {e}")))?;
        Ok(ContinuationToken::new(BASE64.encode(json)))
    }

    fn decode(token: &ContinuationToken) -> Result<Self, DnsError> {
        let bytes = BASE64
            .decode(token.as_str())
            .map_err(|_| DnsError::Invalid("malformed continuation token".into()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| DnsError::Invalid("malformed continuation token".into()))
    }
}

fn zone_key(resource_group: &str, zone_name: &str) -> ZoneKey {
    (
        resource_group.to_ascii_lowercase(),
        zone_name.trim_end_matches('.').to_ascii_lowercase(),
    )
}

fn record_key(name: &str, record_type: RecordType) -> RecordKey {
    (record_type, name.to_ascii_lowercase())
}

fn fqdn(name: &str, zone_name: &str) -> String {
    let zone = zone_name.trim_end_matches('.');
    if name == "@" {
        format!("{zone}.")
    } else {
        format!("{name}.{zone}.")
    }
}

fn zone_not_found(resource_group: &str, zone_name: &str) -> DnsError {
    DnsError::not_found(format!(
        "The resource 'Microsoft.Network/dnszones/{zone_name}' under resource group '{resource_group}' was not found."
    ))
}

fn record_set_not_found(name: &str, record_type: RecordType, zone_name: &str) -> DnsError {
    DnsError::not_found(format!(
        "The resource record '{name}' of type '{record_type}' does not exist in zone '{zone_name}'."
    ))
}

/// Zones and record sets held in memory.
pub struct InMemoryZoneStore {
    state: Mutex<StoreState>,
    options: StoreOptions,
}

impl Default for InMemoryZoneStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl InMemoryZoneStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a zone or replaces its tags. Returns the zone and whether it was created.
    pub fn put_zone(
        &self,
        resource_group: &str,
        zone_name: &str,
        tags: &Tags,
        precondition: &Precondition,
    ) -> Result<(Zone, bool), DnsError> {
        validate_zone_name(zone_name)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        let etag = state.next_etag();
        let key = zone_key(resource_group, zone_name);

        if let Some(existing) = state.zones.get_mut(&key) {
            match precondition {
                Precondition::IfNoneMatch => {
                    return Err(DnsError::AlreadyExists(format!(
                        "The zone '{zone_name}' already exists in resource group '{resource_group}'."
                    )));
                }
                Precondition::IfMatch(tag) if existing.zone.etag.as_ref() != Some(tag) => {
                    return Err(DnsError::precondition_failed(format!(
                        "The Etag '{tag}' does not match the current Etag of zone '{zone_name}'."
                    )));
                }
                Precondition::None | Precondition::IfMatch(_) | Precondition::IfExists => {}
            }
            existing.zone.tags = tags.clone();
            existing.zone.etag = Some(etag);
            return Ok((existing.snapshot(), false));
        }

        match precondition {
            Precondition::IfMatch(tag) => {
                return Err(DnsError::precondition_failed(format!(
                    "The Etag '{tag}' was provided but zone '{zone_name}' does not exist."
                )));
            }
            Precondition::IfExists => {
                return Err(DnsError::precondition_failed(format!(
                    "The zone '{zone_name}' does not exist in resource group '{resource_group}'."
                )));
            }
            Precondition::None | Precondition::IfNoneMatch => {}
        }

        let mut zone = Zone::new(resource_group, zone_name);
        zone.tags = tags.clone();
        zone.etag = Some(etag);
        zone.name_servers = self.options.apex_name_servers.clone();

        let mut record_sets = BTreeMap::new();
        if let Some(primary) = zone.name_servers.first().cloned() {
            let mut apex = RecordSet::new(
                "@",
                APEX_NS_TTL,
                RecordPayload::Ns(zone.name_servers.clone()),
            );
            apex.etag = Some(state.next_etag());
            apex.fqdn = Some(fqdn("@", zone_name));
            record_sets.insert(record_key("@", RecordType::Ns), apex);

            let mut soa = RecordSet::new(
                "@",
                APEX_SOA_TTL,
                RecordPayload::Soa(SoaRecord::new(primary, SOA_EMAIL)),
            );
            soa.etag = Some(state.next_etag());
            soa.fqdn = Some(fqdn("@", zone_name));
            record_sets.insert(record_key("@", RecordType::Soa), soa);
        }

        let stored = StoredZone { zone, record_sets };
        let snapshot = stored.snapshot();
        state.zones.insert(key, stored);
        debug!(resource_group, zone_name, "zone created");
        Ok((snapshot, true))
    }

    pub fn zone(&self, resource_group: &str, zone_name: &str) -> Result<Zone, DnsError> {
        self.lock()
            .zones
            .get(&zone_key(resource_group, zone_name))
            .map(StoredZone::snapshot)
            .ok_or_else(|| zone_not_found(resource_group, zone_name))
    }

    /// Removes a zone and its record sets. Returns whether it existed.
    pub fn remove_zone(&self, resource_group: &str, zone_name: &str) -> bool {
        let removed = self
            .lock()
            .zones
            .remove(&zone_key(resource_group, zone_name));
        if let Some(stored) = &removed {
            debug!(
                resource_group,
                zone_name,
                record_sets = stored.record_sets.len(),
                "zone deleted"
            );
        }
        removed.is_some()
    }

    /// Creates or replaces a record set. Returns the stored set and whether it was created.
    pub fn put_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        record_set: &RecordSet,
        precondition: &Precondition,
    ) -> Result<(RecordSet, bool), DnsError> {
        validate_record_set(record_set)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        let etag = state.next_etag();
        let stored = state
            .zones
            .get_mut(&zone_key(resource_group, zone_name))
            .ok_or_else(|| zone_not_found(resource_group, zone_name))?;

        let record_type = record_set.record_type();
        let key = record_key(&record_set.name, record_type);
        let existing = stored.record_sets.get(&key);
        match (precondition, existing) {
            (Precondition::IfNoneMatch, Some(_)) => {
                return Err(DnsError::AlreadyExists(format!(
                    "The record set '{}' of type '{record_type}' already exists.",
                    record_set.name
                )));
            }
            (Precondition::IfMatch(tag), Some(current)) if current.etag.as_ref() != Some(tag) => {
                return Err(DnsError::precondition_failed(format!(
                    "The Etag '{tag}' provided in the If-Match header does not match the current Etag of record set '{}' of type '{record_type}'.",
                    record_set.name
                )));
            }
            (Precondition::IfMatch(tag), None) => {
                return Err(DnsError::precondition_failed(format!(
                    "The Etag '{tag}' was provided but record set '{}' of type '{record_type}' does not exist.",
                    record_set.name
                )));
            }
            (Precondition::IfExists, None) => {
                return Err(DnsError::precondition_failed(format!(
                    "The record set '{}' of type '{record_type}' does not exist.",
                    record_set.name
                )));
            }
            _ => {}
        }
        let created = existing.is_none();

        let mut saved = record_set.clone();
        saved.etag = Some(etag);
        saved.fqdn = Some(fqdn(&record_set.name, &stored.zone.name));
        stored.record_sets.insert(key, saved.clone());
        Ok((saved, created))
    }

    pub fn record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        let guard = self.lock();
        let stored = guard
            .zones
            .get(&zone_key(resource_group, zone_name))
            .ok_or_else(|| zone_not_found(resource_group, zone_name))?;
        stored
            .record_sets
            .get(&record_key(name, record_type))
            .cloned()
            .ok_or_else(|| record_set_not_found(name, record_type, zone_name))
    }

    /// Removes a record set without any token check. Returns whether it existed.
    pub fn remove_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<bool, DnsError> {
        let mut guard = self.lock();
        let stored = guard
            .zones
            .get_mut(&zone_key(resource_group, zone_name))
            .ok_or_else(|| zone_not_found(resource_group, zone_name))?;
        Ok(stored
            .record_sets
            .remove(&record_key(name, record_type))
            .is_some())
    }

    /// One page of record sets ordered by (type, name).
    pub fn page(
        &self,
        resource_group: &str,
        zone_name: &str,
        request: &PageRequest,
    ) -> Result<Page<RecordSet>, DnsError> {
        let key = zone_key(resource_group, zone_name);
        let (record_type, top, after) = match request {
            PageRequest::First {
                page_size,
                record_type,
            } => {
                let top = page_size
                    .unwrap_or(self.options.max_page_size)
                    .clamp(1, self.options.max_page_size.max(1));
                (*record_type, top, None)
            }
            PageRequest::Next(token) => {
                let cursor = Cursor::decode(token)?;
                if (cursor.resource_group.as_str(), cursor.zone.as_str())
                    != (key.0.as_str(), key.1.as_str())
                {
                    return Err(DnsError::Invalid(format!(
                        "The continuation token does not belong to zone '{zone_name}'."
                    )));
                }
                let top = cursor.top.clamp(1, self.options.max_page_size.max(1));
                (cursor.record_type, top, Some(cursor.after))
            }
        };

        let guard = self.lock();
        let stored = guard
            .zones
            .get(&key)
            .ok_or_else(|| zone_not_found(resource_group, zone_name))?;

        let lower = match after {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        let mut matching = stored
            .record_sets
            .range((lower, Bound::Unbounded))
            .filter(|((t, _), _)| record_type.is_none_or(|wanted| wanted == *t));

        let mut items = Vec::new();
        let mut last_key = None;
        for (k, rs) in matching.by_ref().take(top as usize) {
            items.push(rs.clone());
            last_key = Some(k.clone());
        }

        let continuation = match (matching.next(), last_key) {
            (Some(_), Some(after)) => Some(
                Cursor {
                    resource_group: key.0.clone(),
                    zone: key.1.clone(),
                    record_type,
                    top,
                    after,
                }
                .encode()?,
            ),
            _ => None,
        };

        Ok(Page {
            items,
            continuation,
        })
    }
}

#[async_trait]
impl ZoneApi for InMemoryZoneStore {
    async fn create_zone(
        &self,
        resource_group: &str,
        zone_name: &str,
        tags: &Tags,
    ) -> Result<Zone, DnsError> {
        self.put_zone(resource_group, zone_name, tags, &Precondition::IfNoneMatch)
            .map(|(zone, _)| zone)
    }

    async fn get_zone(&self, resource_group: &str, zone_name: &str) -> Result<Zone, DnsError> {
        self.zone(resource_group, zone_name)
    }

    async fn delete_zone(&self, resource_group: &str, zone_name: &str) -> Result<(), DnsError> {
        self.remove_zone(resource_group, zone_name);
        Ok(())
    }

    async fn upsert_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        record_set: &RecordSet,
        precondition: &Precondition,
    ) -> Result<RecordSet, DnsError> {
        self.put_record_set(resource_group, zone_name, record_set, precondition)
            .map(|(saved, _)| saved)
    }

    async fn get_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        self.record_set(resource_group, zone_name, name, record_type)
    }

    async fn delete_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsError> {
        self.remove_record_set(resource_group, zone_name, name, record_type)
            .map(|_| ())
    }

    async fn list_record_sets_page(
        &self,
        resource_group: &str,
        zone_name: &str,
        request: &PageRequest,
    ) -> Result<Page<RecordSet>, DnsError> {
        self.page(resource_group, zone_name, request)
    }
}
