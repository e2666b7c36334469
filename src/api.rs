//! The logical zone-management operations, independent of transport.
use async_trait::async_trait;

use crate::error::DnsError;
use crate::model::{ContinuationToken, ETag, RecordSet, RecordType, Tags, Zone};

/// Write condition attached to an upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Precondition {
    /// Create or overwrite unconditionally.
    #[default]
    None,
    /// Overwrite only while the stored token equals this one.
    IfMatch(ETag),
    /// Create only; fail when the resource already exists.
    IfNoneMatch,
    /// Overwrite only an existing resource, whatever its token (`If-Match: *`).
    IfExists,
}

/// Which page of a record set listing to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    First {
        /// Hint only; the service may return more or fewer items.
        page_size: Option<u32>,
        record_type: Option<RecordType>,
    },
    /// Subsequent pages are fetched by token alone.
    Next(ContinuationToken),
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the final page.
    pub continuation: Option<ContinuationToken>,
}

/// Zone and record set operations offered by a DNS management service.
///
/// Deleting an absent zone or record set succeeds.
#[async_trait]
pub trait ZoneApi: Send + Sync {
    /// Creates the zone, failing with `AlreadyExists` if it is present.
    async fn create_zone(
        &self,
        resource_group: &str,
        zone_name: &str,
        tags: &Tags,
    ) -> Result<Zone, DnsError>;

    async fn get_zone(&self, resource_group: &str, zone_name: &str) -> Result<Zone, DnsError>;

    /// Deletes the zone together with all of its record sets.
    async fn delete_zone(&self, resource_group: &str, zone_name: &str) -> Result<(), DnsError>;

    /// Creates or fully replaces a record set.
    async fn upsert_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        record_set: &RecordSet,
        precondition: &Precondition,
    ) -> Result<RecordSet, DnsError>;

    async fn get_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError>;

    /// Unconditional delete.
    async fn delete_record_set(
        &self,
        resource_group: &str,
        zone_name: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsError>;

    async fn list_record_sets_page(
        &self,
        resource_group: &str,
        zone_name: &str,
        request: &PageRequest,
    ) -> Result<Page<RecordSet>, DnsError>;
}
