//! Zones, record sets and the typed record payloads they carry.
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Location every DNS zone is created with.
pub const GLOBAL_LOCATION: &str = "global";

/// Free-form resource tags attached to a zone.
pub type Tags = BTreeMap<String, String>;

/// Free-form metadata attached to a record set.
pub type Metadata = BTreeMap<String, String>;

/// Record types a record set can hold.
///
/// The derived ordering is the enumeration order used when listing record sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Caa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Srv,
    Txt,
}

impl RecordType {
    pub const ALL: [RecordType; 10] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Caa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Soa,
        RecordType::Srv,
        RecordType::Txt,
    ];

    /// Upper-case mnemonic, as used in resource paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownRecordType(s.to_string()))
    }
}

/// Opaque version stamp of a zone or record set (an HTTP entity tag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque cursor returned with a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A DNS zone hosted by the management service.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: Tags,
    pub etag: Option<ETag>,
    pub number_of_record_sets: u64,
    /// Name servers the service assigned to the zone.
    pub name_servers: Vec<String>,
}

impl Zone {
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            location: GLOBAL_LOCATION.to_string(),
            tags: Tags::new(),
            etag: None,
            number_of_record_sets: 0,
            name_servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MxRecord {
    /// Lower values are preferred.
    pub priority: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(priority: u16, exchange: impl Into<String>) -> Self {
        Self {
            priority,
            exchange: exchange.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

impl SrvRecord {
    pub fn new(priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        Self {
            priority,
            weight,
            port,
            target: target.into(),
        }
    }
}

/// A certification authority authorization record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaaRecord {
    pub flags: u8,
    pub tag: String,
    pub value: String,
}

impl CaaRecord {
    pub fn new(flags: u8, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flags,
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// The start-of-authority record the service keeps at the zone apex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoaRecord {
    pub host: String,
    pub email: String,
    pub serial_number: u32,
    pub refresh_time: u32,
    pub retry_time: u32,
    pub expire_time: u32,
    pub minimum_ttl: u32,
}

impl SoaRecord {
    /// SOA for a zone whose primary name server is `host`, with the service's default timers.
    pub fn new(host: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            email: email.into(),
            serial_number: 1,
            refresh_time: 3600,
            retry_time: 300,
            expire_time: 2_419_200,
            minimum_ttl: 300,
        }
    }
}

/// One TXT record: a list of character strings that consumers concatenate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxtRecord {
    pub values: Vec<String>,
}

impl TxtRecord {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The record as a resolver presents it: all strings joined.
    pub fn joined(&self) -> String {
        self.values.concat()
    }
}

/// The records of a record set, tagged by type.
///
/// CNAME and SOA hold exactly one record; every other type holds a list.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    A(Vec<Ipv4Addr>),
    Aaaa(Vec<Ipv6Addr>),
    Caa(Vec<CaaRecord>),
    Cname(String),
    Mx(Vec<MxRecord>),
    Ns(Vec<String>),
    Ptr(Vec<String>),
    Soa(SoaRecord),
    Srv(Vec<SrvRecord>),
    Txt(Vec<TxtRecord>),
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::A(_) => RecordType::A,
            RecordPayload::Aaaa(_) => RecordType::Aaaa,
            RecordPayload::Caa(_) => RecordType::Caa,
            RecordPayload::Cname(_) => RecordType::Cname,
            RecordPayload::Mx(_) => RecordType::Mx,
            RecordPayload::Ns(_) => RecordType::Ns,
            RecordPayload::Ptr(_) => RecordType::Ptr,
            RecordPayload::Soa(_) => RecordType::Soa,
            RecordPayload::Srv(_) => RecordType::Srv,
            RecordPayload::Txt(_) => RecordType::Txt,
        }
    }

    /// Number of individual records.
    pub fn len(&self) -> usize {
        match self {
            RecordPayload::A(v) => v.len(),
            RecordPayload::Aaaa(v) => v.len(),
            RecordPayload::Caa(v) => v.len(),
            RecordPayload::Cname(_) | RecordPayload::Soa(_) => 1,
            RecordPayload::Mx(v) => v.len(),
            RecordPayload::Ns(v) => v.len(),
            RecordPayload::Ptr(v) => v.len(),
            RecordPayload::Srv(v) => v.len(),
            RecordPayload::Txt(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when two records in the payload are equal.
    pub fn has_duplicates(&self) -> bool {
        match self {
            RecordPayload::A(v) => contains_duplicates(v),
            RecordPayload::Aaaa(v) => contains_duplicates(v),
            RecordPayload::Caa(v) => contains_duplicates(v),
            RecordPayload::Cname(_) | RecordPayload::Soa(_) => false,
            RecordPayload::Mx(v) => contains_duplicates(v),
            RecordPayload::Ns(v) => contains_duplicates(v),
            RecordPayload::Ptr(v) => contains_duplicates(v),
            RecordPayload::Srv(v) => contains_duplicates(v),
            RecordPayload::Txt(v) => contains_duplicates(v),
        }
    }

    /// Appends the records of `other` that are not already present.
    ///
    /// Returns how many records were added. CNAME and SOA payloads cannot grow.
    pub fn append_distinct(&mut self, other: RecordPayload) -> Result<usize, ValidationError> {
        let found = other.record_type();
        match (self, other) {
            (RecordPayload::A(mine), RecordPayload::A(theirs)) => Ok(extend_distinct(mine, theirs)),
            (RecordPayload::Aaaa(mine), RecordPayload::Aaaa(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Caa(mine), RecordPayload::Caa(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Mx(mine), RecordPayload::Mx(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Ns(mine), RecordPayload::Ns(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Ptr(mine), RecordPayload::Ptr(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Srv(mine), RecordPayload::Srv(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Txt(mine), RecordPayload::Txt(theirs)) => {
                Ok(extend_distinct(mine, theirs))
            }
            (RecordPayload::Cname(mine), RecordPayload::Cname(theirs)) if *mine == theirs => Ok(0),
            (RecordPayload::Cname(_), RecordPayload::Cname(_)) => {
                Err(ValidationError::CnameCardinality)
            }
            (RecordPayload::Soa(mine), RecordPayload::Soa(theirs)) if *mine == theirs => Ok(0),
            (RecordPayload::Soa(_), RecordPayload::Soa(_)) => Err(ValidationError::SoaCardinality),
            (mine, _) => Err(ValidationError::TypeMismatch {
                expected: mine.record_type(),
                found,
            }),
        }
    }
}

fn contains_duplicates<T: Eq + Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    !items.iter().all(|item| seen.insert(item))
}

fn extend_distinct<T: PartialEq>(mine: &mut Vec<T>, theirs: Vec<T>) -> usize {
    let before = mine.len();
    for item in theirs {
        if !mine.contains(&item) {
            mine.push(item);
        }
    }
    mine.len() - before
}

/// A record set: one name, one type, the records of that type and their TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Name relative to the zone; `@` is the apex.
    pub name: String,
    pub ttl: u32,
    pub metadata: Metadata,
    pub etag: Option<ETag>,
    /// Fully qualified name, assigned by the service.
    pub fqdn: Option<String>,
    pub payload: RecordPayload,
}

impl RecordSet {
    pub fn new(name: impl Into<String>, ttl: u32, payload: RecordPayload) -> Self {
        Self {
            name: name.into(),
            ttl,
            metadata: Metadata::new(),
            etag: None,
            fqdn: None,
            payload,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn record_type(&self) -> RecordType {
        self.payload.record_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_parse() {
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert_eq!("CNAME".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert_eq!("soa".parse::<RecordType>().unwrap(), RecordType::Soa);
        assert!("DNSKEY".parse::<RecordType>().is_err());
        assert_eq!(RecordType::Srv.to_string(), "SRV");
    }

    #[test]
    fn test_record_type_serde_names() {
        let json = serde_json::to_string(&RecordType::Aaaa).unwrap();
        assert_eq!(json, "\"AAAA\"");
        let back: RecordType = serde_json::from_str("\"TXT\"").unwrap();
        assert_eq!(back, RecordType::Txt);
    }

    #[test]
    fn test_payload_type_tag() {
        let rs = RecordSet::new("cname-test", 3600, RecordPayload::Cname("www.contoso.com".into()));
        assert_eq!(rs.record_type(), RecordType::Cname);
        assert_eq!(rs.payload.len(), 1);
    }

    #[test]
    fn test_append_distinct_skips_existing() {
        let mut payload = RecordPayload::A(vec![Ipv4Addr::new(1, 2, 3, 4)]);
        let added = payload
            .append_distinct(RecordPayload::A(vec![
                Ipv4Addr::new(1, 2, 3, 4),
                Ipv4Addr::new(5, 6, 7, 8),
            ]))
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            payload,
            RecordPayload::A(vec![Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(5, 6, 7, 8)])
        );
        assert!(!payload.has_duplicates());
    }

    #[test]
    fn test_append_distinct_rejects_other_type() {
        let mut payload = RecordPayload::Ns(vec!["ns1.contoso.com".into()]);
        let err = payload
            .append_distinct(RecordPayload::Ptr(vec!["ptr.contoso.com".into()]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                expected: RecordType::Ns,
                found: RecordType::Ptr
            }
        );
    }

    #[test]
    fn test_cname_cannot_grow() {
        let mut payload = RecordPayload::Cname("a.example.com".into());
        assert_eq!(
            payload.append_distinct(RecordPayload::Cname("a.example.com".into())),
            Ok(0)
        );
        assert_eq!(
            payload.append_distinct(RecordPayload::Cname("b.example.com".into())),
            Err(ValidationError::CnameCardinality)
        );
    }

    #[test]
    fn test_soa_cannot_grow() {
        let soa = SoaRecord::new("ns1-01.example.net.", "hostmaster.example.net");
        let mut payload = RecordPayload::Soa(soa.clone());
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.append_distinct(RecordPayload::Soa(soa)), Ok(0));
        assert_eq!(
            payload.append_distinct(RecordPayload::Soa(SoaRecord::new(
                "ns2-01.example.net.",
                "hostmaster.example.net"
            ))),
            Err(ValidationError::SoaCardinality)
        );
    }

    #[test]
    fn test_enumeration_order_places_soa_after_ptr() {
        let mut types = vec![RecordType::Txt, RecordType::Soa, RecordType::Caa, RecordType::Ptr];
        types.sort();
        assert_eq!(
            types,
            vec![RecordType::Caa, RecordType::Ptr, RecordType::Soa, RecordType::Txt]
        );
    }

    #[test]
    fn test_txt_joined() {
        let txt = TxtRecord::new(["v=spf1 ", "-all"]);
        assert_eq!(txt.joined(), "v=spf1 -all");
    }

    #[test]
    fn test_duplicate_detection() {
        let payload = RecordPayload::Mx(vec![
            MxRecord::new(10, "mail.contoso.com"),
            MxRecord::new(10, "mail.contoso.com"),
        ]);
        assert!(payload.has_duplicates());
    }
}
