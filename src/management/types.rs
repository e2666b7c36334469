use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::error::ErrorDetail;
use crate::model::{
    CaaRecord, ETag, Metadata, MxRecord, RecordPayload, RecordSet, RecordType, SoaRecord,
    SrvRecord, Tags, TxtRecord, Zone,
};
use crate::validation::ValidationError;

/// Resource type reported for zones; record sets append `/{TYPE}`.
pub const ZONE_RESOURCE_TYPE: &str = "Microsoft.Network/dnszones";

/// TTL assumed when a record set body omits one.
pub const DEFAULT_TTL: u32 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>, // "/subscriptions/.../dnszones/contoso.com"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>, // "contoso.com"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub location: String, // always "global"
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub properties: ZoneProperties,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_record_sets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_record_sets: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
}

impl ZoneResource {
    /// Request body for creating a zone.
    pub fn for_create(tags: &Tags) -> Self {
        Self {
            id: None,
            name: None,
            resource_type: None,
            location: crate::model::GLOBAL_LOCATION.to_string(),
            tags: tags.clone(),
            etag: None,
            properties: ZoneProperties::default(),
        }
    }

    pub fn from_zone(zone: &Zone, id: String, max_number_of_record_sets: u64) -> Self {
        Self {
            id: Some(id),
            name: Some(zone.name.clone()),
            resource_type: Some(ZONE_RESOURCE_TYPE.to_string()),
            location: zone.location.clone(),
            tags: zone.tags.clone(),
            etag: zone.etag.as_ref().map(|t| t.as_str().to_string()),
            properties: ZoneProperties {
                max_number_of_record_sets: Some(max_number_of_record_sets),
                number_of_record_sets: Some(zone.number_of_record_sets),
                name_servers: zone.name_servers.clone(),
            },
        }
    }

    pub fn into_zone(self, resource_group: &str, requested_name: &str) -> Zone {
        Zone {
            resource_group: resource_group.to_string(),
            name: self.name.unwrap_or_else(|| requested_name.to_string()),
            location: self.location,
            tags: self.tags,
            etag: self.etag.map(ETag::new),
            number_of_record_sets: self.properties.number_of_record_sets.unwrap_or(0),
            name_servers: self.properties.name_servers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ARecordWire {
    pub ipv4_address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AaaaRecordWire {
    pub ipv6_address: Ipv6Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaaRecordWire {
    pub flags: u8,
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnameRecordWire {
    pub cname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MxRecordWire {
    pub preference: u16,
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NsRecordWire {
    pub nsdname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtrRecordWire {
    pub ptrdname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaRecordWire {
    pub host: String,  // primary name server
    pub email: String, // "azuredns-hostmaster.microsoft.com"
    pub serial_number: u32,
    pub refresh_time: u32,
    pub retry_time: u32,
    pub expire_time: u32,
    #[serde(rename = "minimumTTL")]
    pub minimum_ttl: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrvRecordWire {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxtRecordWire {
    pub value: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecordSetProperties {
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>, // "www.contoso.com."
    #[serde(
        rename = "provisioningState",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provisioning_state: Option<String>,
    #[serde(rename = "ARecords", default, skip_serializing_if = "Option::is_none")]
    pub a_records: Option<Vec<ARecordWire>>,
    #[serde(rename = "AAAARecords", default, skip_serializing_if = "Option::is_none")]
    pub aaaa_records: Option<Vec<AaaaRecordWire>>,
    #[serde(rename = "caaRecords", default, skip_serializing_if = "Option::is_none")]
    pub caa_records: Option<Vec<CaaRecordWire>>,
    #[serde(rename = "CNAMERecord", default, skip_serializing_if = "Option::is_none")]
    pub cname_record: Option<CnameRecordWire>,
    #[serde(rename = "MXRecords", default, skip_serializing_if = "Option::is_none")]
    pub mx_records: Option<Vec<MxRecordWire>>,
    #[serde(rename = "NSRecords", default, skip_serializing_if = "Option::is_none")]
    pub ns_records: Option<Vec<NsRecordWire>>,
    #[serde(rename = "PTRRecords", default, skip_serializing_if = "Option::is_none")]
    pub ptr_records: Option<Vec<PtrRecordWire>>,
    #[serde(rename = "SOARecord", default, skip_serializing_if = "Option::is_none")]
    pub soa_record: Option<SoaRecordWire>,
    #[serde(rename = "SRVRecords", default, skip_serializing_if = "Option::is_none")]
    pub srv_records: Option<Vec<SrvRecordWire>>,
    #[serde(rename = "TXTRecords", default, skip_serializing_if = "Option::is_none")]
    pub txt_records: Option<Vec<TxtRecordWire>>,
}

impl RecordSetProperties {
    pub fn from_record_set(record_set: &RecordSet) -> Self {
        let mut props = Self {
            metadata: record_set.metadata.clone(),
            ttl: Some(record_set.ttl),
            fqdn: record_set.fqdn.clone(),
            ..Self::default()
        };
        match &record_set.payload {
            RecordPayload::A(addrs) => {
                props.a_records = Some(
                    addrs
                        .iter()
                        .map(|a| ARecordWire { ipv4_address: *a })
                        .collect(),
                )
            }
            RecordPayload::Aaaa(addrs) => {
                props.aaaa_records = Some(
                    addrs
                        .iter()
                        .map(|a| AaaaRecordWire { ipv6_address: *a })
                        .collect(),
                )
            }
            RecordPayload::Caa(records) => {
                props.caa_records = Some(
                    records
                        .iter()
                        .map(|caa| CaaRecordWire {
                            flags: caa.flags,
                            tag: caa.tag.clone(),
                            value: caa.value.clone(),
                        })
                        .collect(),
                )
            }
            RecordPayload::Cname(cname) => {
                props.cname_record = Some(CnameRecordWire {
                    cname: cname.clone(),
                })
            }
            RecordPayload::Mx(records) => {
                props.mx_records = Some(
                    records
                        .iter()
                        .map(|mx| MxRecordWire {
                            preference: mx.priority,
                            exchange: mx.exchange.clone(),
                        })
                        .collect(),
                )
            }
            RecordPayload::Ns(hosts) => {
                props.ns_records = Some(
                    hosts
                        .iter()
                        .map(|h| NsRecordWire { nsdname: h.clone() })
                        .collect(),
                )
            }
            RecordPayload::Ptr(hosts) => {
                props.ptr_records = Some(
                    hosts
                        .iter()
                        .map(|h| PtrRecordWire { ptrdname: h.clone() })
                        .collect(),
                )
            }
            RecordPayload::Soa(soa) => {
                props.soa_record = Some(SoaRecordWire {
                    host: soa.host.clone(),
                    email: soa.email.clone(),
                    serial_number: soa.serial_number,
                    refresh_time: soa.refresh_time,
                    retry_time: soa.retry_time,
                    expire_time: soa.expire_time,
                    minimum_ttl: soa.minimum_ttl,
                })
            }
            RecordPayload::Srv(records) => {
                props.srv_records = Some(
                    records
                        .iter()
                        .map(|srv| SrvRecordWire {
                            priority: srv.priority,
                            weight: srv.weight,
                            port: srv.port,
                            target: srv.target.clone(),
                        })
                        .collect(),
                )
            }
            RecordPayload::Txt(records) => {
                props.txt_records = Some(
                    records
                        .iter()
                        .map(|txt| TxtRecordWire {
                            value: txt.values.clone(),
                        })
                        .collect(),
                )
            }
        }
        props
    }

    fn present_types(&self) -> Vec<RecordType> {
        [
            (self.a_records.is_some(), RecordType::A),
            (self.aaaa_records.is_some(), RecordType::Aaaa),
            (self.caa_records.is_some(), RecordType::Caa),
            (self.cname_record.is_some(), RecordType::Cname),
            (self.mx_records.is_some(), RecordType::Mx),
            (self.ns_records.is_some(), RecordType::Ns),
            (self.ptr_records.is_some(), RecordType::Ptr),
            (self.soa_record.is_some(), RecordType::Soa),
            (self.srv_records.is_some(), RecordType::Srv),
            (self.txt_records.is_some(), RecordType::Txt),
        ]
        .into_iter()
        .filter_map(|(present, t)| present.then_some(t))
        .collect()
    }

    /// Builds the domain record set, rejecting records of any type other
    /// than `record_type`.
    pub fn into_record_set(
        self,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, ValidationError> {
        if let Some(found) = self.present_types().into_iter().find(|t| *t != record_type) {
            return Err(ValidationError::TypeMismatch {
                expected: record_type,
                found,
            });
        }

        let payload = match record_type {
            RecordType::A => RecordPayload::A(
                self.a_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| r.ipv4_address)
                    .collect(),
            ),
            RecordType::Aaaa => RecordPayload::Aaaa(
                self.aaaa_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| r.ipv6_address)
                    .collect(),
            ),
            RecordType::Caa => RecordPayload::Caa(
                self.caa_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| CaaRecord::new(r.flags, r.tag, r.value))
                    .collect(),
            ),
            RecordType::Cname => RecordPayload::Cname(
                self.cname_record
                    .map(|r| r.cname)
                    .ok_or(ValidationError::CnameCardinality)?,
            ),
            RecordType::Mx => RecordPayload::Mx(
                self.mx_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| MxRecord::new(r.preference, r.exchange))
                    .collect(),
            ),
            RecordType::Ns => RecordPayload::Ns(
                self.ns_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| r.nsdname)
                    .collect(),
            ),
            RecordType::Ptr => RecordPayload::Ptr(
                self.ptr_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| r.ptrdname)
                    .collect(),
            ),
            RecordType::Soa => {
                let soa = self.soa_record.ok_or(ValidationError::SoaCardinality)?;
                RecordPayload::Soa(SoaRecord {
                    host: soa.host,
                    email: soa.email,
                    serial_number: soa.serial_number,
                    refresh_time: soa.refresh_time,
                    retry_time: soa.retry_time,
                    expire_time: soa.expire_time,
                    minimum_ttl: soa.minimum_ttl,
                })
            }
            RecordType::Srv => RecordPayload::Srv(
                self.srv_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| SrvRecord::new(r.priority, r.weight, r.port, r.target))
                    .collect(),
            ),
            RecordType::Txt => RecordPayload::Txt(
                self.txt_records
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| TxtRecord::new(r.value))
                    .collect(),
            ),
        };

        Ok(RecordSet {
            name: name.to_string(),
            ttl: self.ttl.unwrap_or(DEFAULT_TTL),
            metadata: self.metadata,
            etag: None,
            fqdn: self.fqdn,
            payload,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordSetResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>, // "Microsoft.Network/dnszones/A"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub properties: RecordSetProperties,
}

impl RecordSetResource {
    /// Request body for an upsert: properties only.
    pub fn for_upsert(record_set: &RecordSet) -> Self {
        Self {
            id: None,
            name: None,
            resource_type: None,
            etag: None,
            properties: RecordSetProperties::from_record_set(record_set),
        }
    }

    pub fn from_record_set(record_set: &RecordSet, zone_id: &str) -> Self {
        let record_type = record_set.record_type();
        let mut properties = RecordSetProperties::from_record_set(record_set);
        properties.provisioning_state = Some("Succeeded".to_string());
        Self {
            id: Some(format!("{}/{}/{}", zone_id, record_type, record_set.name)),
            name: Some(record_set.name.clone()),
            resource_type: Some(format!("{ZONE_RESOURCE_TYPE}/{record_type}")),
            etag: record_set.etag.as_ref().map(|t| t.as_str().to_string()),
            properties,
        }
    }

    /// Record type taken from the `type` field's last segment.
    pub fn record_type(&self) -> Result<RecordType, ValidationError> {
        let resource_type = self.resource_type.as_deref().unwrap_or_default();
        resource_type
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .parse()
    }

    pub fn into_record_set(self) -> Result<RecordSet, ValidationError> {
        let record_type = self.record_type()?;
        let name = self
            .name
            .ok_or(ValidationError::Empty("record set name"))?;
        let mut record_set = self.properties.into_record_set(&name, record_type)?;
        record_set.etag = self.etag.map(ETag::new);
        Ok(record_set)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordSetListResult {
    #[serde(default)]
    pub value: Vec<RecordSetResource>,
    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// Body of an asynchronous operation status resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationStatus {
    pub status: String, // "InProgress" / "Succeeded" / "Failed" / "Canceled"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_record_set() {
        let json = r#"{
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/dnszones/contoso.com/MX/mx-test",
            "name": "mx-test",
            "type": "Microsoft.Network/dnszones/MX",
            "etag": "a3d5c1e0-1f4b",
            "properties": {
                "metadata": {"user": "Mary"},
                "TTL": 3600,
                "fqdn": "mx-test.contoso.com.",
                "provisioningState": "Succeeded",
                "MXRecords": [{"preference": 10, "exchange": "mail.contoso.com"}]
            }
        }"#;
        let resource: RecordSetResource = serde_json::from_str(json).unwrap();
        let rs = resource.into_record_set().unwrap();
        assert_eq!(rs.record_type(), RecordType::Mx);
        assert_eq!(rs.etag, Some(ETag::new("a3d5c1e0-1f4b")));
        assert_eq!(rs.metadata.get("user").map(String::as_str), Some("Mary"));
        assert_eq!(
            rs.payload,
            RecordPayload::Mx(vec![MxRecord::new(10, "mail.contoso.com")])
        );
    }

    #[test]
    fn test_txt_strings_keep_order_on_the_wire() {
        let first = "this is the first string in the first record in the record set".to_string();
        let second = "this is the second string in the first record in the record set".to_string();
        let rs = RecordSet::new(
            "txt-test",
            3600,
            RecordPayload::Txt(vec![TxtRecord::new([first.clone(), second.clone()])]),
        );

        let json = serde_json::to_value(RecordSetResource::for_upsert(&rs)).unwrap();
        assert_eq!(
            json["properties"]["TXTRecords"][0]["value"],
            serde_json::json!([first, second])
        );

        let back: RecordSetResource = serde_json::from_value(json).unwrap();
        let parsed = back
            .properties
            .into_record_set("txt-test", RecordType::Txt)
            .unwrap();
        assert_eq!(parsed.payload, rs.payload);
    }

    #[test]
    fn test_cname_is_a_single_object() {
        let rs = RecordSet::new("cname-test", 3600, RecordPayload::Cname("www.contoso.com".into()));
        let json = serde_json::to_value(RecordSetResource::for_upsert(&rs)).unwrap();
        assert_eq!(
            json["properties"]["CNAMERecord"],
            serde_json::json!({"cname": "www.contoso.com"})
        );
        assert!(json["properties"].get("ARecords").is_none());
    }

    #[test]
    fn test_foreign_records_rejected() {
        let props: RecordSetProperties = serde_json::from_str(
            r#"{"TTL": 60, "ARecords": [{"ipv4Address": "1.2.3.4"}]}"#,
        )
        .unwrap();
        let err = props.into_record_set("www", RecordType::Aaaa).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                expected: RecordType::Aaaa,
                found: RecordType::A
            }
        );
    }

    #[test]
    fn test_missing_cname_rejected() {
        let props: RecordSetProperties = serde_json::from_str(r#"{"TTL": 60}"#).unwrap();
        assert_eq!(
            props.into_record_set("alias", RecordType::Cname).unwrap_err(),
            ValidationError::CnameCardinality
        );
    }

    #[test]
    fn test_listing_with_apex_soa_parses_every_item() {
        let json = r#"{
            "value": [
                {
                    "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/dnszones/contoso.com/SOA/@",
                    "name": "@",
                    "type": "Microsoft.Network/dnszones/SOA",
                    "etag": "soa-etag",
                    "properties": {
                        "TTL": 3600,
                        "fqdn": "contoso.com.",
                        "SOARecord": {
                            "host": "ns1-01.azure-dns.com.",
                            "email": "azuredns-hostmaster.microsoft.com",
                            "serialNumber": 1,
                            "refreshTime": 3600,
                            "retryTime": 300,
                            "expireTime": 2419200,
                            "minimumTTL": 300
                        }
                    }
                },
                {
                    "name": "@",
                    "type": "Microsoft.Network/dnszones/CAA",
                    "properties": {
                        "TTL": 3600,
                        "caaRecords": [{"flags": 0, "tag": "issue", "value": "letsencrypt.org"}]
                    }
                },
                {
                    "name": "www",
                    "type": "Microsoft.Network/dnszones/A",
                    "properties": {"TTL": 3600, "ARecords": [{"ipv4Address": "1.2.3.4"}]}
                }
            ]
        }"#;
        let list: RecordSetListResult = serde_json::from_str(json).unwrap();
        let sets = list
            .value
            .into_iter()
            .map(RecordSetResource::into_record_set)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(sets.len(), 3);
        assert_eq!(
            sets[0].payload,
            RecordPayload::Soa(SoaRecord::new(
                "ns1-01.azure-dns.com.",
                "azuredns-hostmaster.microsoft.com"
            ))
        );
        assert_eq!(
            sets[1].payload,
            RecordPayload::Caa(vec![CaaRecord::new(0, "issue", "letsencrypt.org")])
        );
        assert_eq!(sets[2].record_type(), RecordType::A);
    }

    #[test]
    fn test_soa_field_names_on_the_wire() {
        let rs = RecordSet::new(
            "@",
            3600,
            RecordPayload::Soa(SoaRecord::new("ns1.example.net.", "hostmaster.example.net")),
        );
        let json = serde_json::to_value(RecordSetResource::for_upsert(&rs)).unwrap();
        let soa = &json["properties"]["SOARecord"];
        assert_eq!(soa["serialNumber"], 1);
        assert_eq!(soa["minimumTTL"], 300);
        assert_eq!(soa["expireTime"], 2_419_200);
    }

    #[test]
    fn test_zone_resource_round_trip() {
        let mut zone = Zone::new("rg", "contoso.com");
        zone.tags.insert("dept".into(), "finance".into());
        zone.etag = Some(ETag::new("0001"));
        let resource = ZoneResource::from_zone(&zone, "/zones/contoso.com".into(), 10_000);
        let json = serde_json::to_string(&resource).unwrap();
        assert!(json.contains("\"location\":\"global\""));

        let parsed: ZoneResource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.into_zone("rg", "contoso.com"), zone);
    }
}
