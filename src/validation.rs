use regex::Regex;

use crate::model::{RecordPayload, RecordSet, RecordType};

/// Largest TTL the service accepts (a signed 32-bit value).
pub const MAX_TTL: u32 = 2_147_483_647;

/// Longest character string a single TXT string may hold.
pub const MAX_TXT_STRING_LEN: usize = 255;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(&'static str),
    #[error("name too long (max 253 characters)")]
    NameTooLong,
    #[error("label '{0}' too long (max 63 characters)")]
    LabelTooLong(String),
    #[error("label '{0}' contains invalid characters")]
    InvalidCharacters(String),
    #[error("label '{0}' must not start or end with '-'")]
    LeadingOrTrailingHyphen(String),
    #[error("unknown record type '{0}'")]
    UnknownRecordType(String),
    #[error("TTL {0} out of range (max 2147483647)")]
    TtlOutOfRange(u32),
    #[error("TXT string of {0} characters exceeds the 255 character limit")]
    TxtStringTooLong(usize),
    #[error("TXT record must contain at least one string")]
    EmptyTxtRecord,
    #[error("record set contains duplicate records")]
    DuplicateRecords,
    #[error("{found} records cannot be stored in a {expected} record set")]
    TypeMismatch {
        expected: RecordType,
        found: RecordType,
    },
    #[error("a CNAME record set holds exactly one record")]
    CnameCardinality,
    #[error("an SOA record set holds exactly one record")]
    SoaCardinality,
    #[error("SOA records are only allowed at the zone apex '@'")]
    SoaOutsideApex,
}

lazy_static::lazy_static! {
    /// Host labels: letters, digits and '-'
    static ref HOST_LABEL_RE: Regex = Regex::new(r"^[A-Za-z0-9-]+$").unwrap();
    /// Record set labels may also carry '_' (service labels) or be a lone '*'
    static ref RECORD_LABEL_RE: Regex = Regex::new(r"^(\*|[A-Za-z0-9_-]+)$").unwrap();
}

fn check_name(name: &str, what: &'static str, label_re: &Regex) -> Result<(), ValidationError> {
    let d = name.trim_end_matches('.');
    if d.is_empty() {
        return Err(ValidationError::Empty(what));
    }
    if d.len() > 253 {
        return Err(ValidationError::NameTooLong);
    }
    for label in d.split('.') {
        if label.is_empty() {
            return Err(ValidationError::Empty("label"));
        }
        if label.len() > 63 {
            return Err(ValidationError::LabelTooLong(label.to_string()));
        }
        if !label_re.is_match(label) {
            return Err(ValidationError::InvalidCharacters(label.to_string()));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(ValidationError::LeadingOrTrailingHyphen(label.to_string()));
        }
    }
    Ok(())
}

pub fn validate_zone_name(zone_name: &str) -> Result<(), ValidationError> {
    check_name(zone_name, "zone name", &HOST_LABEL_RE)
}

/// Record set names are relative to the zone; `@` names the apex.
pub fn validate_record_set_name(name: &str) -> Result<(), ValidationError> {
    if name == "@" {
        return Ok(());
    }
    check_name(name, "record set name", &RECORD_LABEL_RE)
}

/// Target hostnames (MX exchange, NS, PTR, SRV target, CNAME).
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    check_name(hostname, "hostname", &RECORD_LABEL_RE)
}

pub fn validate_ttl(ttl: u32) -> Result<(), ValidationError> {
    if ttl > MAX_TTL {
        return Err(ValidationError::TtlOutOfRange(ttl));
    }
    Ok(())
}

pub fn validate_payload(payload: &RecordPayload) -> Result<(), ValidationError> {
    match payload {
        RecordPayload::A(_) | RecordPayload::Aaaa(_) => {}
        RecordPayload::Caa(records) => {
            if records.iter().any(|caa| caa.tag.is_empty()) {
                return Err(ValidationError::Empty("CAA tag"));
            }
        }
        RecordPayload::Soa(soa) => {
            validate_hostname(&soa.host)?;
            validate_hostname(&soa.email)?;
        }
        RecordPayload::Cname(target) => validate_hostname(target)?,
        RecordPayload::Mx(records) => {
            for mx in records {
                validate_hostname(&mx.exchange)?;
            }
        }
        RecordPayload::Ns(hosts) | RecordPayload::Ptr(hosts) => {
            for host in hosts {
                validate_hostname(host)?;
            }
        }
        RecordPayload::Srv(records) => {
            for srv in records {
                validate_hostname(&srv.target)?;
            }
        }
        RecordPayload::Txt(records) => {
            for txt in records {
                if txt.values.is_empty() {
                    return Err(ValidationError::EmptyTxtRecord);
                }
                if let Some(len) = txt
                    .values
                    .iter()
                    .map(|s| s.chars().count())
                    .find(|len| *len > MAX_TXT_STRING_LEN)
                {
                    return Err(ValidationError::TxtStringTooLong(len));
                }
            }
        }
    }
    if payload.has_duplicates() {
        return Err(ValidationError::DuplicateRecords);
    }
    Ok(())
}

pub fn validate_record_set(record_set: &RecordSet) -> Result<(), ValidationError> {
    validate_record_set_name(&record_set.name)?;
    if record_set.record_type() == RecordType::Soa && record_set.name != "@" {
        return Err(ValidationError::SoaOutsideApex);
    }
    validate_ttl(record_set.ttl)?;
    validate_payload(&record_set.payload)
}
