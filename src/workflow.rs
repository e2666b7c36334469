//! The zone workflow: an ordered list of independent steps, each reported
//! on its own. A failing step never stops the ones after it.
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::{info, warn};

use crate::api::{Precondition, ZoneApi};
use crate::config::WorkflowConfig;
use crate::error::DnsError;
use crate::model::{
    MxRecord, RecordPayload, RecordSet, RecordType, SrvRecord, Tags, TxtRecord, Zone,
};
use crate::pager::RecordSetPager;

/// TTL used by every record set of the standard workflow.
pub const STANDARD_TTL: u32 = 3600;

#[derive(Debug, Clone)]
pub enum Step {
    CreateZone { tags: Tags },
    /// Create or overwrite without a concurrency check.
    UpsertRecordSet(RecordSet),
    /// Read the set, add the records it lacks, write back under the read token.
    AppendRecords { name: String, records: RecordPayload },
    DeleteRecordSet { name: String, record_type: RecordType },
    CountRecordSets { record_type: Option<RecordType> },
    DeleteZone,
}

impl Step {
    /// Operator-facing description, e.g. `Creating DNS 'A' record set with name 'www'`.
    pub fn label(&self, zone_name: &str) -> String {
        match self {
            Step::CreateZone { .. } => format!("Creating DNS zone '{zone_name}'"),
            Step::UpsertRecordSet(rs) => format!(
                "Creating DNS '{}' record set with name '{}'",
                rs.record_type(),
                rs.name
            ),
            Step::AppendRecords { name, records } => format!(
                "Updating DNS '{}' record set with name '{name}'",
                records.record_type()
            ),
            Step::DeleteRecordSet { name, record_type } => {
                format!("Deleting DNS '{record_type}' record set with name '{name}'")
            }
            Step::CountRecordSets { record_type: None } => "Counting record sets".to_string(),
            Step::CountRecordSets {
                record_type: Some(t),
            } => format!("Counting {t} record sets"),
            Step::DeleteZone => format!("Deleting DNS zone '{zone_name}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Zone(Zone),
    RecordSet(RecordSet),
    Deleted,
    Counted {
        record_type: Option<RecordType>,
        total: usize,
    },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Counted {
                record_type: None,
                total,
            } => write!(f, "success, {total} record sets found"),
            StepOutcome::Counted {
                record_type: Some(t),
                total,
            } => write!(f, "success, {total} {t} record sets found"),
            _ => f.write_str("success"),
        }
    }
}

#[derive(Debug)]
pub struct StepReport {
    pub label: String,
    pub result: Result<StepOutcome, DnsError>,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(outcome) => write!(f, "{}...{outcome}", self.label),
            Err(err) => write!(f, "{}...failed: {err}", self.label),
        }
    }
}

pub struct Workflow {
    config: WorkflowConfig,
    steps: Vec<Step>,
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Zone creation, one record set of every supported type, an optimistic
    /// update, a delete, two paged counts and finally zone deletion.
    pub fn standard(config: WorkflowConfig) -> Self {
        let tags = config.zone_tags.clone();
        let record_set = |name: &str, payload| RecordSet::new(name, STANDARD_TTL, payload);

        Self::new(config)
            .step(Step::CreateZone { tags })
            .step(Step::UpsertRecordSet(
                record_set("www", RecordPayload::A(vec![Ipv4Addr::new(1, 2, 3, 4)]))
                    .with_metadata("user", "Mary"),
            ))
            .step(Step::AppendRecords {
                name: "www".into(),
                records: RecordPayload::A(vec![Ipv4Addr::new(5, 6, 7, 8)]),
            })
            .step(Step::DeleteRecordSet {
                name: "www".into(),
                record_type: RecordType::A,
            })
            .step(Step::UpsertRecordSet(record_set(
                "aaaa-test",
                RecordPayload::Aaaa(vec![Ipv6Addr::new(0xaaaa, 0x4444, 0x33, 0x2, 0, 0, 0, 0x11)]),
            )))
            .step(Step::UpsertRecordSet(record_set(
                "cname-test",
                RecordPayload::Cname("www.contoso.com".into()),
            )))
            .step(Step::UpsertRecordSet(record_set(
                "mx-test",
                RecordPayload::Mx(vec![MxRecord::new(10, "mail.contoso.com")]),
            )))
            .step(Step::UpsertRecordSet(record_set(
                "ns-test",
                RecordPayload::Ns(vec!["ns1.contoso.com".into()]),
            )))
            .step(Step::UpsertRecordSet(record_set(
                "ptr-test",
                RecordPayload::Ptr(vec!["ptr.contoso.com".into()]),
            )))
            // service and protocol are part of the name
            .step(Step::UpsertRecordSet(record_set(
                "_sip._tcp",
                RecordPayload::Srv(vec![SrvRecord::new(1, 10, 80, "srv.contoso.com")]),
            )))
            .step(Step::UpsertRecordSet(record_set(
                "txt-test",
                RecordPayload::Txt(vec![TxtRecord::new([
                    "this is the first string in the first record in the record set",
                    "this is the second string in the first record in the record set",
                ])]),
            )))
            .step(Step::CountRecordSets { record_type: None })
            .step(Step::CountRecordSets {
                record_type: Some(RecordType::Ns),
            })
            .step(Step::DeleteZone)
    }

    pub async fn run(&self, api: &dyn ZoneApi) -> Vec<StepReport> {
        self.run_with(api, |_| {}).await
    }

    /// Runs every step in order, handing each report to `on_step` as soon
    /// as the step finishes.
    pub async fn run_with<F>(&self, api: &dyn ZoneApi, mut on_step: F) -> Vec<StepReport>
    where
        F: FnMut(&StepReport),
    {
        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let label = step.label(&self.config.zone_name);
            let result =
                match tokio::time::timeout(self.config.step_timeout, self.execute(api, step)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(DnsError::Transient(format!(
                        "operation timed out after {:?}",
                        self.config.step_timeout
                    ))),
                };

            match &result {
                Ok(outcome) => info!(step = %label, %outcome, "step finished"),
                Err(err) => warn!(step = %label, error = %err, "step failed"),
            }
            let report = StepReport { label, result };
            on_step(&report);
            reports.push(report);
        }
        reports
    }

    async fn execute(&self, api: &dyn ZoneApi, step: &Step) -> Result<StepOutcome, DnsError> {
        let rg = self.config.resource_group.as_str();
        let zone = self.config.zone_name.as_str();

        match step {
            Step::CreateZone { tags } => api.create_zone(rg, zone, tags).await.map(StepOutcome::Zone),
            Step::UpsertRecordSet(record_set) => api
                .upsert_record_set(rg, zone, record_set, &Precondition::None)
                .await
                .map(StepOutcome::RecordSet),
            Step::AppendRecords { name, records } => {
                let mut current = api
                    .get_record_set(rg, zone, name, records.record_type())
                    .await?;
                let token = current.etag.clone().ok_or_else(|| {
                    DnsError::unknown(format!(
                        "record set '{name}' was returned without a concurrency token"
                    ))
                })?;
                current.payload.append_distinct(records.clone())?;
                api.upsert_record_set(rg, zone, &current, &Precondition::IfMatch(token))
                    .await
                    .map(StepOutcome::RecordSet)
            }
            Step::DeleteRecordSet { name, record_type } => api
                .delete_record_set(rg, zone, name, *record_type)
                .await
                .map(|_| StepOutcome::Deleted),
            Step::CountRecordSets { record_type } => {
                let mut pager =
                    RecordSetPager::new(api, rg, zone, Some(self.config.page_size), *record_type);
                let total = pager.count().await?;
                Ok(StepOutcome::Counted {
                    record_type: *record_type,
                    total,
                })
            }
            Step::DeleteZone => api
                .delete_zone(rg, zone)
                .await
                .map(|_| StepOutcome::Deleted),
        }
    }
}
