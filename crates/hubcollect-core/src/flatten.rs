use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::finding::Finding;

/// One flattened, fixed-column record ready for serialization. A finding
/// with N resources produces N records, identical except for the
/// resource-derived columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingRecord {
    pub team: String,
    pub resource_type: String,
    pub title: String,
    pub description: String,
    pub severity_label: String,
    pub remediation_text: String,
    pub remediation_url: String,
    pub resource_id: String,
    pub account_id: String,
    pub compliance_status: String,
    pub record_state: String,
    pub workflow_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub region: String,
    pub environment: String,
    pub product: String,
    pub date_collected: String,
}

type FieldExtractor = fn(&FindingRecord) -> &str;

// Column order is defined by this table, not by field declaration order.
const FIELDS: [(&str, FieldExtractor); 18] = [
    ("Team", |r| &r.team),
    ("Resource Type", |r| &r.resource_type),
    ("Title", |r| &r.title),
    ("Description", |r| &r.description),
    ("Severity Label", |r| &r.severity_label),
    ("Remediation Text", |r| &r.remediation_text),
    ("Remediation URL", |r| &r.remediation_url),
    ("Resource ID", |r| &r.resource_id),
    ("AWS Account ID", |r| &r.account_id),
    ("Compliance Status", |r| &r.compliance_status),
    ("Record State", |r| &r.record_state),
    ("Workflow Status", |r| &r.workflow_status),
    ("Created At", |r| &r.created_at),
    ("Updated At", |r| &r.updated_at),
    ("Region", |r| &r.region),
    ("Environment", |r| &r.environment),
    ("Product", |r| &r.product),
    ("Date Collected", |r| &r.date_collected),
];

impl FindingRecord {
    /// Header row, in column order.
    pub fn headers() -> [&'static str; 18] {
        FIELDS.map(|(name, _)| name)
    }

    /// The record as a sanitized row, in column order.
    pub fn to_row(&self) -> [String; 18] {
        FIELDS.map(|(_, extract)| sanitize_field(extract(self)))
    }
}

/// Expands one finding into one record per referenced resource. A finding
/// without resources yields nothing.
pub fn flatten<C: Clock>(
    finding: &Finding,
    team: &str,
    environment: &str,
    clock: &C,
) -> Vec<FindingRecord> {
    if finding.resources.is_empty() {
        debug!(
            account_id = %finding.aws_account_id,
            title = %finding.title,
            "finding references no resources, emitting no rows"
        );
        return Vec::new();
    }

    let date_collected = clock.now().format("%m-%d-%Y").to_string();
    let mut records = Vec::with_capacity(finding.resources.len());

    for resource in &finding.resources {
        let region = resource
            .region
            .clone()
            .or_else(|| finding.region.clone())
            .unwrap_or_default();

        records.push(FindingRecord {
            team: team.to_string(),
            resource_type: resource.resource_type.clone(),
            title: finding.title.clone(),
            description: finding.description.clone(),
            severity_label: finding
                .severity
                .as_ref()
                .map(|s| s.label.clone())
                .unwrap_or_default(),
            remediation_text: finding
                .remediation
                .as_ref()
                .and_then(|r| r.recommendation.as_ref())
                .and_then(|r| r.text.clone())
                .unwrap_or_default(),
            remediation_url: finding
                .remediation
                .as_ref()
                .and_then(|r| r.recommendation.as_ref())
                .and_then(|r| r.url.clone())
                .unwrap_or_default(),
            resource_id: resource.id.clone(),
            account_id: finding.aws_account_id.clone(),
            compliance_status: finding
                .compliance
                .as_ref()
                .map(|c| c.status.clone())
                .unwrap_or_default(),
            record_state: finding.record_state.clone(),
            workflow_status: finding
                .workflow
                .as_ref()
                .map(|w| w.status.clone())
                .unwrap_or_default(),
            created_at: normalize_timestamp(&finding.created_at),
            updated_at: normalize_timestamp(&finding.updated_at),
            region,
            environment: environment.to_string(),
            product: finding.product_name.clone(),
            date_collected: date_collected.clone(),
        });
    }

    records
}

/// Replaces every character outside printable ASCII with a single space,
/// then trims. Downstream ingestion rejects rows carrying control characters
/// or multi-byte sequences.
pub fn sanitize_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        if (' '..='~').contains(&ch) {
            out.push(ch);
        } else {
            out.push(' ');
        }
    }
    out.trim().to_string()
}

/// Reformats a source timestamp to UTC with millisecond precision. The
/// service emits ISO-8601 with fractional seconds and zone offset each
/// optionally present; anything unparseable passes through unchanged.
pub fn normalize_timestamp(raw: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        });

    match parsed {
        Ok(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        Err(_) => {
            warn!(timestamp = %raw, "could not normalize timestamp, passing it through");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Compliance, Recommendation, Remediation, Resource, Severity, Workflow};
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn frozen_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
    }

    fn resource(id: &str) -> Resource {
        Resource {
            resource_type: "AwsEc2Vpc".to_string(),
            id: id.to_string(),
            region: Some("us-east-1".to_string()),
        }
    }

    fn active_finding() -> Finding {
        Finding {
            aws_account_id: "000000000001".to_string(),
            title: "Active Test Finding Title".to_string(),
            description: "Active Test Finding".to_string(),
            record_state: "ACTIVE".to_string(),
            created_at: "2020-03-22T13:22:13.933Z".to_string(),
            updated_at: "2020-03-22T13:22:13.933Z".to_string(),
            product_name: "Security Hub".to_string(),
            region: None,
            severity: Some(Severity {
                label: "HIGH".to_string(),
            }),
            remediation: Some(Remediation {
                recommendation: Some(Recommendation {
                    text: Some("Do the thing".to_string()),
                    url: Some("https://example.com/dothething".to_string()),
                }),
            }),
            compliance: Some(Compliance {
                status: "FAILED".to_string(),
            }),
            workflow: Some(Workflow {
                status: "NEW".to_string(),
            }),
            resources: vec![resource("arn:aws:ec2:us-east-1:000000000001:vpc/vpc-01")],
        }
    }

    #[test]
    fn test_single_resource_produces_one_row() {
        let records = flatten(&active_finding(), "Test Team 1", "dev", &frozen_clock());
        assert_eq!(records.len(), 1);

        let expected = [
            "Test Team 1",
            "AwsEc2Vpc",
            "Active Test Finding Title",
            "Active Test Finding",
            "HIGH",
            "Do the thing",
            "https://example.com/dothething",
            "arn:aws:ec2:us-east-1:000000000001:vpc/vpc-01",
            "000000000001",
            "FAILED",
            "ACTIVE",
            "NEW",
            "2020-03-22T13:22:13.933Z",
            "2020-03-22T13:22:13.933Z",
            "us-east-1",
            "dev",
            "Security Hub",
            "01-01-2023",
        ];
        assert_eq!(records[0].to_row(), expected);
    }

    #[test]
    fn test_n_resources_produce_n_rows_differing_only_in_resource_columns() {
        let mut finding = active_finding();
        finding.resources = vec![
            resource("arn:aws:ec2:us-east-1:000000000001:vpc/vpc-02"),
            resource("arn:aws:ec2:us-east-1:000000000001:vpc/vpc-03"),
        ];

        let records = flatten(&finding, "Test Team 1", "impl", &frozen_clock());
        assert_eq!(records.len(), 2);

        let first = records[0].to_row();
        let second = records[1].to_row();
        for (idx, (name, _)) in FIELDS.iter().enumerate() {
            if *name == "Resource ID" {
                assert_ne!(first[idx], second[idx]);
            } else {
                assert_eq!(first[idx], second[idx], "column {name} should match");
            }
        }
    }

    #[test]
    fn test_two_resources_without_compliance_block() {
        let mut finding = active_finding();
        finding.compliance = None;
        finding.resources = vec![
            Resource {
                resource_type: "AwsEc2Vpc".to_string(),
                id: "vpc-01".to_string(),
                region: Some("us-east-1".to_string()),
            },
            Resource {
                resource_type: "AwsEc2SecurityGroup".to_string(),
                id: "sg-01".to_string(),
                region: Some("us-east-1".to_string()),
            },
        ];

        let records = flatten(&finding, "T1", "dev", &frozen_clock());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].compliance_status, "");
        assert_eq!(records[1].compliance_status, "");

        let first = records[0].to_row();
        let second = records[1].to_row();
        for (idx, (name, _)) in FIELDS.iter().enumerate() {
            if *name == "Resource ID" || *name == "Resource Type" {
                assert_ne!(first[idx], second[idx]);
            } else {
                assert_eq!(first[idx], second[idx], "column {name} should match");
            }
        }
    }

    #[test]
    fn test_zero_resources_produce_zero_rows() {
        let mut finding = active_finding();
        finding.resources.clear();
        let records = flatten(&finding, "Test Team 1", "dev", &frozen_clock());
        assert!(records.is_empty());
    }

    #[test]
    fn test_region_precedence_resource_wins() {
        let mut finding = active_finding();
        finding.region = Some("eu-west-1".to_string());
        finding.resources[0].region = Some("us-west-2".to_string());
        let records = flatten(&finding, "T", "dev", &frozen_clock());
        assert_eq!(records[0].region, "us-west-2");
    }

    #[test]
    fn test_region_precedence_falls_back_to_finding() {
        let mut finding = active_finding();
        finding.region = Some("eu-west-1".to_string());
        finding.resources[0].region = None;
        let records = flatten(&finding, "T", "dev", &frozen_clock());
        assert_eq!(records[0].region, "eu-west-1");
    }

    #[test]
    fn test_region_precedence_empty_when_both_absent() {
        let mut finding = active_finding();
        finding.region = None;
        finding.resources[0].region = None;
        let records = flatten(&finding, "T", "dev", &frozen_clock());
        assert_eq!(records[0].region, "");
    }

    #[test]
    fn test_absent_optional_blocks_render_empty() {
        let mut finding = active_finding();
        finding.severity = None;
        finding.remediation = None;
        finding.compliance = None;
        finding.workflow = None;

        let records = flatten(&finding, "T", "dev", &frozen_clock());
        assert_eq!(records[0].severity_label, "");
        assert_eq!(records[0].remediation_text, "");
        assert_eq!(records[0].remediation_url, "");
        assert_eq!(records[0].compliance_status, "");
        assert_eq!(records[0].workflow_status, "");
    }

    #[test]
    fn test_suppressed_workflow_status_is_still_emitted() {
        // Workflow filtering happens server-side at fetch time; the
        // flattener reports whatever status it was handed.
        let mut finding = active_finding();
        finding.workflow = Some(Workflow {
            status: "SUPPRESSED".to_string(),
        });
        let records = flatten(&finding, "T", "dev", &frozen_clock());
        assert_eq!(records[0].workflow_status, "SUPPRESSED");
    }

    #[test]
    fn test_headers_match_column_table() {
        let headers = FindingRecord::headers();
        assert_eq!(headers.len(), 18);
        assert_eq!(headers[0], "Team");
        assert_eq!(headers[8], "AWS Account ID");
        assert_eq!(headers[17], "Date Collected");
    }

    #[test]
    fn test_sanitize_replaces_control_characters() {
        assert_eq!(sanitize_field("bad\tvalue"), "bad value");
        assert_eq!(sanitize_field("line\nbreak"), "line break");
        assert_eq!(sanitize_field("  padded  "), "padded");
    }

    #[test]
    fn test_sanitize_replaces_non_ascii() {
        assert_eq!(sanitize_field("café"), "caf");
        assert_eq!(sanitize_field("naïve value"), "na ve value");
    }

    #[test]
    fn test_sanitize_output_is_printable_ascii_only() {
        let sanitized = sanitize_field("\u{1}mixed\u{7f} content\u{2028}");
        assert!(sanitized.chars().all(|c| (' '..='~').contains(&c)));
        assert_eq!(sanitized, sanitized.trim());
    }

    #[test]
    fn test_normalize_timestamp_canonical_input() {
        assert_eq!(
            normalize_timestamp("2020-03-22T13:22:13.933Z"),
            "2020-03-22T13:22:13.933Z"
        );
    }

    #[test]
    fn test_normalize_timestamp_with_offset_and_microseconds() {
        assert_eq!(
            normalize_timestamp("2020-03-22T13:22:13.933933+05:00"),
            "2020-03-22T08:22:13.933Z"
        );
    }

    #[test]
    fn test_normalize_timestamp_without_offset() {
        assert_eq!(
            normalize_timestamp("2020-03-22T13:22:13"),
            "2020-03-22T13:22:13.000Z"
        );
    }

    #[test]
    fn test_normalize_timestamp_passes_garbage_through() {
        assert_eq!(normalize_timestamp("not-a-timestamp"), "not-a-timestamp");
    }

    #[test]
    fn test_normalize_timestamp_is_idempotent() {
        let once = normalize_timestamp("2020-03-22T13:22:13.933933+05:00");
        assert_eq!(normalize_timestamp(&once), once);
    }
}
