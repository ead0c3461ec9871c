use serde::{Deserialize, Serialize};

/// One issue reported by the findings service for an account, as it appears
/// on the wire. Only the fields the report needs are modeled; the service
/// sends many more, which deserialization ignores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Finding {
    pub aws_account_id: String,
    pub title: String,
    pub description: String,
    pub record_state: String,
    pub created_at: String,
    pub updated_at: String,
    pub product_name: String,
    pub region: Option<String>,
    pub severity: Option<Severity>,
    pub remediation: Option<Remediation>,
    pub compliance: Option<Compliance>,
    pub workflow: Option<Workflow>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A resource the finding points at. Its region, when present, overrides the
/// finding-level region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub id: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Severity {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Remediation {
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recommendation {
    pub text: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Compliance {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Workflow {
    pub status: String,
}
