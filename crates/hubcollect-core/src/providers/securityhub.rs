use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::{CollectorError, Result};
use crate::finding::Finding;
use crate::teams::Account;

/// Page-size hint sent with every findings request.
pub const PAGE_SIZE: u32 = 100;

/// One page of findings plus the cursor for the next one, if any.
#[derive(Debug, Clone, Default)]
pub struct FindingsPage {
    pub findings: Vec<Finding>,
    pub next_cursor: Option<String>,
}

/// Narrow interface over the findings service so the run loop can be driven
/// by fakes in tests. Callers loop until `next_cursor` comes back empty;
/// cursor semantics are opaque.
#[allow(async_fn_in_trait)]
pub trait FindingsSource {
    async fn fetch_page(
        &self,
        region: &str,
        account: &Account,
        cursor: Option<&str>,
    ) -> Result<FindingsPage>;
}

/// HTTP client for the findings service.
pub struct SecurityHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl SecurityHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CollectorError::Configuration(
                    "findings API token contains characters not allowed in a header".to_string(),
                )
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        // The request timeout doubles as the per-page bound so one hung
        // account cannot stall the whole run.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CollectorError::Configuration(format!("could not build findings HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl FindingsSource for SecurityHubClient {
    async fn fetch_page(
        &self,
        region: &str,
        account: &Account,
        cursor: Option<&str>,
    ) -> Result<FindingsPage> {
        let request = GetFindingsRequest {
            filters: active_unresolved_filters(),
            max_results: PAGE_SIZE,
            next_token: cursor,
            region,
            assume_role: account.role_arn.as_deref(),
        };

        let url = format!("{}/findings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| fetch_error(account, region, e))?
            .error_for_status()
            .map_err(|e| fetch_error(account, region, e))?;

        let body: GetFindingsResponse = response
            .json()
            .await
            .map_err(|e| fetch_error(account, region, e))?;

        Ok(FindingsPage {
            findings: body.findings,
            next_cursor: body.next_token,
        })
    }
}

fn fetch_error(account: &Account, region: &str, reason: impl std::fmt::Display) -> CollectorError {
    CollectorError::Fetch {
        account_id: account.id.clone(),
        region: region.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetFindingsRequest<'a> {
    filters: FindingFilters,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assume_role: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FindingFilters {
    record_state: Vec<StringFilter>,
    workflow_status: Vec<StringFilter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StringFilter {
    comparison: &'static str,
    value: &'static str,
}

// The report only ever wants currently-relevant findings, so this filter is
// fixed policy rather than configuration.
fn active_unresolved_filters() -> FindingFilters {
    FindingFilters {
        record_state: vec![StringFilter {
            comparison: "EQUALS",
            value: "ACTIVE",
        }],
        workflow_status: vec![StringFilter {
            comparison: "NOT_EQUALS",
            value: "RESOLVED",
        }],
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetFindingsResponse {
    #[serde(default)]
    findings: Vec<Finding>,
    next_token: Option<String>,
}
