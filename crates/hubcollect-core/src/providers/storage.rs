use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{CollectorError, Result};

/// Narrow interface for the single PUT-style upload at the end of a run.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;
}

/// HTTP client for the object store.
pub struct ObjectStoreClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ObjectStoreClient {
    pub fn new(endpoint: impl Into<String>, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CollectorError::Configuration(
                    "object store token contains characters not allowed in a header".to_string(),
                )
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                CollectorError::Configuration(format!(
                    "could not build object store HTTP client: {e}"
                ))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

impl ObjectStore for ObjectStoreClient {
    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = fs::read(path).map_err(|e| {
            CollectorError::Upload(format!("could not read {} for upload: {e}", path.display()))
        })?;

        let url = format!("{}/{}/{}", self.endpoint, bucket, key);
        self.client
            .put(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| CollectorError::Upload(e.to_string()))?
            .error_for_status()
            .map_err(|e| CollectorError::Upload(e.to_string()))?;

        Ok(())
    }
}

/// Inserts a run timestamp into an object key ahead of its extension, so
/// repeated uploads never clobber each other.
pub fn timestamped_key(key: &str, now: DateTime<Utc>) -> String {
    let suffix = now.format("%Y-%m-%d_%H.%M.%S").to_string();
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let stem = &key[..key.len() - ext.len() - 1];
            format!("{stem}_{suffix}.{ext}")
        }
        None => format!("{key}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_timestamped_key_preserves_extension() {
        assert_eq!(
            timestamped_key("findings.tsv", fixed_now()),
            "findings_2023-01-01_12.30.45.tsv"
        );
    }

    #[test]
    fn test_timestamped_key_without_extension() {
        assert_eq!(
            timestamped_key("findings", fixed_now()),
            "findings_2023-01-01_12.30.45"
        );
    }

    #[test]
    fn test_timestamped_key_with_nested_key() {
        assert_eq!(
            timestamped_key("reports/2023/findings.tsv", fixed_now()),
            "reports/2023/findings_2023-01-01_12.30.45.tsv"
        );
    }
}
