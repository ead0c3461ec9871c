use std::path::{Path, PathBuf};

use tracing::info;

use crate::clock::Clock;
use crate::error::{CollectorError, Result};
use crate::flatten::flatten;
use crate::providers::securityhub::FindingsSource;
use crate::providers::storage::{timestamped_key, ObjectStore};
use crate::teams::TeamMap;
use crate::writer::OutputWriter;

/// Per-run settings handed to the orchestrator. An explicit value, never
/// global state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub regions: Vec<String>,
    pub output_path: PathBuf,
}

/// Where the finished file goes when upload is configured.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    /// Object key; defaults to the output file name when absent.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts: usize,
    pub findings: usize,
    pub rows: usize,
}

/// Drives the whole collection: one account/region pair at a time, strictly
/// sequential, fail-fast on the first error. Accounts iterate in sorted ID
/// order so repeated runs produce rows in a stable order.
pub async fn collect<S, C>(
    config: &RunConfig,
    team_map: &TeamMap,
    source: &S,
    clock: &C,
) -> Result<RunSummary>
where
    S: FindingsSource,
    C: Clock,
{
    if config.regions.is_empty() {
        return Err(CollectorError::Configuration(
            "at least one region is required".to_string(),
        ));
    }

    let mut writer = OutputWriter::create(&config.output_path)?;
    writer.write_header()?;

    let mut summary = RunSummary {
        accounts: team_map.len(),
        ..Default::default()
    };

    for assignment in team_map.iter() {
        for region in &config.regions {
            info!(
                account_id = %assignment.account.id,
                region = %region,
                team = %assignment.team,
                "collecting findings"
            );

            let mut cursor: Option<String> = None;
            loop {
                let page = source
                    .fetch_page(region, &assignment.account, cursor.as_deref())
                    .await?;

                for finding in &page.findings {
                    summary.findings += 1;
                    for record in flatten(
                        finding,
                        &assignment.team,
                        &assignment.account.environment,
                        clock,
                    ) {
                        writer.write_record(&record)?;
                        summary.rows += 1;
                    }
                }

                cursor = page.next_cursor;
                if cursor.is_none() {
                    break;
                }
            }

            // Checkpoint so an abort later never leaves a half-flushed file.
            writer.flush()?;
        }
    }

    writer.flush_and_close()?;
    Ok(summary)
}

/// Ships the finished report. Called at most once, only after a fully
/// successful [`collect`]; the local file stays complete and valid even if
/// the upload fails.
pub async fn upload<U, C>(
    store: &U,
    target: &UploadTarget,
    output_path: &Path,
    clock: &C,
) -> Result<String>
where
    U: ObjectStore,
    C: Clock,
{
    let base_key = match &target.key {
        Some(key) => key.clone(),
        None => output_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                CollectorError::Configuration(format!(
                    "output path {} has no file name to use as an upload key",
                    output_path.display()
                ))
            })?,
    };

    let key = timestamped_key(&base_key, clock.now());
    store.put_object(&target.bucket, &key, output_path).await?;
    info!(bucket = %target.bucket, key = %key, "uploaded findings");
    Ok(key)
}
