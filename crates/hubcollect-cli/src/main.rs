use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hubcollect_core::{
    collector, teams, MappingSource, ObjectStoreClient, RunConfig, SecurityHubClient, SystemClock,
    UploadTarget,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "hubcollect",
    version,
    about = "Collects security findings across accounts into a tab-delimited report"
)]
struct Cli {
    /// Regions to collect findings from
    #[arg(
        short = 'r',
        long = "region",
        value_delimiter = ',',
        default_values_t = [String::from("us-east-1"), String::from("us-west-2")]
    )]
    regions: Vec<String>,

    /// File to direct output to
    #[arg(short, long, default_value = "securityhub-findings.tsv")]
    output: PathBuf,

    /// Findings service endpoint
    #[arg(long, env = "FINDINGS_API_URL")]
    findings_url: String,

    /// Bearer token for the findings service
    #[arg(long, env = "FINDINGS_API_TOKEN", hide_env_values = true)]
    findings_token: Option<String>,

    /// JSON file containing team-to-account mappings
    #[arg(short = 'm', long)]
    team_map: Option<PathBuf>,

    /// Team registry API base URL, the alternative to --team-map
    #[arg(long, env = "TEAM_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Team registry API key
    #[arg(long, env = "TEAM_REGISTRY_API_KEY", hide_env_values = true)]
    registry_api_key: Option<String>,

    /// Role path combined with each registry account ID to form its role ARN
    #[arg(long)]
    registry_role_path: Option<String>,

    /// Object storage bucket to upload results to; no upload when absent
    #[arg(short = 'b', long)]
    bucket: Option<String>,

    /// Object key for the upload, defaults to the output file name
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Object storage endpoint
    #[arg(long, env = "OBJECT_STORE_URL")]
    store_url: Option<String>,

    /// Bearer token for the object store
    #[arg(long, env = "OBJECT_STORE_TOKEN", hide_env_values = true)]
    store_token: Option<String>,

    /// Log level filter, e.g. info or hubcollect_core=debug
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .init();

    // Configuration problems surface here, before anything touches the
    // network or the filesystem.
    let mapping_source = MappingSource::from_options(
        cli.team_map,
        cli.registry_url,
        cli.registry_api_key,
        cli.registry_role_path,
    )?;

    let upload_plan = match (cli.bucket, cli.store_url) {
        (Some(bucket), Some(store_url)) => Some((
            UploadTarget {
                bucket,
                key: cli.key,
            },
            store_url,
        )),
        (Some(_), None) => anyhow::bail!("--store-url is required when --bucket is set"),
        (None, _) => None,
    };

    let team_map = teams::resolve(&mapping_source).await?;
    info!(accounts = team_map.len(), "resolved team mapping");

    let hub = SecurityHubClient::new(cli.findings_url, cli.findings_token.as_deref())?;
    let config = RunConfig {
        regions: cli.regions,
        output_path: cli.output,
    };
    let clock = SystemClock;

    let summary = collector::collect(&config, &team_map, &hub, &clock).await?;
    info!(
        accounts = summary.accounts,
        findings = summary.findings,
        rows = summary.rows,
        output = %config.output_path.display(),
        "collection complete"
    );

    if let Some((target, store_url)) = upload_plan {
        let store = ObjectStoreClient::new(store_url, cli.store_token.as_deref())?;
        collector::upload(&store, &target, &config.output_path, &clock).await?;
    }

    Ok(())
}
