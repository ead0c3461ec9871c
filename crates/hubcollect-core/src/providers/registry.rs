use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{CollectorError, Result};
use crate::teams::{Account, TeamMap};

/// Accounts that show up in registry team data for billing purposes only.
/// The cross-account audit role is never provisioned in them, so they are
/// excluded no matter which team claims them.
const EXCLUDED_ACCOUNT_IDS: [&str; 3] = ["360433083926", "204488982178", "635526538414"];

/// Team as returned by the registry API, with its nested accounts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryTeam {
    pub name: String,
    pub aws_accounts: Vec<RegistryAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_inactive: bool,
}

/// Loads all teams from the registry API and folds them into a [`TeamMap`].
pub async fn fetch_team_map(base_url: &str, api_key: &str, role_path: &str) -> Result<TeamMap> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| {
            CollectorError::MappingParse(format!("could not build registry HTTP client: {e}"))
        })?;

    let url = format!("{}/teams", base_url.trim_end_matches('/'));
    let teams: Vec<RegistryTeam> = client
        .get(&url)
        .header("x-api-key", api_key)
        .send()
        .await
        .map_err(|e| CollectorError::MappingParse(format!("could not reach team registry: {e}")))?
        .error_for_status()
        .map_err(|e| CollectorError::MappingParse(format!("team registry returned error: {e}")))?
        .json()
        .await
        .map_err(|e| {
            CollectorError::MappingParse(format!("could not decode team registry response: {e}"))
        })?;

    build_team_map(teams, role_path)
}

/// Turns registry teams into a validated mapping: inactive and excluded
/// accounts are dropped, everything else gets a role ARN synthesized from
/// the configured role path.
pub fn build_team_map(teams: Vec<RegistryTeam>, role_path: &str) -> Result<TeamMap> {
    let mut map = TeamMap::default();
    for team in teams {
        for account in team.aws_accounts {
            if account.is_inactive {
                debug!(account_id = %account.id, "skipping inactive registry account");
                continue;
            }
            if EXCLUDED_ACCOUNT_IDS.contains(&account.id.as_str()) {
                debug!(account_id = %account.id, "skipping excluded registry account");
                continue;
            }

            let role_arn = format!("arn:aws:iam::{}:role/{}", account.id, role_path);
            map.insert(
                Account {
                    id: account.id,
                    // The registry account's display name doubles as the
                    // environment label in the report.
                    environment: account.name,
                    role_arn: Some(role_arn),
                },
                team.name.clone(),
            )?;
        }
    }
    Ok(map)
}
