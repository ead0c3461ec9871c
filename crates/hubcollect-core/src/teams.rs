use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{CollectorError, Result};
use crate::providers::registry;

/// One billing/security boundary. IDs look numeric but are opaque text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub environment: String,
    /// Cross-account role assumed when fetching this account's findings.
    pub role_arn: Option<String>,
}

/// An account together with the team that owns it.
#[derive(Debug, Clone)]
pub struct TeamAssignment {
    pub account: Account,
    pub team: String,
}

/// The resolved account-to-team mapping. Keyed by account ID so iteration is
/// sorted and runs produce rows in a stable order.
#[derive(Debug, Default)]
pub struct TeamMap {
    entries: BTreeMap<String, TeamAssignment>,
}

impl TeamMap {
    /// Adds an account under a team. An account may belong to at most one
    /// team, so a repeated ID is a hard error rather than a merge.
    pub fn insert(&mut self, account: Account, team: String) -> Result<()> {
        if self.entries.contains_key(&account.id) {
            return Err(CollectorError::DuplicateAccount(account.id));
        }
        self.entries
            .insert(account.id.clone(), TeamAssignment { account, team });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamAssignment> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where the team mapping comes from. Exactly one source per run.
#[derive(Debug, Clone)]
pub enum MappingSource {
    /// Strict-schema JSON file on local disk.
    File(PathBuf),
    /// Remote team registry API.
    Registry {
        base_url: String,
        api_key: String,
        role_path: String,
    },
}

impl MappingSource {
    /// Builds the single configured source from CLI options. Zero sources,
    /// both sources, or a partially-specified registry are configuration
    /// errors, surfaced before any network call.
    pub fn from_options(
        team_map_file: Option<PathBuf>,
        registry_url: Option<String>,
        registry_api_key: Option<String>,
        registry_role_path: Option<String>,
    ) -> Result<Self> {
        let registry_configured =
            registry_url.is_some() || registry_api_key.is_some() || registry_role_path.is_some();

        match (team_map_file, registry_url, registry_api_key, registry_role_path) {
            (Some(_), _, _, _) if registry_configured => Err(CollectorError::Configuration(
                "a team map file and a team registry were both configured; pick one".to_string(),
            )),
            (Some(path), _, _, _) => Ok(MappingSource::File(path)),
            (None, Some(base_url), Some(api_key), Some(role_path)) => Ok(MappingSource::Registry {
                base_url,
                api_key,
                role_path,
            }),
            (None, None, None, None) => Err(CollectorError::Configuration(
                "a team mapping source is required: either a team map file or a team registry"
                    .to_string(),
            )),
            _ => Err(CollectorError::Configuration(
                "team registry mapping requires a base URL, an API key, and a role path"
                    .to_string(),
            )),
        }
    }
}

/// Resolves the configured mapping source into a validated [`TeamMap`].
pub async fn resolve(source: &MappingSource) -> Result<TeamMap> {
    match source {
        MappingSource::File(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                CollectorError::MappingParse(format!(
                    "could not read team map file {}: {e}",
                    path.display()
                ))
            })?;
            parse_team_map(&raw)
        }
        MappingSource::Registry {
            base_url,
            api_key,
            role_path,
        } => registry::fetch_team_map(base_url, api_key, role_path).await,
    }
}

// Wire shape of the team map JSON. Unknown fields are rejected, not ignored,
// so config typos surface as parse errors instead of silently dropped data.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TeamMapFile {
    teams: Vec<TeamEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TeamEntry {
    name: String,
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccountEntry {
    id: String,
    environment: String,
    #[serde(rename = "roleArn")]
    role_arn: Option<String>,
}

/// Decodes and validates a team map JSON document.
pub fn parse_team_map(raw: &str) -> Result<TeamMap> {
    let file: TeamMapFile =
        serde_json::from_str(raw).map_err(|e| CollectorError::MappingParse(e.to_string()))?;

    let mut map = TeamMap::default();
    for team in file.teams {
        for entry in team.accounts {
            if let Some(arn) = &entry.role_arn {
                if !is_role_arn(arn) {
                    return Err(CollectorError::InvalidRoleReference {
                        account_id: entry.id,
                        role_arn: arn.clone(),
                    });
                }
            }
            map.insert(
                Account {
                    id: entry.id,
                    environment: entry.environment,
                    role_arn: entry.role_arn,
                },
                team.name.clone(),
            )?;
        }
    }
    Ok(map)
}

/// ARN shape check: `arn:partition:service:region:account:resource`, with a
/// non-empty partition, service, and resource.
pub(crate) fn is_role_arn(value: &str) -> bool {
    let mut parts = value.splitn(6, ':');
    let prefix = parts.next();
    let partition = parts.next();
    let service = parts.next();
    let _region = parts.next();
    let _account = parts.next();
    let resource = parts.next();

    matches!(prefix, Some("arn"))
        && partition.is_some_and(|p| !p.is_empty())
        && service.is_some_and(|s| !s.is_empty())
        && resource.is_some_and(|r| !r.is_empty())
}
