use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectorError>;

/// Everything that can go wrong during a collection run. Nothing here is
/// retried; the scheduler that invokes the collector owns retry-on-failure.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Bad or conflicting options, raised before any I/O happens.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The team mapping could not be read or violates its schema.
    #[error("could not parse team mapping: {0}")]
    MappingParse(String),

    /// The same account ID appears under two teams.
    #[error("duplicate account ID in team mapping: {0}")]
    DuplicateAccount(String),

    /// A supplied role reference is not an ARN-shaped string.
    #[error("invalid role ARN for account {account_id}: {role_arn}")]
    InvalidRoleReference { account_id: String, role_arn: String },

    /// Transport, auth, or service failure while paginating findings.
    #[error("could not fetch findings for account {account_id} in {region}: {reason}")]
    Fetch {
        account_id: String,
        region: String,
        reason: String,
    },

    #[error("output write error: {0}")]
    Write(String),

    /// Upload failed after the local file was already complete and valid.
    #[error("could not upload findings: {0}")]
    Upload(String),
}
