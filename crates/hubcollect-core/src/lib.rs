pub mod clock;
pub mod collector;
pub mod error;
pub mod finding;
pub mod flatten;
pub mod providers;
pub mod teams;
pub mod writer;

pub use clock::{Clock, SystemClock};
pub use collector::{collect, upload, RunConfig, RunSummary, UploadTarget};
pub use error::{CollectorError, Result};
pub use finding::{Finding, Resource};
pub use flatten::{flatten, FindingRecord};
pub use providers::securityhub::{FindingsPage, FindingsSource, SecurityHubClient};
pub use providers::storage::{ObjectStore, ObjectStoreClient};
pub use teams::{Account, MappingSource, TeamAssignment, TeamMap};
