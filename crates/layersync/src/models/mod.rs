//! Domain models for sync passes

mod account;
mod report;
mod schedule;
mod sync_result;
mod tree;

pub use account::{Account, AccountSelector};
pub use report::{PassOutcome, PassReport};
pub use schedule::{Extras, SyncSchedule};
pub use sync_result::{FailureSeverity, LeafFailure, SyncResult};
pub use tree::{ResourceGroup, ResourceNode, SyncableResource};
