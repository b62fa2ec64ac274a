pub mod compare;
pub mod diff;
pub mod error;

pub use compare::{compare, PartialDiff};
pub use diff::{check_sync_preconditions, cross_validate, DiffCounts, DiffResult};
pub use error::ValidationError;
