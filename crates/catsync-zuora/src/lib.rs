pub mod client;
pub mod error;
pub mod fetch;
pub mod service;
pub mod sync;
mod types;

pub use client::ZuoraClient;
pub use error::{SyncError, ZuoraError};
pub use fetch::fetch_catalog;
pub use service::{row_text, CatalogService, MutationResult, Row};
pub use sync::{AlwaysYes, Confirm, SyncExecutor, SyncOutcome, PRODUCT_END_DATE, PRODUCT_START_DATE};
