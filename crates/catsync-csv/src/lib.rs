pub mod error;
pub mod file;
pub mod format;
pub mod reader;
pub mod writer;

pub use error::CsvError;
pub use file::{read_catalog_file, write_catalog_file};
pub use reader::{CatalogReader, ParseState};
pub use writer::serialize_catalog;
