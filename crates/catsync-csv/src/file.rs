//! File boundary of the codec. Handles are scoped to each call.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use catsync_core::FlatCatalog;

use crate::error::CsvError;
use crate::reader::CatalogReader;
use crate::writer::serialize_catalog;

fn io_error(path: &Path, source: std::io::Error) -> CsvError {
    CsvError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Reads and parses the export at `path`.
///
/// # Errors
///
/// Returns [`CsvError::Io`] if the file cannot be read or is not UTF-8, and
/// any parse error from [`CatalogReader::parse`].
pub fn read_catalog_file(path: &Path, reader: &CatalogReader<'_>) -> Result<FlatCatalog, CsvError> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| {
        io_error(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read catalog file");
    reader.parse(&text)
}

/// Serializes `catalog` and writes it to `path`, replacing any existing file.
///
/// Nothing is written when serialization fails.
///
/// # Errors
///
/// Returns [`CsvError::Unencodable`] for values the format cannot hold and
/// [`CsvError::Io`] if the file cannot be written.
pub fn write_catalog_file(
    path: &Path,
    catalog: &FlatCatalog,
    delimiter: char,
) -> Result<(), CsvError> {
    let text = serialize_catalog(catalog, delimiter)?;
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut out = BufWriter::new(file);
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| io_error(path, e))?;
    tracing::info!(
        path = %path.display(),
        products = catalog.products.len(),
        rate_plans = catalog.rate_plans().count(),
        "wrote catalog file"
    );
    Ok(())
}
