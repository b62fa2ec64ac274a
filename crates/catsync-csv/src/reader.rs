//! Parser for the catalog text export.
//!
//! The input is split into records first, then driven through
//! [`ParseState`]. Header records re-order the private columns of the schema
//! to the file's order; data records are decoded against the active header.

use std::collections::HashSet;

use catsync_core::{
    CatalogSchema, Currency, EntityKind, FlatCatalog, FlatProduct, FlatRatePlan, Price,
    SanityRules,
};

use crate::error::CsvError;
use crate::format::{
    column_count, normalize_cell, FILE_RECORD_SEPARATOR, PRODUCT_FIXED_COLUMNS,
    PRODUCT_SECTION_TITLE, RATE_PLAN_FIXED_COLUMNS, RATE_PLAN_SECTION_TITLE, RECORD_SEPARATOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseState {
    Init = 0,
    ProductSection = 1,
    ProductHeader = 2,
    RatePlanSection = 3,
    RatePlanHeader = 4,
    Done = 5,
}

impl std::fmt::Display for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ParseState::Init => "init",
            ParseState::ProductSection => "product section",
            ParseState::ProductHeader => "product header",
            ParseState::RatePlanSection => "rate plan section",
            ParseState::RatePlanHeader => "rate plan header",
            ParseState::Done => "done",
        };
        f.write_str(label)
    }
}

/// What a single record means, independent of the current state.
#[derive(Debug, PartialEq, Eq)]
enum Record<'t> {
    ProductTitle,
    ProductHeader(Vec<&'t str>),
    RatePlanTitle,
    RatePlanHeader(Vec<&'t str>),
    Data(Vec<&'t str>),
}

/// Splits the text into non-blank records. Carriage returns and line feeds
/// both act as the `;` record separator.
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split([RECORD_SEPARATOR, FILE_RECORD_SEPARATOR, '\n'])
        .enumerate()
        .map(|(i, r)| (i + 1, r))
        .filter(|(_, r)| !r.is_empty())
}

#[derive(Debug, Clone)]
pub struct CatalogReader<'a> {
    schema: CatalogSchema,
    delimiter: char,
    sanity: Option<&'a SanityRules>,
}

impl<'a> CatalogReader<'a> {
    /// Reader expecting the private columns declared in `schema`.
    #[must_use]
    pub fn new(schema: &CatalogSchema) -> Self {
        Self {
            schema: schema.clone(),
            delimiter: ',',
            sanity: None,
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Rules every decoded row must satisfy.
    #[must_use]
    pub fn with_sanity(mut self, rules: &'a SanityRules) -> Self {
        self.sanity = Some(rules);
        self
    }

    fn classify<'t>(&self, record: &'t str) -> Record<'t> {
        let product_header = format!("{}{}", PRODUCT_FIXED_COLUMNS[0], self.delimiter);
        let rate_plan_header = format!("{}{}", RATE_PLAN_FIXED_COLUMNS[0], self.delimiter);
        if record.starts_with(PRODUCT_SECTION_TITLE) {
            Record::ProductTitle
        } else if record.starts_with(&product_header) {
            Record::ProductHeader(record.split(self.delimiter).collect())
        } else if record.starts_with(RATE_PLAN_SECTION_TITLE) {
            Record::RatePlanTitle
        } else if record.starts_with(&rate_plan_header) {
            Record::RatePlanHeader(record.split(self.delimiter).collect())
        } else {
            Record::Data(record.split(self.delimiter).collect())
        }
    }

    /// Parses a whole export.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Schema`] for a malformed or missing header or an
    /// out-of-order section, [`CsvError::RowDecode`] /
    /// [`CsvError::UnknownProduct`] for a bad data record and
    /// [`CsvError::Sanity`] when a row breaks a sanity rule. No partial
    /// catalog is ever returned.
    pub fn parse(&self, text: &str) -> Result<FlatCatalog, CsvError> {
        let mut session = ParseSession::new(self);

        for (index, record) in records(text) {
            let classified = self.classify(record);
            if let Record::Data(cells) = &classified {
                if cells.iter().all(|c| c.is_empty()) {
                    continue;
                }
            }
            tracing::debug!(record = index, state = %session.state, "parsing record");
            session.feed(index, classified)?;
        }

        session.finish()
    }
}

/// Mutable state of one parse call.
struct ParseSession<'r, 'a> {
    reader: &'r CatalogReader<'a>,
    state: ParseState,
    catalog: FlatCatalog,
    keys: HashSet<String>,
}

impl<'r, 'a> ParseSession<'r, 'a> {
    fn new(reader: &'r CatalogReader<'a>) -> Self {
        Self {
            reader,
            state: ParseState::Init,
            catalog: FlatCatalog::new(reader.schema.clone()),
            keys: HashSet::new(),
        }
    }

    /// Sections only move forward; a marker at or behind the current state
    /// means a repeated or misplaced section.
    fn advance(&mut self, index: usize, next: ParseState) -> Result<(), CsvError> {
        if next <= self.state {
            return Err(CsvError::Schema(format!(
                "record {index}: unexpected {next} while in {}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    fn feed(&mut self, index: usize, record: Record<'_>) -> Result<(), CsvError> {
        match record {
            Record::ProductTitle => self.advance(index, ParseState::ProductSection),
            Record::ProductHeader(cells) => {
                self.advance(index, ParseState::ProductHeader)?;
                validate_product_header(&mut self.catalog.schema, &cells)
            }
            Record::RatePlanTitle => self.advance(index, ParseState::RatePlanSection),
            Record::RatePlanHeader(cells) => {
                self.advance(index, ParseState::RatePlanHeader)?;
                validate_rate_plan_header(&mut self.catalog.schema, &cells)
            }
            Record::Data(cells) => match self.state {
                ParseState::ProductHeader => self.product_row(index, &cells),
                ParseState::RatePlanHeader => self.rate_plan_row(index, &cells),
                _ => {
                    tracing::warn!(
                        record = index,
                        state = %self.state,
                        "ignoring record outside a section"
                    );
                    Ok(())
                }
            },
        }
    }

    fn check_width(
        &self,
        index: usize,
        entity: EntityKind,
        cells: &[&str],
    ) -> Result<(), CsvError> {
        let expected = column_count(entity, &self.catalog.schema);
        if cells.len() == expected {
            Ok(())
        } else {
            Err(CsvError::RowDecode {
                record: index,
                reason: format!(
                    "{entity} row has {} cells, header has {expected}",
                    cells.len()
                ),
            })
        }
    }

    fn product_row(&mut self, index: usize, cells: &[&str]) -> Result<(), CsvError> {
        self.check_width(index, EntityKind::Product, cells)?;
        let schema = &self.catalog.schema;

        let mut product = FlatProduct::new(cells[0], Some(cells[1]));
        let offset = PRODUCT_FIXED_COLUMNS.len();
        for (i, field) in schema.fields(EntityKind::Product).iter().enumerate() {
            let cell = normalize_cell(field.field_type, cells[offset + i]);
            product.private.insert(&field.name, cell);
        }

        let key = self.catalog.product_key(&product).to_string();
        if key.is_empty() {
            return Err(CsvError::RowDecode {
                record: index,
                reason: "product key is empty".to_string(),
            });
        }
        if product.sku.is_empty() {
            return Err(CsvError::RowDecode {
                record: index,
                reason: format!("product '{key}' has no SKU"),
            });
        }
        if !self.keys.insert(key.clone())
            || self.catalog.products.iter().any(|p| p.sku == product.sku)
        {
            return Err(CsvError::RowDecode {
                record: index,
                reason: format!("duplicate product '{key}'"),
            });
        }
        if let Some(rules) = self.reader.sanity {
            rules.check_product(&product, &key)?;
        }

        tracing::debug!(record = index, key = %key, "decoded product");
        self.catalog.products.push(product);
        Ok(())
    }

    fn rate_plan_row(&mut self, index: usize, cells: &[&str]) -> Result<(), CsvError> {
        self.check_width(index, EntityKind::RatePlan, cells)?;
        let schema = &self.catalog.schema;
        let non_empty = |s: &str| Some(s.to_string()).filter(|v| !v.is_empty());

        let mut rate_plan = FlatRatePlan {
            product_sku: cells[0].to_string(),
            name: non_empty(cells[1]),
            billing_period: non_empty(cells[2]),
            accounting_code: non_empty(cells[3]),
            charge_type: non_empty(cells[4]),
            ..FlatRatePlan::default()
        };

        let mut offset = RATE_PLAN_FIXED_COLUMNS.len();
        for field in schema.fields(EntityKind::RatePlan) {
            let cell = normalize_cell(field.field_type, cells[offset]);
            rate_plan.private.insert(&field.name, cell);
            offset += 1;
        }
        for currency in Currency::ALL {
            let cell = cells[offset + currency.ordinal()];
            let price = cell.parse::<Price>().map_err(|e| CsvError::RowDecode {
                record: index,
                reason: format!("invalid {currency} price '{cell}': {e}"),
            })?;
            rate_plan.prices.set(currency, price);
        }

        let key = self.catalog.rate_plan_key(&rate_plan).to_string();
        if let Some(rules) = self.reader.sanity {
            rules.check_rate_plan(&rate_plan, &key)?;
        }

        let Some(product) = self
            .catalog
            .products
            .iter_mut()
            .find(|p| p.sku == rate_plan.product_sku)
        else {
            return Err(CsvError::UnknownProduct {
                record: index,
                sku: rate_plan.product_sku.clone(),
            });
        };
        tracing::debug!(record = index, product = %product.sku, key = %key, "decoded rate plan");
        product.rate_plans.push(rate_plan);
        Ok(())
    }

    fn finish(self) -> Result<FlatCatalog, CsvError> {
        match self.state {
            ParseState::RatePlanHeader | ParseState::Done => {}
            ParseState::Init | ParseState::ProductSection => {
                return Err(CsvError::Schema(
                    "input ended before the product header".to_string(),
                ));
            }
            ParseState::ProductHeader | ParseState::RatePlanSection => {
                return Err(CsvError::Schema(
                    "input ended before the rate plan header".to_string(),
                ));
            }
        }
        tracing::debug!(state = %ParseState::Done, "parse complete");
        tracing::info!(
            products = self.catalog.products.len(),
            rate_plans = self.catalog.rate_plans().count(),
            "parsed catalog file"
        );
        Ok(self.catalog)
    }
}

fn expect_fixed(entity: EntityKind, cells: &[&str], fixed: &[&str]) -> Result<(), CsvError> {
    for (i, (got, want)) in cells.iter().zip(fixed).enumerate() {
        if got != want {
            return Err(CsvError::Schema(format!(
                "{entity} header column {i} is '{got}', expected '{want}'"
            )));
        }
    }
    Ok(())
}

fn reorder_private(
    schema: &mut CatalogSchema,
    entity: EntityKind,
    names: &[&str],
) -> Result<(), CsvError> {
    let reordered = schema.reorder(entity, names);
    reordered.map_err(|name| {
        if schema.exact_descriptor(entity, &name).is_some() {
            CsvError::Schema(format!("{entity} header repeats or omits private field '{name}'"))
        } else {
            CsvError::Schema(format!("{entity} header has unknown column '{name}'"))
        }
    })
}

fn validate_product_header(schema: &mut CatalogSchema, cells: &[&str]) -> Result<(), CsvError> {
    let expected = column_count(EntityKind::Product, schema);
    if cells.len() != expected {
        return Err(CsvError::Schema(format!(
            "product header has {} columns, expected {expected}",
            cells.len()
        )));
    }
    expect_fixed(EntityKind::Product, cells, &PRODUCT_FIXED_COLUMNS)?;
    reorder_private(
        schema,
        EntityKind::Product,
        &cells[PRODUCT_FIXED_COLUMNS.len()..],
    )
}

fn validate_rate_plan_header(schema: &mut CatalogSchema, cells: &[&str]) -> Result<(), CsvError> {
    let expected = column_count(EntityKind::RatePlan, schema);
    if cells.len() != expected {
        return Err(CsvError::Schema(format!(
            "rate plan header has {} columns, expected {expected}",
            cells.len()
        )));
    }
    expect_fixed(EntityKind::RatePlan, cells, &RATE_PLAN_FIXED_COLUMNS)?;

    let private_end = expected - Currency::COUNT;
    for (currency, got) in Currency::ALL.iter().zip(&cells[private_end..]) {
        if *got != currency.code() {
            return Err(CsvError::Schema(format!(
                "rate plan header has '{got}' where currency {currency} is expected"
            )));
        }
    }
    reorder_private(
        schema,
        EntityKind::RatePlan,
        &cells[RATE_PLAN_FIXED_COLUMNS.len()..private_end],
    )
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod tests;
