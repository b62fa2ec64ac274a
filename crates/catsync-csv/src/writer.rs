use catsync_core::{EntityKind, FlatCatalog};

use crate::error::CsvError;
use crate::format::{
    column_count, header_cells, FILE_RECORD_SEPARATOR, PRODUCT_FIXED_COLUMNS,
    PRODUCT_SECTION_TITLE, RATE_PLAN_FIXED_COLUMNS, RATE_PLAN_SECTION_TITLE, RECORD_SEPARATOR,
};

/// Accumulates records, rejecting cells that would split a record.
struct RecordWriter {
    delimiter: char,
    out: String,
}

impl RecordWriter {
    fn cell_is_encodable(&self, value: &str) -> bool {
        !value.contains([self.delimiter, RECORD_SEPARATOR, FILE_RECORD_SEPARATOR, '\n'])
    }

    /// A data record whose first cell reads as a section title or header
    /// would be taken for that marker on import.
    fn leads_like_marker(first: &str) -> bool {
        first.starts_with(PRODUCT_SECTION_TITLE)
            || first.starts_with(RATE_PLAN_SECTION_TITLE)
            || first == PRODUCT_FIXED_COLUMNS[0]
            || first == RATE_PLAN_FIXED_COLUMNS[0]
    }

    fn data_record<'v, I>(
        &mut self,
        entity: &'static str,
        key: &str,
        first: &'v str,
        rest: I,
    ) -> Result<(), CsvError>
    where
        I: IntoIterator<Item = &'v str>,
    {
        if Self::leads_like_marker(first) {
            return Err(CsvError::Unencodable {
                entity,
                key: key.to_string(),
                value: first.to_string(),
            });
        }
        self.record(entity, key, std::iter::once(first).chain(rest))
    }

    fn record<'v, I>(&mut self, entity: &'static str, key: &str, cells: I) -> Result<(), CsvError>
    where
        I: IntoIterator<Item = &'v str>,
    {
        for (i, cell) in cells.into_iter().enumerate() {
            if !self.cell_is_encodable(cell) {
                return Err(CsvError::Unencodable {
                    entity,
                    key: key.to_string(),
                    value: cell.to_string(),
                });
            }
            if i > 0 {
                self.out.push(self.delimiter);
            }
            self.out.push_str(cell);
        }
        self.out.push(FILE_RECORD_SEPARATOR);
        Ok(())
    }

    /// Section title padded to the section width, then a blank record.
    fn title(&mut self, title: &str, width: usize) {
        self.out.push_str(title);
        for _ in 1..width {
            self.out.push(self.delimiter);
        }
        self.out.push(FILE_RECORD_SEPARATOR);
        self.out.push(FILE_RECORD_SEPARATOR);
    }

    fn blank(&mut self) {
        self.out.push(FILE_RECORD_SEPARATOR);
    }
}

/// Renders `catalog` as the on-disk text: CR-terminated records, private
/// columns in schema order, currencies in ordinal order.
///
/// # Errors
///
/// Returns [`CsvError::Unencodable`] if a value contains the delimiter, `;`,
/// CR or LF, or if a SKU would be read back as a section marker.
pub fn serialize_catalog(catalog: &FlatCatalog, delimiter: char) -> Result<String, CsvError> {
    let schema = &catalog.schema;
    let mut w = RecordWriter {
        delimiter,
        out: String::new(),
    };

    w.title(
        PRODUCT_SECTION_TITLE,
        column_count(EntityKind::Product, schema),
    );
    let header = header_cells(EntityKind::Product, schema);
    w.record("header", "product", header.iter().map(String::as_str))?;

    for product in &catalog.products {
        let key = catalog.product_key(product);
        let name = product.name.as_deref().unwrap_or_default();
        let private = schema
            .names(EntityKind::Product)
            .map(|f| product.private.get(f).unwrap_or_default());
        w.data_record(
            "product",
            key,
            &product.sku,
            std::iter::once(name).chain(private),
        )?;
    }

    w.blank();
    w.blank();
    w.title(
        RATE_PLAN_SECTION_TITLE,
        column_count(EntityKind::RatePlan, schema),
    );
    let header = header_cells(EntityKind::RatePlan, schema);
    w.record("header", "rate plan", header.iter().map(String::as_str))?;

    for product in &catalog.products {
        for rate_plan in &product.rate_plans {
            let key = catalog.rate_plan_key(rate_plan);
            let prices: Vec<String> = rate_plan
                .prices
                .iter()
                .map(|(_, p)| p.to_string())
                .collect();
            let fixed = [
                rate_plan.name.as_deref().unwrap_or_default(),
                rate_plan.billing_period.as_deref().unwrap_or_default(),
                rate_plan.accounting_code.as_deref().unwrap_or_default(),
                rate_plan.charge_type.as_deref().unwrap_or_default(),
            ];
            let private = schema
                .names(EntityKind::RatePlan)
                .map(|f| rate_plan.private.get(f).unwrap_or_default());
            w.data_record(
                "rate plan",
                key,
                &product.sku,
                fixed
                    .into_iter()
                    .chain(private)
                    .chain(prices.iter().map(String::as_str)),
            )?;
        }
    }

    tracing::debug!(
        products = catalog.products.len(),
        bytes = w.out.len(),
        "serialized catalog"
    );
    Ok(w.out)
}

#[cfg(test)]
mod tests {
    use catsync_core::{
        CatalogSchema, Currency, FieldDescriptor, FieldType, FlatProduct, FlatRatePlan, Price,
        PrivateFields,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn catalog() -> FlatCatalog {
        let schema = CatalogSchema::new(
            vec![FieldDescriptor::new("Category", FieldType::String)],
            vec![FieldDescriptor::new("Slug", FieldType::String)],
        )
        .unwrap();
        let mut rate_plan = FlatRatePlan {
            product_sku: "bronze".into(),
            name: Some("bronze-monthly".into()),
            billing_period: Some("Month".into()),
            charge_type: Some("Recurring".into()),
            private: PrivateFields::from([("Slug", "bm")]),
            ..FlatRatePlan::default()
        };
        for currency in Currency::ALL {
            rate_plan.prices.set(currency, Price::NotOffered);
        }
        rate_plan
            .prices
            .set(Currency::Usd, Price::Amount(Decimal::new(999, 2)));
        let mut product = FlatProduct::new("bronze", Some("Bronze"));
        product.rate_plans.push(rate_plan);
        let mut catalog = FlatCatalog::new(schema);
        catalog.products.push(product);
        catalog
    }

    #[test]
    fn layout_matches_spreadsheet_export() {
        let text = serialize_catalog(&catalog(), ',').unwrap();
        let expected = [
            "Product Catalog,,",
            "",
            "SKU,Name,Category",
            "bronze,Bronze,",
            "",
            "",
            "Rate Plans,,,,,,,,,,,",
            "",
            "ProductSKU,Name,BillingPeriod,AccountingCode,ChargeType,Slug,USD,EUR,GBP,AUD,BRL,MXN",
            "bronze,bronze-monthly,Month,,Recurring,bm,9.99,-1,-1,-1,-1,-1",
        ]
        .join("\r")
            + "\r";
        assert_eq!(text, expected);
        assert!(!text.contains(';'));
    }

    #[test]
    fn unset_prices_are_empty_cells() {
        let mut c = catalog();
        c.products[0].rate_plans[0].prices = catsync_core::Prices::default();
        let text = serialize_catalog(&c, ',').unwrap();
        assert!(text.contains("Recurring,bm,,,,,,\r"));
    }

    #[test]
    fn value_with_separator_is_rejected() {
        let mut c = catalog();
        c.products[0].name = Some("Bronze, basic".into());
        let result = serialize_catalog(&c, ',');
        assert!(
            matches!(result, Err(CsvError::Unencodable { ref key, .. }) if key == "bronze"),
            "got: {result:?}"
        );

        let mut c = catalog();
        c.products[0].rate_plans[0].name = Some("bronze;monthly".into());
        assert!(serialize_catalog(&c, ',').is_err());
    }

    #[test]
    fn sku_that_reads_as_a_marker_is_rejected() {
        for sku in ["SKU", "ProductSKU", "Product Catalog 2", "Rate Plans"] {
            let mut c = catalog();
            c.products[0].sku = sku.to_string();
            let result = serialize_catalog(&c, ',');
            assert!(
                matches!(result, Err(CsvError::Unencodable { ref value, .. }) if value == sku),
                "{sku}: got {result:?}"
            );
        }

        let mut c = catalog();
        c.products[0].sku = "SKU-1".to_string();
        assert!(serialize_catalog(&c, ',').is_ok());
    }

    #[test]
    fn other_delimiter_allows_commas() {
        let mut c = catalog();
        c.products[0].name = Some("Bronze, basic".into());
        let text = serialize_catalog(&c, '\t').unwrap();
        assert!(text.contains("bronze\tBronze, basic\t\r"));
    }
}
