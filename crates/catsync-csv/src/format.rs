//! Layout constants of the catalog text export.
//!
//! The file holds two sections, products then rate plans. Each is introduced
//! by a title line padded with delimiters to the section's width, a blank
//! record and a header record. Records end with `;`, which is swapped for a
//! carriage return in the file itself.

use catsync_core::{CatalogSchema, Currency, EntityKind, FieldType};

pub const PRODUCT_SECTION_TITLE: &str = "Product Catalog";
pub const RATE_PLAN_SECTION_TITLE: &str = "Rate Plans";

pub const PRODUCT_FIXED_COLUMNS: [&str; 2] = ["SKU", "Name"];
pub const RATE_PLAN_FIXED_COLUMNS: [&str; 5] = [
    "ProductSKU",
    "Name",
    "BillingPeriod",
    "AccountingCode",
    "ChargeType",
];

/// Record terminator inside the in-memory text.
pub const RECORD_SEPARATOR: char = ';';
/// Record terminator on disk.
pub const FILE_RECORD_SEPARATOR: char = '\r';

/// Total column count of a section's header.
#[must_use]
pub fn column_count(entity: EntityKind, schema: &CatalogSchema) -> usize {
    let private = schema.fields(entity).len();
    match entity {
        EntityKind::Product => PRODUCT_FIXED_COLUMNS.len() + private,
        EntityKind::RatePlan => RATE_PLAN_FIXED_COLUMNS.len() + private + Currency::COUNT,
    }
}

/// Header cells of a section, private columns in schema order.
#[must_use]
pub fn header_cells(entity: EntityKind, schema: &CatalogSchema) -> Vec<String> {
    let fixed: &[&str] = match entity {
        EntityKind::Product => &PRODUCT_FIXED_COLUMNS,
        EntityKind::RatePlan => &RATE_PLAN_FIXED_COLUMNS,
    };
    let mut cells: Vec<String> = fixed.iter().map(ToString::to_string).collect();
    cells.extend(schema.names(entity).map(str::to_string));
    if entity == EntityKind::RatePlan {
        cells.extend(Currency::ALL.iter().map(|c| c.code().to_string()));
    }
    cells
}

/// Spreadsheets upper-case booleans on save. Only cells of a boolean column
/// are folded back; text columns keep their spelling.
#[must_use]
pub fn normalize_cell(field_type: FieldType, cell: &str) -> &str {
    if field_type != FieldType::Boolean {
        cell
    } else if cell.eq_ignore_ascii_case("true") {
        "true"
    } else if cell.eq_ignore_ascii_case("false") {
        "false"
    } else {
        cell
    }
}

#[cfg(test)]
mod tests {
    use catsync_core::FieldDescriptor;

    use super::*;

    #[test]
    fn rate_plan_header_ends_with_currencies_in_order() {
        let schema = CatalogSchema::new(
            vec![],
            vec![FieldDescriptor::new("Slug", FieldType::String)],
        )
        .unwrap();
        let cells = header_cells(EntityKind::RatePlan, &schema);
        assert_eq!(cells.len(), column_count(EntityKind::RatePlan, &schema));
        assert_eq!(cells[5], "Slug");
        assert_eq!(&cells[6..], ["USD", "EUR", "GBP", "AUD", "BRL", "MXN"]);
    }

    #[test]
    fn normalize_cell_only_touches_boolean_tokens() {
        assert_eq!(normalize_cell(FieldType::Boolean, "TRUE"), "true");
        assert_eq!(normalize_cell(FieldType::Boolean, "False"), "false");
        assert_eq!(normalize_cell(FieldType::Boolean, "TRUEISH"), "TRUEISH");
        assert_eq!(normalize_cell(FieldType::Boolean, ""), "");
    }

    #[test]
    fn normalize_cell_leaves_text_columns_alone() {
        assert_eq!(normalize_cell(FieldType::String, "TRUE"), "TRUE");
        assert_eq!(normalize_cell(FieldType::String, "False"), "False");
        assert_eq!(normalize_cell(FieldType::Number, "TRUE"), "TRUE");
    }
}
