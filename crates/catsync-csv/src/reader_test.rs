use catsync_core::{
    parse_sanity_rules, FieldDescriptor, FieldType, KeyField, PrivateFields,
};
use rust_decimal::Decimal;

use super::*;

fn schema() -> CatalogSchema {
    CatalogSchema::new(
        vec![FieldDescriptor::new("Category", FieldType::String)],
        vec![
            FieldDescriptor::new("Slug", FieldType::String),
            FieldDescriptor::new("Trial", FieldType::Boolean),
        ],
    )
    .unwrap()
}

const PRODUCT_HEADER: &str = "SKU,Name,Category";
const RATE_PLAN_HEADER: &str =
    "ProductSKU,Name,BillingPeriod,AccountingCode,ChargeType,Slug,Trial,USD,EUR,GBP,AUD,BRL,MXN";

/// Assembles an export the way a spreadsheet saves it: CR-terminated records.
fn export(
    product_header: &str,
    products: &[&str],
    rate_plan_header: &str,
    rate_plans: &[&str],
) -> String {
    let mut records = vec!["Product Catalog,,", "", product_header];
    records.extend_from_slice(products);
    records.extend(["", "", "Rate Plans,,,,,,,,,,,,", "", rate_plan_header]);
    records.extend_from_slice(rate_plans);
    let mut text = records.join("\r");
    text.push('\r');
    text
}

fn sample() -> String {
    export(
        PRODUCT_HEADER,
        &["bronze,Bronze,basic", "silver,Silver,"],
        RATE_PLAN_HEADER,
        &[
            "bronze,bronze-monthly,Month,ACC-1,Recurring,bronze-monthly,FALSE,9.99,8.99,-1,-1,-1,-1",
            "bronze,bronze-free,,,,bronze-free,,,,,,,",
            "silver,silver-annual,Annual,ACC-2,Recurring,silver-annual,TRUE,99,89,79,-1,-1,-1",
        ],
    )
}

#[test]
fn parses_products_and_rate_plans() {
    let catalog = CatalogReader::new(&schema()).parse(&sample()).unwrap();
    assert_eq!(catalog.products.len(), 2);

    let bronze = &catalog.products[0];
    assert_eq!(bronze.sku, "bronze");
    assert_eq!(bronze.name.as_deref(), Some("Bronze"));
    assert_eq!(bronze.private.get("Category"), Some("basic"));
    assert_eq!(bronze.rate_plans.len(), 2);

    let monthly = &bronze.rate_plans[0];
    assert_eq!(monthly.billing_period.as_deref(), Some("Month"));
    assert_eq!(monthly.private.get("Trial"), Some("false"));
    assert_eq!(
        monthly.price(Currency::Usd),
        &Price::Amount(Decimal::new(999, 2))
    );
    assert_eq!(monthly.price(Currency::Gbp), &Price::NotOffered);

    let free = &bronze.rate_plans[1];
    assert!(free.charge_type.is_none());
    assert!(free.prices.iter().all(|(_, p)| *p == Price::Unset));

    assert_eq!(
        catalog.products[1].rate_plans[0].private.get("Trial"),
        Some("true")
    );
    assert_eq!(catalog.products[1].private, PrivateFields::default());
}

#[test]
fn line_feeds_separate_records_too() {
    let text = sample().replace('\r', "\r\n");
    let catalog = CatalogReader::new(&schema()).parse(&text).unwrap();
    assert_eq!(catalog.rate_plans().count(), 3);
}

#[test]
fn only_boolean_columns_fold_case() {
    let text = export(
        PRODUCT_HEADER,
        &["truthy,True,FALSE"],
        RATE_PLAN_HEADER,
        &["truthy,TRUE,Month,ACC-1,Recurring,False,TRUE,1,1,1,1,1,1"],
    );
    let catalog = CatalogReader::new(&schema()).parse(&text).unwrap();

    let product = &catalog.products[0];
    assert_eq!(product.name.as_deref(), Some("True"));
    assert_eq!(product.private.get("Category"), Some("FALSE"));

    let rp = &product.rate_plans[0];
    assert_eq!(rp.name.as_deref(), Some("TRUE"));
    assert_eq!(rp.private.get("Slug"), Some("False"));
    assert_eq!(rp.private.get("Trial"), Some("true"));
}

#[test]
fn header_reorders_private_columns() {
    let text = export(
        PRODUCT_HEADER,
        &["bronze,Bronze,basic"],
        "ProductSKU,Name,BillingPeriod,AccountingCode,ChargeType,Trial,Slug,USD,EUR,GBP,AUD,BRL,MXN",
        &["bronze,bronze-monthly,Month,ACC-1,Recurring,true,bronze-monthly,1,1,1,1,1,1"],
    );
    let catalog = CatalogReader::new(&schema()).parse(&text).unwrap();
    let names: Vec<&str> = catalog.schema.names(EntityKind::RatePlan).collect();
    assert_eq!(names, ["Trial", "Slug"]);
    let rp = &catalog.products[0].rate_plans[0];
    assert_eq!(rp.private.get("Slug"), Some("bronze-monthly"));
    assert_eq!(rp.private.get("Trial"), Some("true"));
}

#[test]
fn extra_header_column_is_a_schema_error() {
    let text = export(
        "SKU,Name,Category,Colour",
        &["bronze,Bronze,basic,red"],
        RATE_PLAN_HEADER,
        &[],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(
            result,
            Err(CsvError::Schema(ref m))
                if m.contains("product header has 4 columns")
        ),
        "expected Schema error, got: {result:?}"
    );
}

#[test]
fn unknown_private_column_is_a_schema_error() {
    let text = export("SKU,Name,Colour", &[], RATE_PLAN_HEADER, &[]);
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(result, Err(CsvError::Schema(ref m)) if m.contains("unknown column 'Colour'")),
        "got: {result:?}"
    );
}

#[test]
fn duplicate_private_column_is_a_schema_error() {
    let text = export(
        PRODUCT_HEADER,
        &[],
        "ProductSKU,Name,BillingPeriod,AccountingCode,ChargeType,Slug,Slug,USD,EUR,GBP,AUD,BRL,MXN",
        &[],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(matches!(result, Err(CsvError::Schema(_))), "got: {result:?}");
}

#[test]
fn misordered_currency_is_a_schema_error() {
    let text = export(
        PRODUCT_HEADER,
        &[],
        "ProductSKU,Name,BillingPeriod,AccountingCode,ChargeType,Slug,Trial,EUR,USD,GBP,AUD,BRL,MXN",
        &[],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(result, Err(CsvError::Schema(ref m)) if m.contains("currency USD")),
        "got: {result:?}"
    );
}

#[test]
fn wrong_fixed_column_is_a_schema_error() {
    let text = export("SKU,Title,Category", &[], RATE_PLAN_HEADER, &[]);
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(result, Err(CsvError::Schema(ref m)) if m.contains("'Title', expected 'Name'")),
        "got: {result:?}"
    );
}

#[test]
fn truncated_input_is_rejected() {
    let text = "Product Catalog,,\r\rSKU,Name,Category\rbronze,Bronze,basic\r";
    let result = CatalogReader::new(&schema()).parse(text);
    assert!(
        matches!(result, Err(CsvError::Schema(ref m)) if m.contains("rate plan header")),
        "got: {result:?}"
    );
    assert!(matches!(
        CatalogReader::new(&schema()).parse(""),
        Err(CsvError::Schema(_))
    ));
}

#[test]
fn repeated_section_is_rejected() {
    let mut text = sample();
    text.push_str("Product Catalog,,\r");
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(matches!(result, Err(CsvError::Schema(ref m)) if m.contains("unexpected")));
}

#[test]
fn short_row_is_a_decode_error() {
    let text = export(PRODUCT_HEADER, &["bronze,Bronze"], RATE_PLAN_HEADER, &[]);
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(
            result,
            Err(CsvError::RowDecode { ref reason, .. })
                if reason.contains("2 cells, header has 3")
        ),
        "got: {result:?}"
    );
}

#[test]
fn bad_price_is_a_decode_error() {
    let text = export(
        PRODUCT_HEADER,
        &["bronze,Bronze,"],
        RATE_PLAN_HEADER,
        &["bronze,bronze-monthly,Month,,,,,free,,,,,"],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(
            result,
            Err(CsvError::RowDecode { ref reason, .. })
                if reason.contains("invalid USD price 'free'")
        ),
        "got: {result:?}"
    );
}

#[test]
fn rate_plan_for_unknown_product_is_rejected() {
    let text = export(
        PRODUCT_HEADER,
        &["bronze,Bronze,"],
        RATE_PLAN_HEADER,
        &["gold,gold-monthly,Month,,,,,1,1,1,1,1,1"],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(result, Err(CsvError::UnknownProduct { ref sku, .. }) if sku == "gold"),
        "got: {result:?}"
    );
}

#[test]
fn duplicate_product_is_rejected() {
    let text = export(
        PRODUCT_HEADER,
        &["bronze,Bronze,", "bronze,Bronze again,"],
        RATE_PLAN_HEADER,
        &[],
    );
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(
            result,
            Err(CsvError::RowDecode { ref reason, .. })
                if reason.contains("duplicate product 'bronze'")
        ),
        "got: {result:?}"
    );
}

#[test]
fn empty_product_key_is_rejected() {
    let text = export(PRODUCT_HEADER, &[",Nameless,basic"], RATE_PLAN_HEADER, &[]);
    let result = CatalogReader::new(&schema()).parse(&text);
    assert!(
        matches!(
            result,
            Err(CsvError::RowDecode { ref reason, .. })
                if reason.contains("key is empty")
        ),
        "got: {result:?}"
    );
}

#[test]
fn private_product_key_must_be_unique() {
    let schema = schema().with_key(EntityKind::Product, "Category").unwrap();
    assert_eq!(schema.product_key, KeyField::Private("Category".into()));
    let text = export(
        PRODUCT_HEADER,
        &["bronze,Bronze,basic", "silver,Silver,basic"],
        RATE_PLAN_HEADER,
        &[],
    );
    assert!(CatalogReader::new(&schema).parse(&text).is_err());
}

#[test]
fn blank_rows_and_stray_records_are_skipped() {
    let text = format!(",,\r{}", sample().replace("\r\r", "\r,,\r"));
    let catalog = CatalogReader::new(&schema()).parse(&text).unwrap();
    assert_eq!(catalog.products.len(), 2);
}

#[test]
fn custom_delimiter() {
    let text = sample().replace(',', "|");
    let catalog = CatalogReader::new(&schema())
        .with_delimiter('|')
        .parse(&text)
        .unwrap();
    assert_eq!(catalog.rate_plans().count(), 3);
}

#[test]
fn sanity_violation_fails_the_parse() {
    let rules = parse_sanity_rules(
        "rate_plan:\n  BillingPeriod: { one_of: [Month] }\n",
        &schema(),
    )
    .unwrap();
    let result = CatalogReader::new(&schema())
        .with_sanity(&rules)
        .parse(&sample());
    assert!(
        matches!(result, Err(CsvError::Sanity(_))),
        "got: {result:?}"
    );
}
