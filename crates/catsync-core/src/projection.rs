//! Tree → flat rows.
//!
//! One [`FlatProduct`] per product node and one [`FlatRatePlan`] per charge
//! of each rate plan. Private fields are discovered by their remote suffix and
//! kept only when the schema declares them.

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::currency::Currency;
use crate::flat::{FlatCatalog, FlatProduct, FlatRatePlan, Price, Prices, PrivateFields};
use crate::schema::{CatalogSchema, EntityKind, FieldType};
use crate::strings::same_field_name;
use crate::tree::{CatalogNode, CatalogTree, NodeKind};
use crate::CoreError;

fn private_field_pattern(suffix: &str) -> Regex {
    Regex::new(&format!(r"^(\w+?){}$", regex::escape(suffix)))
        .expect("valid private field regex")
}

/// Copies every suffixed field of `node` whose stem names a declared private
/// field of `entity` into `into`, unless already set.
fn extract_private(
    node: &CatalogNode,
    entity: EntityKind,
    schema: &CatalogSchema,
    pattern: &Regex,
    into: &mut PrivateFields,
) {
    for (name, value) in &node.fields {
        let Some(stem) = pattern.captures(name).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(declared) = schema
            .fields(entity)
            .iter()
            .find(|d| same_field_name(&d.name, stem.as_str()))
        else {
            tracing::debug!(kind = %node.kind, field = %name, "ignoring undeclared private field");
            continue;
        };
        if into.get(&declared.name).is_none() {
            into.insert(&declared.name, &value.to_string());
        }
    }
}

fn tier_prices(charge: &CatalogNode) -> Prices {
    let mut prices = Prices::default();
    for currency in Currency::ALL {
        let tier = charge.children.iter().find(|t| {
            t.text("Currency")
                .and_then(|c| Currency::from_code(&c))
                .is_some_and(|c| c == currency)
        });
        let price = match tier.and_then(|t| t.get("Price")) {
            Some(value) => value.as_decimal().map_or(Price::NotOffered, Price::from_amount),
            None => {
                tracing::debug!(
                    currency = %currency,
                    "no tier for currency, marking as not offered"
                );
                Price::NotOffered
            }
        };
        prices.set(currency, price);
    }
    prices
}

/// Flattens `tree` into rows following `schema`.
///
/// # Errors
///
/// Returns [`CoreError::MissingProductKey`] if a product node has no SKU.
pub fn project(tree: &CatalogTree, schema: &CatalogSchema) -> Result<FlatCatalog, CoreError> {
    let pattern = private_field_pattern(&schema.private_suffix);
    let mut catalog = FlatCatalog::new(schema.clone());

    for product_node in &tree.products {
        let sku = product_node
            .text("SKU")
            .ok_or(CoreError::MissingProductKey)?;
        let mut product = FlatProduct::new(&sku, product_node.text("Name").as_deref());
        extract_private(
            product_node,
            EntityKind::Product,
            schema,
            &pattern,
            &mut product.private,
        );

        for plan_node in &product_node.children {
            let mut plan_private = PrivateFields::default();
            extract_private(
                plan_node,
                EntityKind::RatePlan,
                schema,
                &pattern,
                &mut plan_private,
            );
            let name = plan_node.text("Name");

            if plan_node.children.is_empty() {
                product.rate_plans.push(FlatRatePlan {
                    product_sku: sku.clone(),
                    name,
                    private: plan_private,
                    ..FlatRatePlan::default()
                });
                continue;
            }

            for charge in &plan_node.children {
                let mut private = plan_private.clone();
                extract_private(charge, EntityKind::RatePlan, schema, &pattern, &mut private);
                for tier in &charge.children {
                    extract_private(tier, EntityKind::RatePlan, schema, &pattern, &mut private);
                }
                product.rate_plans.push(FlatRatePlan {
                    product_sku: sku.clone(),
                    name: name.clone(),
                    billing_period: charge.text("BillingPeriod"),
                    accounting_code: charge.text("AccountingCode"),
                    charge_type: charge.text("ChargeType"),
                    private,
                    prices: tier_prices(charge),
                });
            }
        }

        tracing::debug!(sku = %sku, rate_plans = product.rate_plans.len(), "projected product");
        catalog.products.push(product);
    }

    Ok(catalog)
}

fn typed_value(field_type: FieldType, raw: &str) -> Value {
    match field_type {
        FieldType::Boolean if raw.eq_ignore_ascii_case("true") => Value::Bool(true),
        FieldType::Boolean if raw.eq_ignore_ascii_case("false") => Value::Bool(false),
        FieldType::Number => Decimal::from_str(raw.trim())
            .ok()
            .and_then(|d| serde_json::Number::from_str(&d.to_string()).ok())
            .map_or_else(|| Value::String(raw.to_string()), Value::Number),
        FieldType::Boolean | FieldType::String => Value::String(raw.to_string()),
    }
}

/// Private field values of an entity in the shape the remote service expects
/// on objects of `kind`: remote field name → typed JSON value.
///
/// Empty values are omitted.
#[must_use]
pub fn remote_private_fields(
    kind: NodeKind,
    private: &PrivateFields,
    schema: &CatalogSchema,
) -> Map<String, Value> {
    schema
        .remote_fields(kind)
        .filter_map(|d| {
            private
                .get(&d.name)
                .map(|v| (schema.remote_field_name(&d.name), typed_value(d.field_type, v)))
        })
        .collect()
}
