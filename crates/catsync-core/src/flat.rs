use std::collections::BTreeMap;
use std::ops::Index;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::currency::Currency;
use crate::schema::{CatalogSchema, EntityKind, KeyField};
use crate::strings::same_field_name;

/// One currency slot of a rate plan's price vector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Price {
    /// The rate plan has no charge at all (free tier).
    #[default]
    Unset,
    /// The charge exists but has no tier in this currency. Written as `-1`.
    NotOffered,
    Amount(Decimal),
}

impl Price {
    pub const NOT_OFFERED_TEXT: &'static str = "-1";

    /// Wraps a decimal, folding the `-1` sentinel into [`Price::NotOffered`].
    #[must_use]
    pub fn from_amount(amount: Decimal) -> Self {
        if amount == Decimal::NEGATIVE_ONE {
            Price::NotOffered
        } else {
            Price::Amount(amount)
        }
    }

    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Price::Amount(d) => Some(*d),
            Price::Unset | Price::NotOffered => None,
        }
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    /// Empty text is [`Price::Unset`]; otherwise the text must be a decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Price::Unset);
        }
        let amount = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s))?;
        Ok(Price::from_amount(amount))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Price::Unset => Ok(()),
            Price::NotOffered => f.write_str(Self::NOT_OFFERED_TEXT),
            Price::Amount(d) => write!(f, "{d}"),
        }
    }
}

/// Prices indexed by [`Currency`] ordinal. Always one slot per currency.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prices([Price; Currency::COUNT]);

impl Prices {
    #[must_use]
    pub fn new(prices: [Price; Currency::COUNT]) -> Self {
        Self(prices)
    }

    pub fn set(&mut self, currency: Currency, price: Price) {
        self.0[currency.ordinal()] = price;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, &Price)> {
        Currency::ALL.into_iter().zip(self.0.iter())
    }

    /// First currency, in ordinal order, whose price differs from `other`.
    #[must_use]
    pub fn first_difference(&self, other: &Prices) -> Option<Currency> {
        self.iter()
            .zip(other.0.iter())
            .find(|((_, mine), theirs)| mine != theirs)
            .map(|((currency, _), _)| currency)
    }
}

impl Index<Currency> for Prices {
    type Output = Price;

    fn index(&self, currency: Currency) -> &Price {
        &self.0[currency.ordinal()]
    }
}

/// Private field values of one entity, keyed by declared field name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrivateFields(BTreeMap<String, String>);

impl PrivateFields {
    /// Empty values are not stored; reading them back yields `None`.
    pub fn insert(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), value.to_string());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PrivateFields {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut fields = PrivateFields::default();
        for (k, v) in pairs {
            fields.insert(k, v);
        }
        fields
    }
}

/// Column labels are matched ignoring case and underscores, so `SKU`,
/// `sku` and `billing_period` all resolve.
fn label_is(label: &str, column: &str) -> bool {
    let squash = |s: &str| {
        s.chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    squash(label) == squash(column)
}

fn private_lookup<'a>(private: &'a PrivateFields, label: &str) -> Option<&'a str> {
    private.get(label).or_else(|| {
        private
            .iter()
            .find(|(k, _)| same_field_name(k, label))
            .map(|(_, v)| v)
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatProduct {
    pub sku: String,
    pub name: Option<String>,
    pub private: PrivateFields,
    pub rate_plans: Vec<FlatRatePlan>,
}

impl FlatProduct {
    #[must_use]
    pub fn new(sku: &str, name: Option<&str>) -> Self {
        Self {
            sku: sku.to_string(),
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            ..Self::default()
        }
    }

    /// Identity of the product under `key`; `None` when a private key field
    /// is empty.
    #[must_use]
    pub fn key(&self, key: &KeyField) -> Option<&str> {
        match key {
            KeyField::Default => Some(self.sku.as_str()).filter(|s| !s.is_empty()),
            KeyField::Private(field) => self.private.get(field),
        }
    }

    /// Value of a fixed column (`SKU`, `Name`) or a private field.
    #[must_use]
    pub fn field(&self, label: &str) -> Option<&str> {
        if label_is(label, "SKU") {
            Some(self.sku.as_str()).filter(|s| !s.is_empty())
        } else if label_is(label, "Name") {
            self.name.as_deref()
        } else {
            private_lookup(&self.private, label)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatRatePlan {
    pub product_sku: String,
    pub name: Option<String>,
    pub billing_period: Option<String>,
    pub accounting_code: Option<String>,
    pub charge_type: Option<String>,
    pub private: PrivateFields,
    pub prices: Prices,
}

impl FlatRatePlan {
    #[must_use]
    pub fn key(&self, key: &KeyField) -> Option<&str> {
        match key {
            KeyField::Default => self.name.as_deref(),
            KeyField::Private(field) => self.private.get(field),
        }
    }

    #[must_use]
    pub fn price(&self, currency: Currency) -> &Price {
        &self.prices[currency]
    }

    /// Value of a fixed column or a private field.
    #[must_use]
    pub fn field(&self, label: &str) -> Option<&str> {
        if label_is(label, "ProductSKU") {
            Some(self.product_sku.as_str()).filter(|s| !s.is_empty())
        } else if label_is(label, "Name") {
            self.name.as_deref()
        } else if label_is(label, "BillingPeriod") {
            self.billing_period.as_deref()
        } else if label_is(label, "AccountingCode") {
            self.accounting_code.as_deref()
        } else if label_is(label, "ChargeType") {
            self.charge_type.as_deref()
        } else {
            private_lookup(&self.private, label)
        }
    }
}

/// True when `label` names one of the fixed columns of `entity`.
#[must_use]
pub fn is_fixed_column(entity: EntityKind, label: &str) -> bool {
    let fixed: &[&str] = match entity {
        EntityKind::Product => &["SKU", "Name"],
        EntityKind::RatePlan => &[
            "ProductSKU",
            "Name",
            "BillingPeriod",
            "AccountingCode",
            "ChargeType",
        ],
    };
    fixed.iter().any(|c| label_is(label, c))
}

/// The catalog in row form, together with the schema its rows follow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatCatalog {
    pub schema: CatalogSchema,
    pub products: Vec<FlatProduct>,
}

impl FlatCatalog {
    #[must_use]
    pub fn new(schema: CatalogSchema) -> Self {
        Self {
            schema,
            products: Vec::new(),
        }
    }

    /// Key of `product` under this catalog's key field; empty when unset.
    #[must_use]
    pub fn product_key<'a>(&self, product: &'a FlatProduct) -> &'a str {
        product.key(&self.schema.product_key).unwrap_or_default()
    }

    #[must_use]
    pub fn rate_plan_key<'a>(&self, rate_plan: &'a FlatRatePlan) -> &'a str {
        rate_plan.key(&self.schema.rate_plan_key).unwrap_or_default()
    }

    #[must_use]
    pub fn find_product(&self, key: &str) -> Option<&FlatProduct> {
        self.products.iter().find(|p| self.product_key(p) == key)
    }

    pub fn rate_plans(&self) -> impl Iterator<Item = &FlatRatePlan> {
        self.products.iter().flat_map(|p| p.rate_plans.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_parses_sentinel_and_blank() {
        assert_eq!("".parse::<Price>().unwrap(), Price::Unset);
        assert_eq!("-1".parse::<Price>().unwrap(), Price::NotOffered);
        assert_eq!("-1.0".parse::<Price>().unwrap(), Price::NotOffered);
        assert_eq!(
            "12.50".parse::<Price>().unwrap(),
            Price::Amount(Decimal::new(1250, 2))
        );
        assert!("twelve".parse::<Price>().is_err());
    }

    #[test]
    fn price_display_keeps_scale() {
        assert_eq!(Price::Amount(Decimal::new(1250, 2)).to_string(), "12.50");
        assert_eq!(Price::NotOffered.to_string(), "-1");
        assert_eq!(Price::Unset.to_string(), "");
    }

    #[test]
    fn amounts_compare_by_value() {
        assert_eq!(
            Price::Amount(Decimal::new(10, 0)),
            Price::Amount(Decimal::new(1000, 2))
        );
    }

    #[test]
    fn first_difference_reports_lowest_ordinal() {
        let mut a = Prices::default();
        let mut b = Prices::default();
        a.set(Currency::Gbp, Price::Amount(Decimal::ONE));
        b.set(Currency::Gbp, Price::Amount(Decimal::TWO));
        a.set(Currency::Mxn, Price::NotOffered);
        assert_eq!(a.first_difference(&b), Some(Currency::Gbp));
        assert_eq!(a.first_difference(&a.clone()), None);
    }

    #[test]
    fn private_fields_drop_empty_values() {
        let fields = PrivateFields::from([("Slug", ""), ("Trial", "true")]);
        assert_eq!(fields.get("Slug"), None);
        assert_eq!(fields.get("Trial"), Some("true"));
    }

    #[test]
    fn product_key_uses_private_field_when_configured() {
        let mut product = FlatProduct::new("bronze", Some("Bronze"));
        product.private.insert("Slug", "bronze-slug");
        assert_eq!(product.key(&KeyField::Default), Some("bronze"));
        assert_eq!(
            product.key(&KeyField::Private("Slug".into())),
            Some("bronze-slug")
        );
    }

    #[test]
    fn rate_plan_field_resolves_fixed_and_private_labels() {
        let rp = FlatRatePlan {
            product_sku: "bronze".into(),
            name: Some("bronze-monthly".into()),
            billing_period: Some("Month".into()),
            private: PrivateFields::from([("NextSlug", "bronze-annual")]),
            ..FlatRatePlan::default()
        };
        assert_eq!(rp.field("billing_period"), Some("Month"));
        assert_eq!(rp.field("PRODUCTSKU"), Some("bronze"));
        assert_eq!(rp.field("next_slug"), Some("bronze-annual"));
        assert_eq!(rp.field("ChargeType"), None);
    }

    #[test]
    fn fixed_columns_are_recognised() {
        assert!(is_fixed_column(EntityKind::Product, "sku"));
        assert!(is_fixed_column(EntityKind::RatePlan, "AccountingCode"));
        assert!(!is_fixed_column(EntityKind::Product, "ChargeType"));
    }
}
