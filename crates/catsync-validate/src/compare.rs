//! One-directional catalog comparison.

use catsync_core::strings::{same_boolean, same_number, same_str};
use catsync_core::{EntityKind, FieldType, FlatCatalog, FlatProduct, FlatRatePlan, PrivateFields};

/// Buckets filled by a single [`compare`] pass.
///
/// References point into either catalog: `*_missing` and
/// `rate_plans_diff_error` hold entries of the base catalog, every other
/// bucket holds the matching entry of the other catalog.
#[derive(Debug, Default)]
pub struct PartialDiff<'a> {
    pub products_missing: Vec<&'a FlatProduct>,
    pub rate_plans_missing: Vec<&'a FlatRatePlan>,
    pub products_diff_error: Vec<&'a FlatProduct>,
    pub rate_plans_diff_error: Vec<&'a FlatRatePlan>,
    pub products_diff_ok: Vec<&'a FlatProduct>,
    pub rate_plans_diff_ok: Vec<&'a FlatRatePlan>,
    pub prices_changed: Vec<&'a FlatRatePlan>,
}

fn push_once<'a, T>(bucket: &mut Vec<&'a T>, item: &'a T) {
    if !bucket.iter().any(|seen| std::ptr::eq(*seen, item)) {
        bucket.push(item);
    }
}

fn same_value(field_type: FieldType, a: Option<&str>, b: Option<&str>) -> bool {
    match field_type {
        FieldType::Boolean => same_boolean(a, b),
        FieldType::Number => same_number(a, b),
        FieldType::String => same_str(a, b),
    }
}

/// Name of the first declared private field whose values differ.
fn first_private_difference<'s>(
    base: &'s FlatCatalog,
    entity: EntityKind,
    mine: &PrivateFields,
    theirs: &PrivateFields,
) -> Option<&'s str> {
    base.schema
        .fields(entity)
        .iter()
        .find(|d| !same_value(d.field_type, mine.get(&d.name), theirs.get(&d.name)))
        .map(|d| d.name.as_str())
}

/// Compares `base` against `other`, recording what `base` has that `other`
/// lacks or holds differently.
#[must_use]
pub fn compare<'a>(base: &'a FlatCatalog, other: &'a FlatCatalog) -> PartialDiff<'a> {
    let mut diff = PartialDiff::default();

    for product in &base.products {
        let key = base.product_key(product);
        let mut found = false;
        for peer in other.products.iter().filter(|p| other.product_key(p) == key) {
            found = true;
            compare_products(base, other, product, peer, &mut diff);
        }
        if !found {
            tracing::debug!(product = %key, "product has no peer");
            diff.products_missing.push(product);
        }
    }

    diff
}

fn compare_products<'a>(
    base: &'a FlatCatalog,
    other: &'a FlatCatalog,
    product: &'a FlatProduct,
    peer: &'a FlatProduct,
    diff: &mut PartialDiff<'a>,
) {
    let key = base.product_key(product);

    if !same_str(product.name.as_deref(), peer.name.as_deref()) {
        tracing::debug!(
            product = %key,
            base = ?product.name,
            other = ?peer.name,
            "product name differs"
        );
        diff.products_diff_error.push(peer);
    }

    if let Some(field) =
        first_private_difference(base, EntityKind::Product, &product.private, &peer.private)
    {
        tracing::debug!(product = %key, field, "product private field differs");
        push_once(&mut diff.products_diff_ok, peer);
    }

    for rate_plan in &product.rate_plans {
        let rp_key = base.rate_plan_key(rate_plan);
        let mut found = false;
        for peer_plan in peer.rate_plans.iter().filter(|p| {
            same_str(Some(rp_key), Some(other.rate_plan_key(p)))
                && same_str(rate_plan.charge_type.as_deref(), p.charge_type.as_deref())
        }) {
            found = true;
            compare_rate_plans(base, rate_plan, peer_plan, diff);
        }
        if !found {
            tracing::debug!(product = %key, rate_plan = %rp_key, "rate plan has no peer");
            diff.rate_plans_missing.push(rate_plan);
        }
    }
}

fn compare_rate_plans<'a>(
    base: &'a FlatCatalog,
    rate_plan: &'a FlatRatePlan,
    peer: &'a FlatRatePlan,
    diff: &mut PartialDiff<'a>,
) {
    let key = base.rate_plan_key(rate_plan);

    let structural = [
        ("BillingPeriod", &rate_plan.billing_period, &peer.billing_period),
        ("AccountingCode", &rate_plan.accounting_code, &peer.accounting_code),
        ("ChargeType", &rate_plan.charge_type, &peer.charge_type),
    ];
    for (field, mine, theirs) in structural {
        if !same_str(mine.as_deref(), theirs.as_deref()) {
            tracing::debug!(
                rate_plan = %key,
                field,
                base = ?mine,
                other = ?theirs,
                "rate plan differs"
            );
            diff.rate_plans_diff_error.push(rate_plan);
            return;
        }
    }

    if let Some(field) =
        first_private_difference(base, EntityKind::RatePlan, &rate_plan.private, &peer.private)
    {
        tracing::debug!(rate_plan = %key, field, "rate plan private field differs");
        push_once(&mut diff.rate_plans_diff_ok, peer);
    }

    if let Some(currency) = rate_plan.prices.first_difference(&peer.prices) {
        tracing::debug!(
            rate_plan = %key,
            currency = %currency,
            base = %rate_plan.price(currency),
            other = %peer.price(currency),
            "price differs"
        );
        diff.prices_changed.push(peer);
    }
}
