//! Applies a validated diff to Zuora.
//!
//! Only the buckets that are safe to apply are touched, in this order: new
//! products, new rate plans (with their charge), product private fields,
//! rate plan name and private fields, tier prices. Every mutation is
//! preceded by a [`Confirm`] prompt; a refusal ends the run.

use std::ops::ControlFlow;

use catsync_core::{
    remote_private_fields, Currency, EntityKind, FieldValue, FlatCatalog, FlatProduct,
    FlatRatePlan, NodeKind,
};
use catsync_validate::{check_sync_preconditions, DiffResult};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::SyncError;
use crate::service::{row_text, CatalogService, MutationResult, Row};

/// Effective window of products created by a sync.
pub const PRODUCT_START_DATE: &str = "2006-01-01";
pub const PRODUCT_END_DATE: &str = "2060-01-01";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Asked before every mutation.
pub trait Confirm {
    /// `false` stops the sync; nothing after the refused change is applied.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<C: Confirm + ?Sized> Confirm for &mut C {
    fn confirm(&mut self, prompt: &str) -> bool {
        (**self).confirm(prompt)
    }
}

/// Accepts every change (`--push-through`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The diff held nothing to apply.
    NothingToDo,
    /// Every change was applied.
    Completed { applied: usize },
    /// A confirmation was refused after `applied` changes.
    Aborted { applied: usize },
}

pub struct SyncExecutor<'s, S, C> {
    service: &'s S,
    confirm: C,
    applied: usize,
}

type Step = Result<ControlFlow<()>, SyncError>;

fn row(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

fn decimal(value: Decimal) -> Value {
    FieldValue::Number(value).to_json()
}

fn ensure_success(
    result: MutationResult,
    action: &'static str,
    entity: &'static str,
    key: &str,
) -> Result<Option<String>, SyncError> {
    if result.success {
        Ok(result.id)
    } else {
        Err(SyncError::MutationFailed {
            action,
            entity,
            key: key.to_string(),
            errors: result.errors.join("; "),
        })
    }
}

/// The single row of a lookup; zero or several matches is an error.
fn single(mut rows: Vec<Row>, entity: &'static str, key: &str) -> Result<Row, SyncError> {
    if rows.len() == 1 && row_text(&rows[0], "Id").is_some() {
        Ok(rows.remove(0))
    } else {
        Err(SyncError::RemoteLookup {
            entity,
            key: key.to_string(),
            found: rows.len(),
        })
    }
}

fn id_of(row: &Row) -> &str {
    row_text(row, "Id").unwrap_or_default()
}

/// Shifts a remote effective date by `days` (negative moves back).
fn shift_date(row: &Row, field: &'static str, days: i64, key: &str) -> Result<String, SyncError> {
    let invalid = |value: &str| SyncError::InvalidRemote {
        entity: "product",
        key: key.to_string(),
        field,
        value: value.to_string(),
    };
    let raw = row_text(row, field).ok_or_else(|| invalid(""))?;
    let date = raw
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        .ok_or_else(|| invalid(raw))?;
    let step = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    };
    shifted
        .map(|d| d.format(DATE_FORMAT).to_string())
        .ok_or_else(|| invalid(raw))
}

/// Revenue recognition code Zuora expects for a billing period.
fn rev_rec_code(billing_period: &str) -> &str {
    if billing_period == "Month" {
        "Monthly"
    } else {
        billing_period
    }
}

fn charge_object(catalog: &FlatCatalog, rate_plan: &FlatRatePlan, rate_plan_id: &str) -> Row {
    let billing_period = rate_plan.billing_period.as_deref().unwrap_or_default();
    let bill_cycle_type = if billing_period == "Month" {
        "DefaultFromCustomer"
    } else {
        "SubscriptionStartDay"
    };
    let tier_fields =
        remote_private_fields(NodeKind::ChargeTier, &rate_plan.private, &catalog.schema);
    let tiers: Vec<Value> = rate_plan
        .prices
        .iter()
        .filter_map(|(currency, price)| price.amount().map(|amount| (currency, amount)))
        .map(|(currency, amount)| {
            let mut tier = tier_fields.clone();
            tier.extend(row([
                ("Active", Value::Bool(true)),
                ("Currency", text(currency.code())),
                ("Price", decimal(amount)),
            ]));
            Value::Object(tier)
        })
        .collect();

    let mut object =
        remote_private_fields(NodeKind::Charge, &rate_plan.private, &catalog.schema);
    object.extend(row([
        ("AccountingCode", text(rate_plan.accounting_code.as_deref().unwrap_or_default())),
        ("RevRecCode", text(rev_rec_code(billing_period))),
        ("ChargeModel", text("Flat Fee Pricing")),
        ("TriggerEvent", text("ContractEffective")),
        ("BillingPeriod", text(billing_period)),
        ("BillCycleType", text(bill_cycle_type)),
        ("BillingPeriodAlignment", text("AlignToCharge")),
        ("RevRecTriggerCondition", text("ContractEffectiveDate")),
        ("ProductRatePlanId", text(rate_plan_id)),
        ("ChargeType", text(rate_plan.charge_type.as_deref().unwrap_or_default())),
        (
            "ProductRatePlanChargeTierData",
            Value::Object(row([("ProductRatePlanChargeTier", Value::Array(tiers))])),
        ),
    ]));
    if let Some(name) = &rate_plan.name {
        object.insert("Name".to_string(), text(name));
    }
    object
}

impl<'s, S: CatalogService, C: Confirm> SyncExecutor<'s, S, C> {
    #[must_use]
    pub fn new(service: &'s S, confirm: C) -> Self {
        Self {
            service,
            confirm,
            applied: 0,
        }
    }

    fn ask(&mut self, prompt: &str) -> ControlFlow<()> {
        if self.confirm.confirm(prompt) {
            ControlFlow::Continue(())
        } else {
            tracing::info!(prompt, "change refused, aborting sync");
            ControlFlow::Break(())
        }
    }

    fn done(&mut self, message: &str, key: &str) {
        self.applied += 1;
        tracing::info!(key, "{message}");
    }

    /// Applies the safe buckets of `diff` to the service.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Precondition`] if anything is missing or inconsistent.
    /// - [`SyncError::RemoteLookup`] if an entity to change is not found in
    ///   Zuora exactly once.
    /// - [`SyncError::MutationFailed`] if Zuora rejects a change.
    /// - [`SyncError::Service`] on transport errors.
    pub async fn apply(&mut self, diff: &DiffResult<'_>) -> Result<SyncOutcome, SyncError> {
        if !diff.has_changes() {
            tracing::info!("nothing to sync");
            return Ok(SyncOutcome::NothingToDo);
        }
        check_sync_preconditions(diff)?;

        let catalog = diff.candidate;
        let flow = self.run(diff, catalog).await?;
        let applied = self.applied;
        Ok(match flow {
            ControlFlow::Continue(()) => {
                tracing::info!(applied, "sync complete");
                SyncOutcome::Completed { applied }
            }
            ControlFlow::Break(()) => {
                tracing::info!(applied, "sync aborted");
                SyncOutcome::Aborted { applied }
            }
        })
    }

    async fn run(&mut self, diff: &DiffResult<'_>, catalog: &FlatCatalog) -> Step {
        for product in &diff.products_new {
            if self.create_product(catalog, product).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        for rate_plan in &diff.rate_plans_new {
            if self.create_rate_plan(catalog, rate_plan).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        for product in &diff.products_diff_ok {
            if self.update_product(catalog, product).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        for rate_plan in &diff.rate_plans_diff_ok {
            if self.update_rate_plan(catalog, rate_plan).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        for rate_plan in &diff.prices_changed {
            if self.update_prices(catalog, rate_plan).await?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn create_product(&mut self, catalog: &FlatCatalog, product: &FlatProduct) -> Step {
        let key = catalog.product_key(product);
        if self.ask(&format!("Create new product {key}")).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let mut object =
            remote_private_fields(NodeKind::Product, &product.private, &catalog.schema);
        object.extend(row([
            ("EffectiveStartDate", text(PRODUCT_START_DATE)),
            ("EffectiveEndDate", text(PRODUCT_END_DATE)),
            ("SKU", text(&product.sku)),
        ]));
        if let Some(name) = &product.name {
            object.insert("Name".to_string(), text(name));
        }

        let result = self.service.create(NodeKind::Product, object).await?;
        ensure_success(result, "create", "product", key)?;
        self.done("created product", key);
        Ok(ControlFlow::Continue(()))
    }

    async fn create_rate_plan(&mut self, catalog: &FlatCatalog, rate_plan: &FlatRatePlan) -> Step {
        let key = catalog.rate_plan_key(rate_plan);
        let product = single(
            self.service.find_product("SKU", &rate_plan.product_sku).await?,
            "product",
            &rate_plan.product_sku,
        )?;
        if self.ask(&format!("Create new rate plan {key}")).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        // The rate plan window must sit strictly inside the product's.
        let start = shift_date(&product, "EffectiveStartDate", 1, &rate_plan.product_sku)?;
        let end = shift_date(&product, "EffectiveEndDate", -1, &rate_plan.product_sku)?;
        let mut object =
            remote_private_fields(NodeKind::RatePlan, &rate_plan.private, &catalog.schema);
        object.extend(row([
            ("EffectiveStartDate", text(&start)),
            ("EffectiveEndDate", text(&end)),
            ("ProductId", text(id_of(&product))),
        ]));
        if let Some(name) = &rate_plan.name {
            object.insert("Name".to_string(), text(name));
        }

        let result = self.service.create(NodeKind::RatePlan, object).await?;
        let rate_plan_id = ensure_success(result, "create", "rate plan", key)?.ok_or_else(|| {
            SyncError::MutationFailed {
                action: "create",
                entity: "rate plan",
                key: key.to_string(),
                errors: "no id returned".to_string(),
            }
        })?;

        if rate_plan.charge_type.is_some() {
            let charge = charge_object(catalog, rate_plan, &rate_plan_id);
            let result = self.service.create(NodeKind::Charge, charge).await?;
            ensure_success(result, "create", "charge", key)?;
        } else {
            tracing::warn!(rate_plan = %key, "no charge type, rate plan created without charge");
        }
        tracing::info!(rate_plan = %key, id = %rate_plan_id, "created rate plan");
        self.applied += 1;
        Ok(ControlFlow::Continue(()))
    }

    async fn update_product(&mut self, catalog: &FlatCatalog, product: &FlatProduct) -> Step {
        let key = catalog.product_key(product);
        let field = catalog
            .schema
            .product_key
            .remote_name(EntityKind::Product, &catalog.schema);
        let remote = single(
            self.service.find_product(&field, key).await?,
            "product",
            key,
        )?;
        if self.ask(&format!("Update product {key}")).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let fields = remote_private_fields(NodeKind::Product, &product.private, &catalog.schema);
        let result = self
            .service
            .update(NodeKind::Product, id_of(&remote), fields)
            .await?;
        ensure_success(result, "update", "product", key)?;
        self.done("updated product", key);
        Ok(ControlFlow::Continue(()))
    }

    async fn find_rate_plan(
        &self,
        catalog: &FlatCatalog,
        rate_plan: &FlatRatePlan,
    ) -> Result<Row, SyncError> {
        let key = catalog.rate_plan_key(rate_plan);
        let field = catalog
            .schema
            .rate_plan_key
            .remote_name(EntityKind::RatePlan, &catalog.schema);
        single(
            self.service.find_rate_plan(&field, key).await?,
            "rate plan",
            key,
        )
    }

    async fn find_charge(
        &self,
        catalog: &FlatCatalog,
        rate_plan: &FlatRatePlan,
        rate_plan_id: &str,
    ) -> Result<Row, SyncError> {
        let key = catalog.rate_plan_key(rate_plan);
        let rows = self
            .service
            .find_charge(
                rate_plan_id,
                rate_plan.billing_period.as_deref().unwrap_or_default(),
                rate_plan.charge_type.as_deref().unwrap_or_default(),
            )
            .await?;
        single(rows, "charge", key)
    }

    async fn update_rate_plan(&mut self, catalog: &FlatCatalog, rate_plan: &FlatRatePlan) -> Step {
        let key = catalog.rate_plan_key(rate_plan);
        let remote = self.find_rate_plan(catalog, rate_plan).await?;
        if self.ask(&format!("Update rate plan {key}")).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let mut fields =
            remote_private_fields(NodeKind::RatePlan, &rate_plan.private, &catalog.schema);
        if let Some(name) = &rate_plan.name {
            fields.insert("Name".to_string(), text(name));
        }
        let result = self
            .service
            .update(NodeKind::RatePlan, id_of(&remote), fields)
            .await?;
        ensure_success(result, "update", "rate plan", key)?;

        let charge_fields =
            remote_private_fields(NodeKind::Charge, &rate_plan.private, &catalog.schema);
        if !charge_fields.is_empty() && rate_plan.charge_type.is_some() {
            let charge = self.find_charge(catalog, rate_plan, id_of(&remote)).await?;
            let result = self
                .service
                .update(NodeKind::Charge, id_of(&charge), charge_fields)
                .await?;
            ensure_success(result, "update", "charge", key)?;
        }

        self.done("updated rate plan", key);
        Ok(ControlFlow::Continue(()))
    }

    async fn update_prices(&mut self, catalog: &FlatCatalog, rate_plan: &FlatRatePlan) -> Step {
        let key = catalog.rate_plan_key(rate_plan);
        let remote = self.find_rate_plan(catalog, rate_plan).await?;
        let charge = self.find_charge(catalog, rate_plan, id_of(&remote)).await?;

        for tier in self.service.charge_tiers(id_of(&charge)).await? {
            let Some(currency) = row_text(&tier, "Currency").and_then(Currency::from_code) else {
                tracing::warn!(
                    rate_plan = %key,
                    tier = ?row_text(&tier, "Id"),
                    "tier with unknown currency, skipping"
                );
                continue;
            };
            let current = tier
                .get("Price")
                .and_then(FieldValue::from_json)
                .and_then(|v| v.as_decimal());
            let Some(wanted) = rate_plan.price(currency).amount() else {
                tracing::warn!(
                    rate_plan = %key,
                    currency = %currency,
                    "currency not offered in file, keeping Zuora tier"
                );
                continue;
            };
            if current == Some(wanted) {
                continue;
            }

            let previous = current.map_or_else(|| "none".to_string(), |d| d.to_string());
            let prompt = format!("Update {key} currency {currency} from {previous} -> {wanted}");
            if self.ask(&prompt).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            let result = self
                .service
                .update(
                    NodeKind::ChargeTier,
                    id_of(&tier),
                    row([("Price", decimal(wanted))]),
                )
                .await?;
            ensure_success(result, "update price of", "rate plan", key)?;
            self.applied += 1;
            tracing::info!(
                rate_plan = %key,
                currency = %currency,
                from = %previous,
                to = %wanted,
                "updated price"
            );
        }
        Ok(ControlFlow::Continue(()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product_row(start: &str, end: &str) -> Row {
        let value = json!({
            "Id": "p-1",
            "EffectiveStartDate": start,
            "EffectiveEndDate": end
        });
        let Value::Object(row) = value else {
            unreachable!()
        };
        row
    }

    #[test]
    fn rate_plan_window_sits_inside_the_product() {
        let row = product_row("2006-01-01", "2060-01-01T00:00:00.000Z");
        assert_eq!(shift_date(&row, "EffectiveStartDate", 1, "bronze").unwrap(), "2006-01-02");
        assert_eq!(shift_date(&row, "EffectiveEndDate", -1, "bronze").unwrap(), "2059-12-31");
    }

    #[test]
    fn unparseable_date_is_reported() {
        let row = product_row("someday", "");
        let err = shift_date(&row, "EffectiveStartDate", 1, "bronze").unwrap_err();
        assert!(
            matches!(
                err,
                SyncError::InvalidRemote { field: "EffectiveStartDate", ref value, .. }
                    if value == "someday"
            ),
            "got: {err:?}"
        );
        assert!(shift_date(&row, "EffectiveEndDate", -1, "bronze").is_err());
    }

    #[test]
    fn monthly_billing_uses_monthly_rev_rec_code() {
        assert_eq!(rev_rec_code("Month"), "Monthly");
        assert_eq!(rev_rec_code("Annual"), "Annual");
    }

    #[test]
    fn lookups_need_exactly_one_row() {
        let err = single(Vec::new(), "product", "bronze").unwrap_err();
        assert!(matches!(err, SyncError::RemoteLookup { found: 0, .. }));
        let rows = vec![product_row("", ""), product_row("", "")];
        assert!(matches!(
            single(rows, "product", "bronze"),
            Err(SyncError::RemoteLookup { found: 2, .. })
        ));
        assert!(single(vec![product_row("", "")], "product", "bronze").is_ok());
    }
}
