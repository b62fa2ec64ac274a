//! HTTP client for the Zuora REST action API.
//!
//! Reads go through ZOQL (`v1/action/query`, then `v1/action/queryMore`
//! until the result set is exhausted); writes go through
//! `v1/action/create|update|delete`, one object per call. Every query pulls
//! the declared private fields of the object type alongside the standard
//! ones.

use std::time::Duration;

use catsync_core::{CatalogSchema, EnvironmentConfig, NodeKind};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

use crate::error::ZuoraError;
use crate::service::{CatalogService, MutationResult, Row};
use crate::types::{
    ActionRequest, DeleteRequest, QueryMoreRequest, QueryRequest, QueryResponse, SaveResult,
};

const PRODUCT_FIELDS: &str = "Id, Description, EffectiveEndDate, EffectiveStartDate, Name, SKU";
const RATE_PLAN_FIELDS: &str =
    "Id, Description, EffectiveEndDate, EffectiveStartDate, Name, ProductId";
const CHARGE_FIELDS: &str = "Id, AccountingCode, DefaultQuantity, MaxQuantity, MinQuantity, Name, ProductRatePlanId, BillingPeriod, ChargeType";
const CHARGE_TIER_FIELDS: &str = "Id, ProductRatePlanChargeId, Price, Currency, Tier";

/// Client for the Zuora REST API.
///
/// Use [`ZuoraClient::from_environment`] with a loaded config or
/// [`ZuoraClient::with_base_url`] to point at a mock server in tests.
pub struct ZuoraClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    schema: CatalogSchema,
}

/// Quotes `value` as a ZOQL string literal.
fn zoql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl ZuoraClient {
    /// Builds a client for a non-dump environment.
    ///
    /// # Errors
    ///
    /// Returns [`ZuoraError::MissingUrl`] if the environment has no url, or
    /// the errors of [`ZuoraClient::with_base_url`].
    pub fn from_environment(
        environment: &EnvironmentConfig,
        schema: &CatalogSchema,
    ) -> Result<Self, ZuoraError> {
        let settings = &environment.zuora;
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| ZuoraError::MissingUrl(environment.name.clone()))?;
        Self::with_base_url(
            url,
            settings.username.as_deref().unwrap_or_default(),
            settings.password.as_deref().unwrap_or_default(),
            settings.timeout_secs,
            schema,
        )
    }

    /// # Errors
    ///
    /// Returns [`ZuoraError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ZuoraError::ApiError`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        base_url: &str,
        username: &str,
        password: &str,
        timeout_secs: u64,
        schema: &CatalogSchema,
    ) -> Result<Self, ZuoraError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("catsync/0.1 (catalog-sync)")
            .build()?;

        // Trailing slash so `join` appends to the base path instead of
        // replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ZuoraError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            base_url,
            username: username.to_owned(),
            password: password.to_owned(),
            schema: schema.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> Result<Url, ZuoraError> {
        self.base_url
            .join(&format!("v1/action/{action}"))
            .map_err(|e| ZuoraError::ApiError(format!("invalid endpoint '{action}': {e}")))
    }

    /// Standard fields of `kind` followed by its private fields.
    fn select_list(&self, kind: NodeKind) -> String {
        let standard = match kind {
            NodeKind::Product => PRODUCT_FIELDS,
            NodeKind::RatePlan => RATE_PLAN_FIELDS,
            NodeKind::Charge => CHARGE_FIELDS,
            NodeKind::ChargeTier => CHARGE_TIER_FIELDS,
        };
        let mut fields = standard.to_string();
        for descriptor in self.schema.remote_fields(kind) {
            fields.push_str(", ");
            fields.push_str(&self.schema.remote_field_name(&descriptor.name));
        }
        fields
    }

    fn select(&self, kind: NodeKind, filters: &[(&str, &str)]) -> String {
        let mut zoql = format!("select {} from {}", self.select_list(kind), kind.remote_name());
        for (i, (field, value)) in filters.iter().enumerate() {
            zoql.push_str(if i == 0 { " where " } else { " and " });
            zoql.push_str(field);
            zoql.push_str(" = ");
            zoql.push_str(&zoql_literal(value));
        }
        zoql
    }

    /// POSTs `body` to `action`, asserts a 2xx status and parses the JSON
    /// answer.
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<Value, ZuoraError> {
        let url = self.endpoint(action)?;
        let response = self
            .client
            .post(url.clone())
            .header("apiAccessKeyId", &self.username)
            .header("apiSecretAccessKey", &self.password)
            .json(body)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| ZuoraError::Deserialize {
            context: url.to_string(),
            source: e,
        })?;
        Self::check_api_error(&body)?;
        Ok(body)
    }

    /// Zuora reports request-level failures with a 200 and
    /// `{"Success": false, "Errors": [...]}`.
    fn check_api_error(body: &Value) -> Result<(), ZuoraError> {
        let Some(object) = body.as_object() else {
            return Ok(());
        };
        if object.get("Success").and_then(Value::as_bool) != Some(false) {
            return Ok(());
        }
        let messages: Vec<String> = object
            .get("Errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("Message").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if messages.is_empty() {
            Err(ZuoraError::ApiError("unknown error".to_string()))
        } else {
            Err(ZuoraError::ApiError(messages.join("; ")))
        }
    }

    /// Runs a ZOQL query and pulls every page.
    ///
    /// # Errors
    ///
    /// - [`ZuoraError::ApiError`] if Zuora rejects the query.
    /// - [`ZuoraError::Http`] on network failure or non-2xx HTTP status.
    /// - [`ZuoraError::Deserialize`] if a page does not match the expected
    ///   shape.
    pub async fn query(&self, zoql: &str) -> Result<Vec<Row>, ZuoraError> {
        tracing::debug!(zoql, "zuora query");
        let body = self
            .post_json("query", &QueryRequest { query_string: zoql })
            .await?;
        let mut page = Self::parse_page(body, zoql)?;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(locator) = page.query_locator.take() else {
                return Err(ZuoraError::ApiError(format!(
                    "query not done but no locator returned: {zoql}"
                )));
            };
            let body = self
                .post_json(
                    "queryMore",
                    &QueryMoreRequest {
                        query_locator: &locator,
                    },
                )
                .await?;
            page = Self::parse_page(body, zoql)?;
            records.append(&mut page.records);
        }

        tracing::debug!(zoql, rows = records.len(), "zuora query done");
        Ok(records)
    }

    fn parse_page(body: Value, zoql: &str) -> Result<QueryResponse, ZuoraError> {
        serde_json::from_value(body).map_err(|e| ZuoraError::Deserialize {
            context: format!("query({zoql})"),
            source: e,
        })
    }

    async fn save(
        &self,
        action: &str,
        body: &impl Serialize,
    ) -> Result<MutationResult, ZuoraError> {
        let answer = self.post_json(action, body).await?;
        let results: Vec<SaveResult> =
            serde_json::from_value(answer).map_err(|e| ZuoraError::Deserialize {
                context: format!("{action} result"),
                source: e,
            })?;
        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| ZuoraError::ApiError(format!("empty {action} result")))?;
        Ok(MutationResult {
            success: result.success,
            id: result.id,
            errors: result
                .errors
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }
}

impl CatalogService for ZuoraClient {
    async fn all_products(&self) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(NodeKind::Product, &[])).await
    }

    async fn rate_plans(&self, product_id: &str) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(NodeKind::RatePlan, &[("ProductId", product_id)]))
            .await
    }

    async fn charges(&self, rate_plan_id: &str) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(NodeKind::Charge, &[("ProductRatePlanId", rate_plan_id)]))
            .await
    }

    async fn charge_tiers(&self, charge_id: &str) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(
            NodeKind::ChargeTier,
            &[("ProductRatePlanChargeId", charge_id)],
        ))
        .await
    }

    async fn find_product(&self, field: &str, value: &str) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(NodeKind::Product, &[(field, value)]))
            .await
    }

    async fn find_rate_plan(&self, field: &str, value: &str) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(NodeKind::RatePlan, &[(field, value)]))
            .await
    }

    async fn find_charge(
        &self,
        rate_plan_id: &str,
        billing_period: &str,
        charge_type: &str,
    ) -> Result<Vec<Row>, ZuoraError> {
        self.query(&self.select(
            NodeKind::Charge,
            &[
                ("ProductRatePlanId", rate_plan_id),
                ("BillingPeriod", billing_period),
                ("ChargeType", charge_type),
            ],
        ))
        .await
    }

    async fn create(&self, kind: NodeKind, object: Row) -> Result<MutationResult, ZuoraError> {
        tracing::debug!(kind = %kind, "zuora create");
        self.save(
            "create",
            &ActionRequest {
                object_type: kind.remote_name(),
                objects: vec![object],
            },
        )
        .await
    }

    async fn update(
        &self,
        kind: NodeKind,
        id: &str,
        mut fields: Row,
    ) -> Result<MutationResult, ZuoraError> {
        tracing::debug!(kind = %kind, id, "zuora update");
        fields.insert("Id".to_string(), Value::String(id.to_string()));
        self.save(
            "update",
            &ActionRequest {
                object_type: kind.remote_name(),
                objects: vec![fields],
            },
        )
        .await
    }

    async fn delete(&self, kind: NodeKind, id: &str) -> Result<MutationResult, ZuoraError> {
        tracing::debug!(kind = %kind, id, "zuora delete");
        self.save(
            "delete",
            &DeleteRequest {
                object_type: kind.remote_name(),
                ids: vec![id],
            },
        )
        .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
