use std::future::Future;

use catsync_core::NodeKind;
use serde_json::Value;

use crate::error::ZuoraError;

/// A record as the remote service returns it: field name → JSON scalar.
pub type Row = serde_json::Map<String, Value>;

/// Outcome of a single create, update or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationResult {
    pub success: bool,
    /// Id of the created or updated object, on success.
    pub id: Option<String>,
    /// Error messages, on failure.
    pub errors: Vec<String>,
}

impl MutationResult {
    #[must_use]
    pub fn ok(id: &str) -> Self {
        Self {
            success: true,
            id: Some(id.to_string()),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            id: None,
            errors: vec![message.to_string()],
        }
    }
}

/// Case-insensitive text lookup on a row; the service answers `Id` where
/// older tooling wrote `id`.
#[must_use]
pub fn row_text<'r>(row: &'r Row, field: &str) -> Option<&'r str> {
    row.get(field)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field))
                .map(|(_, v)| v)
        })
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Catalog operations of the remote billing service.
///
/// Lookups return every matching row; callers decide whether zero or several
/// matches are an error. Key lookups take the remote field name
/// (`SKU`, `Name`, `slug__c`, ...).
pub trait CatalogService: Send + Sync {
    fn all_products(&self) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn rate_plans(
        &self,
        product_id: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn charges(
        &self,
        rate_plan_id: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn charge_tiers(
        &self,
        charge_id: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn find_product(
        &self,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn find_rate_plan(
        &self,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn find_charge(
        &self,
        rate_plan_id: &str,
        billing_period: &str,
        charge_type: &str,
    ) -> impl Future<Output = Result<Vec<Row>, ZuoraError>> + Send;

    fn create(
        &self,
        kind: NodeKind,
        object: Row,
    ) -> impl Future<Output = Result<MutationResult, ZuoraError>> + Send;

    /// Sets `fields` on the object `id`; fields not named are left alone.
    fn update(
        &self,
        kind: NodeKind,
        id: &str,
        fields: Row,
    ) -> impl Future<Output = Result<MutationResult, ZuoraError>> + Send;

    fn delete(
        &self,
        kind: NodeKind,
        id: &str,
    ) -> impl Future<Output = Result<MutationResult, ZuoraError>> + Send;
}
