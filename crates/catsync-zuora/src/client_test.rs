use catsync_core::{EntityKind, FieldDescriptor, FieldType};

use super::*;

fn schema() -> CatalogSchema {
    CatalogSchema::new(
        vec![FieldDescriptor::new("Category", FieldType::String)],
        vec![
            FieldDescriptor::new("Slug", FieldType::String),
            FieldDescriptor::new("NextSlug", FieldType::String),
            FieldDescriptor::new("Discount", FieldType::Number).with_origin(NodeKind::Charge),
        ],
    )
    .unwrap()
    .with_key(EntityKind::RatePlan, "Slug")
    .unwrap()
}

fn test_client(base_url: &str) -> ZuoraClient {
    ZuoraClient::with_base_url(base_url, "user", "secret", 30, &schema())
        .expect("client construction should not fail")
}

#[test]
fn endpoint_appends_to_base_path() {
    let client = test_client("https://rest.apisandbox.zuora.com");
    assert_eq!(
        client.endpoint("query").unwrap().as_str(),
        "https://rest.apisandbox.zuora.com/v1/action/query"
    );
    let client = test_client("https://example.test/zuora/");
    assert_eq!(
        client.endpoint("queryMore").unwrap().as_str(),
        "https://example.test/zuora/v1/action/queryMore"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = ZuoraClient::with_base_url("not a url", "u", "p", 30, &schema());
    assert!(matches!(result, Err(ZuoraError::ApiError(_))));
}

#[test]
fn select_lists_private_fields_of_the_object_type() {
    let client = test_client("https://example.test");
    assert_eq!(
        client.select(NodeKind::Product, &[]),
        "select Id, Description, EffectiveEndDate, EffectiveStartDate, Name, SKU, category__c from Product"
    );
    assert_eq!(
        client.select(NodeKind::RatePlan, &[("ProductId", "p-1")]),
        "select Id, Description, EffectiveEndDate, EffectiveStartDate, Name, ProductId, slug__c, nextSlug__c from ProductRatePlan where ProductId = 'p-1'"
    );
    assert!(client
        .select(NodeKind::Charge, &[])
        .ends_with("ChargeType, discount__c from ProductRatePlanCharge"));
    assert!(!client.select(NodeKind::ChargeTier, &[]).contains("__c"));
}

#[test]
fn select_joins_filters_with_and() {
    let client = test_client("https://example.test");
    let zoql = client.select(
        NodeKind::Charge,
        &[("ProductRatePlanId", "rp-1"), ("BillingPeriod", "Month")],
    );
    assert!(zoql.ends_with("where ProductRatePlanId = 'rp-1' and BillingPeriod = 'Month'"));
}

#[test]
fn literals_are_quote_escaped() {
    assert_eq!(zoql_literal("bronze"), "'bronze'");
    assert_eq!(zoql_literal("o'neil"), r"'o\'neil'");
    assert_eq!(zoql_literal(r"a\' or 1=1"), r"'a\\\' or 1=1'");
}

#[test]
fn api_error_envelope_is_detected() {
    let body = serde_json::json!({
        "Success": false,
        "Errors": [{"Code": "INVALID_VALUE", "Message": "invalid field slug__c"}]
    });
    let err = ZuoraClient::check_api_error(&body).unwrap_err();
    assert!(err.to_string().contains("invalid field slug__c"));

    let ok = serde_json::json!({"records": [], "done": true});
    assert!(ZuoraClient::check_api_error(&ok).is_ok());
    assert!(ZuoraClient::check_api_error(&serde_json::json!([{"Success": false}])).is_ok());
}
