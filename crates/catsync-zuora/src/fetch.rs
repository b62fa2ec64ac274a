use catsync_core::{CatalogNode, CatalogTree, NodeKind};

use crate::error::ZuoraError;
use crate::service::{row_text, CatalogService, Row};

fn row_id<'r>(row: &'r Row, kind: NodeKind) -> Result<&'r str, ZuoraError> {
    row_text(row, "Id").ok_or_else(|| ZuoraError::ApiError(format!("{kind} row without Id")))
}

/// Downloads the whole catalog: every product, then per product its rate
/// plans, per rate plan its charges, per charge its tiers.
///
/// With `product_filter` only the product with that SKU is walked.
///
/// # Errors
///
/// Returns the first [`ZuoraError`] of any lookup, or
/// [`ZuoraError::ApiError`] if a row carries no `Id`.
pub async fn fetch_catalog<S: CatalogService>(
    service: &S,
    product_filter: Option<&str>,
) -> Result<CatalogTree, ZuoraError> {
    let mut products = Vec::new();

    for product_row in service.all_products().await? {
        let mut product = CatalogNode::from_row(NodeKind::Product, &product_row);
        if let Some(sku) = product_filter {
            if product.text("SKU").as_deref() != Some(sku) {
                continue;
            }
        }
        tracing::debug!(product = ?product.text("SKU"), "fetching product");

        for plan_row in service
            .rate_plans(row_id(&product_row, NodeKind::Product)?)
            .await?
        {
            let mut plan = CatalogNode::from_row(NodeKind::RatePlan, &plan_row);
            for charge_row in service
                .charges(row_id(&plan_row, NodeKind::RatePlan)?)
                .await?
            {
                let mut charge = CatalogNode::from_row(NodeKind::Charge, &charge_row);
                for tier_row in service
                    .charge_tiers(row_id(&charge_row, NodeKind::Charge)?)
                    .await?
                {
                    charge.push_child(CatalogNode::from_row(NodeKind::ChargeTier, &tier_row));
                }
                plan.push_child(charge);
            }
            product.push_child(plan);
        }

        products.push(product);
    }

    tracing::info!(products = products.len(), "fetched catalog");
    Ok(CatalogTree::new(products))
}
