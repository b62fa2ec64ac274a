use catsync_core::{FlatCatalog, FlatProduct, FlatRatePlan};

use crate::compare::compare;
use crate::error::ValidationError;

/// Outcome of [`cross_validate`]: every difference between a reference
/// catalog and a candidate, classified.
///
/// `products_missing`, `rate_plans_missing` and `rate_plans_diff_error` point
/// into the reference; all other buckets point into the candidate.
#[derive(Debug)]
pub struct DiffResult<'a> {
    pub reference: &'a FlatCatalog,
    pub candidate: &'a FlatCatalog,
    pub products_missing: Vec<&'a FlatProduct>,
    pub rate_plans_missing: Vec<&'a FlatRatePlan>,
    pub products_diff_error: Vec<&'a FlatProduct>,
    pub rate_plans_diff_error: Vec<&'a FlatRatePlan>,
    pub products_new: Vec<&'a FlatProduct>,
    pub rate_plans_new: Vec<&'a FlatRatePlan>,
    pub products_diff_ok: Vec<&'a FlatProduct>,
    pub rate_plans_diff_ok: Vec<&'a FlatRatePlan>,
    pub prices_changed: Vec<&'a FlatRatePlan>,
}

/// Bucket sizes, in the order the report prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffCounts {
    pub products_missing: usize,
    pub rate_plans_missing: usize,
    pub products_diff_error: usize,
    pub rate_plans_diff_error: usize,
    pub products_new: usize,
    pub rate_plans_new: usize,
    pub products_diff_ok: usize,
    pub rate_plans_diff_ok: usize,
    pub prices_changed: usize,
}

impl DiffCounts {
    #[must_use]
    pub fn as_array(&self) -> [usize; 9] {
        [
            self.products_missing,
            self.rate_plans_missing,
            self.products_diff_error,
            self.rate_plans_diff_error,
            self.products_new,
            self.rate_plans_new,
            self.products_diff_ok,
            self.rate_plans_diff_ok,
            self.prices_changed,
        ]
    }
}

impl std::fmt::Display for DiffCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "missing products:        {}", self.products_missing)?;
        writeln!(f, "missing rate plans:      {}", self.rate_plans_missing)?;
        writeln!(f, "product inconsistencies: {}", self.products_diff_error)?;
        writeln!(f, "rate plan inconsistencies: {}", self.rate_plans_diff_error)?;
        writeln!(f, "new products:            {}", self.products_new)?;
        writeln!(f, "new rate plans:          {}", self.rate_plans_new)?;
        writeln!(f, "product differences:     {}", self.products_diff_ok)?;
        writeln!(f, "rate plan differences:   {}", self.rate_plans_diff_ok)?;
        write!(f, "price changes:           {}", self.prices_changed)
    }
}

impl<'a> DiffResult<'a> {
    #[must_use]
    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            products_missing: self.products_missing.len(),
            rate_plans_missing: self.rate_plans_missing.len(),
            products_diff_error: self.products_diff_error.len(),
            rate_plans_diff_error: self.rate_plans_diff_error.len(),
            products_new: self.products_new.len(),
            rate_plans_new: self.rate_plans_new.len(),
            products_diff_ok: self.products_diff_ok.len(),
            rate_plans_diff_ok: self.rate_plans_diff_ok.len(),
            prices_changed: self.prices_changed.len(),
        }
    }

    /// True when no bucket holds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts().as_array().iter().all(|n| *n == 0)
    }

    /// True when there is something a sync could apply.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.products_new.is_empty()
            && self.rate_plans_new.is_empty()
            && self.products_diff_ok.is_empty()
            && self.rate_plans_diff_ok.is_empty()
            && self.prices_changed.is_empty())
    }

    fn product_keys(catalog: &FlatCatalog, bucket: &[&FlatProduct]) -> String {
        bucket
            .iter()
            .map(|p| catalog.product_key(p))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn rate_plan_keys(catalog: &FlatCatalog, bucket: &[&FlatRatePlan]) -> String {
        bucket
            .iter()
            .map(|rp| catalog.rate_plan_key(rp))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Each bucket as (label, keys), keys resolved against the catalog the
    /// bucket points into.
    #[must_use]
    pub fn buckets(&self) -> [(&'static str, usize, String); 9] {
        let (r, c) = (self.reference, self.candidate);
        [
            (
                "missing products",
                self.products_missing.len(),
                Self::product_keys(r, &self.products_missing),
            ),
            (
                "missing rate plans",
                self.rate_plans_missing.len(),
                Self::rate_plan_keys(r, &self.rate_plans_missing),
            ),
            (
                "product inconsistencies",
                self.products_diff_error.len(),
                Self::product_keys(c, &self.products_diff_error),
            ),
            (
                "rate plan inconsistencies",
                self.rate_plans_diff_error.len(),
                Self::rate_plan_keys(r, &self.rate_plans_diff_error),
            ),
            (
                "new products",
                self.products_new.len(),
                Self::product_keys(c, &self.products_new),
            ),
            (
                "new rate plans",
                self.rate_plans_new.len(),
                Self::rate_plan_keys(c, &self.rate_plans_new),
            ),
            (
                "product differences",
                self.products_diff_ok.len(),
                Self::product_keys(c, &self.products_diff_ok),
            ),
            (
                "rate plan differences",
                self.rate_plans_diff_ok.len(),
                Self::rate_plan_keys(c, &self.rate_plans_diff_ok),
            ),
            (
                "price changes",
                self.prices_changed.len(),
                Self::rate_plan_keys(c, &self.prices_changed),
            ),
        ]
    }

    fn log(&self) {
        for (bucket, count, keys) in self.buckets() {
            if count == 0 {
                tracing::info!(bucket, "OK");
            } else {
                tracing::info!(bucket, count, keys = %keys, "NOK");
            }
        }
    }
}

fn ensure_same(
    what: &'static str,
    forward: usize,
    reverse: usize,
) -> Result<(), ValidationError> {
    if forward == reverse {
        Ok(())
    } else {
        tracing::warn!(what, forward, reverse, "comparison passes disagree");
        Err(ValidationError::Consistency {
            what,
            forward,
            reverse,
        })
    }
}

/// Compares `candidate` to `reference` in both directions.
///
/// The forward pass fills the missing, error, tolerable-difference and
/// price buckets; the missing lists of the reverse pass become the new
/// buckets.
///
/// # Errors
///
/// Returns [`ValidationError::Consistency`] if the two passes report a
/// different number of product or rate plan inconsistencies or price changes.
pub fn cross_validate<'a>(
    reference: &'a FlatCatalog,
    candidate: &'a FlatCatalog,
) -> Result<DiffResult<'a>, ValidationError> {
    tracing::info!("comparing reference catalog to candidate");
    let forward = compare(reference, candidate);
    tracing::info!("comparing candidate catalog to reference");
    let reverse = compare(candidate, reference);

    ensure_same(
        "product inconsistency",
        forward.products_diff_error.len(),
        reverse.products_diff_error.len(),
    )?;
    ensure_same(
        "rate plan inconsistency",
        forward.rate_plans_diff_error.len(),
        reverse.rate_plans_diff_error.len(),
    )?;
    ensure_same(
        "price change",
        forward.prices_changed.len(),
        reverse.prices_changed.len(),
    )?;

    let result = DiffResult {
        reference,
        candidate,
        products_missing: forward.products_missing,
        rate_plans_missing: forward.rate_plans_missing,
        products_diff_error: forward.products_diff_error,
        rate_plans_diff_error: forward.rate_plans_diff_error,
        products_new: reverse.products_missing,
        rate_plans_new: reverse.rate_plans_missing,
        products_diff_ok: forward.products_diff_ok,
        rate_plans_diff_ok: forward.rate_plans_diff_ok,
        prices_changed: forward.prices_changed,
    };
    result.log();
    Ok(result)
}

/// Refuses a sync while anything is missing or inconsistent; only new
/// entities, tolerable differences and price changes may be applied.
///
/// # Errors
///
/// Returns [`ValidationError::Precondition`] naming the first non-empty
/// blocking bucket.
pub fn check_sync_preconditions(diff: &DiffResult<'_>) -> Result<(), ValidationError> {
    let [missing_products, missing_rate_plans, product_errors, rate_plan_errors, ..] =
        diff.buckets();
    for (bucket, count, keys) in [
        missing_products,
        missing_rate_plans,
        product_errors,
        rate_plan_errors,
    ] {
        if count > 0 {
            tracing::warn!(bucket, keys = %keys, "cannot sync");
            return Err(ValidationError::Precondition { bucket, keys });
        }
    }
    Ok(())
}
