//! Declarative per-field checks applied to imported rows.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::flat::{is_fixed_column, FlatProduct, FlatRatePlan};
use crate::schema::{CatalogSchema, EntityKind};
use crate::{ConfigError, CoreError};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSanityFile {
    #[serde(default)]
    product: BTreeMap<String, RawRule>,
    #[serde(default)]
    rate_plan: BTreeMap<String, RawRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    required: bool,
    pattern: Option<String>,
    #[serde(default)]
    one_of: Vec<String>,
}

#[derive(Debug, Clone)]
struct FieldRule {
    field: String,
    required: bool,
    pattern: Option<Regex>,
    one_of: Vec<String>,
}

impl FieldRule {
    /// Returns the violated rule, if any.
    fn violation(&self, value: Option<&str>) -> Option<String> {
        let value = value.filter(|v| !v.is_empty());
        let Some(value) = value else {
            return self.required.then(|| "is required".to_string());
        };
        if let Some(re) = &self.pattern {
            if !re.is_match(value) {
                return Some(format!("value '{value}' does not match {}", re.as_str()));
            }
        }
        if !self.one_of.is_empty() && !self.one_of.iter().any(|v| v == value) {
            return Some(format!(
                "value '{value}' is not one of [{}]",
                self.one_of.join(", ")
            ));
        }
        None
    }
}

/// Field rules for both row kinds. The default value checks nothing.
#[derive(Debug, Clone, Default)]
pub struct SanityRules {
    product: Vec<FieldRule>,
    rate_plan: Vec<FieldRule>,
}

impl SanityRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.product.is_empty() && self.rate_plan.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Sanity`] for the first violated rule.
    pub fn check_product(&self, product: &FlatProduct, key: &str) -> Result<(), CoreError> {
        check(&self.product, EntityKind::Product, key, |f| product.field(f))
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Sanity`] for the first violated rule.
    pub fn check_rate_plan(&self, rate_plan: &FlatRatePlan, key: &str) -> Result<(), CoreError> {
        check(&self.rate_plan, EntityKind::RatePlan, key, |f| {
            rate_plan.field(f)
        })
    }
}

fn check<'a, F>(rules: &[FieldRule], entity: EntityKind, key: &str, get: F) -> Result<(), CoreError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    for rule in rules {
        if let Some(reason) = rule.violation(get(&rule.field)) {
            return Err(CoreError::Sanity {
                entity,
                key: key.to_string(),
                field: rule.field.clone(),
                reason,
            });
        }
    }
    Ok(())
}

fn compile(
    entity: EntityKind,
    raw: BTreeMap<String, RawRule>,
    schema: &CatalogSchema,
) -> Result<Vec<FieldRule>, ConfigError> {
    raw.into_iter()
        .map(|(field, rule)| {
            let field = if is_fixed_column(entity, &field) {
                field
            } else {
                schema
                    .descriptor(entity, &field)
                    .map(|d| d.name.clone())
                    .ok_or_else(|| {
                        ConfigError::Validation(format!(
                            "sanity rule for unknown {entity} field '{field}'"
                        ))
                    })?
            };
            let pattern = rule
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| {
                    ConfigError::Validation(format!(
                        "invalid pattern for {entity} field '{field}': {e}"
                    ))
                })?;
            Ok(FieldRule {
                field,
                required: rule.required,
                pattern,
                one_of: rule.one_of,
            })
        })
        .collect()
}

/// Parses sanity rules from YAML text, resolving field names against
/// `schema`.
///
/// # Errors
///
/// Returns [`ConfigError::FileParse`] for malformed YAML and
/// [`ConfigError::Validation`] for unknown fields or invalid patterns.
pub fn parse_sanity_rules(
    content: &str,
    schema: &CatalogSchema,
) -> Result<SanityRules, ConfigError> {
    let raw: RawSanityFile = serde_yaml::from_str(content).map_err(ConfigError::FileParse)?;
    Ok(SanityRules {
        product: compile(EntityKind::Product, raw.product, schema)?,
        rate_plan: compile(EntityKind::RatePlan, raw.rate_plan, schema)?,
    })
}

/// Load sanity rules from the YAML file at `path`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or a rule is invalid.
pub fn load_sanity_rules(path: &Path, schema: &CatalogSchema) -> Result<SanityRules, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let rules = parse_sanity_rules(&content, schema)?;
    tracing::debug!(
        path = %path.display(),
        product_rules = rules.product.len(),
        rate_plan_rules = rules.rate_plan.len(),
        "loaded sanity rules"
    );
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::PrivateFields;
    use crate::schema::{FieldDescriptor, FieldType};

    fn schema() -> CatalogSchema {
        CatalogSchema::new(
            vec![],
            vec![FieldDescriptor::new("Slug", FieldType::String)],
        )
        .unwrap()
    }

    const RULES: &str = r#"
product:
  SKU: { required: true, pattern: "^[a-z0-9-]+$" }
rate_plan:
  billing_period: { one_of: [Month, Annual] }
  slug: { required: true }
"#;

    #[test]
    fn product_pattern_is_enforced() {
        let rules = parse_sanity_rules(RULES, &schema()).unwrap();
        assert!(rules
            .check_product(&FlatProduct::new("bronze-1", None), "bronze-1")
            .is_ok());
        let err = rules
            .check_product(&FlatProduct::new("Bronze 1", None), "Bronze 1")
            .unwrap_err();
        assert!(err.to_string().starts_with("product 'Bronze 1': field SKU value"));
    }

    #[test]
    fn rate_plan_rules_resolve_private_fields() {
        let rules = parse_sanity_rules(RULES, &schema()).unwrap();
        let mut rp = FlatRatePlan {
            name: Some("bronze-monthly".into()),
            billing_period: Some("Month".into()),
            ..FlatRatePlan::default()
        };
        let err = rules.check_rate_plan(&rp, "bronze-monthly").unwrap_err();
        assert!(matches!(err, CoreError::Sanity { ref field, .. } if field == "Slug"));

        rp.private = PrivateFields::from([("Slug", "bronze-monthly")]);
        assert!(rules.check_rate_plan(&rp, "bronze-monthly").is_ok());

        rp.billing_period = Some("Week".into());
        let err = rules.check_rate_plan(&rp, "bronze-monthly").unwrap_err();
        assert!(err.to_string().contains("is not one of [Month, Annual]"));
    }

    #[test]
    fn blank_optional_value_passes_pattern() {
        let rules = parse_sanity_rules(
            "rate_plan:\n  AccountingCode: { pattern: \"^[0-9]+$\" }\n",
            &schema(),
        )
        .unwrap();
        assert!(rules
            .check_rate_plan(&FlatRatePlan::default(), "x")
            .is_ok());
    }

    #[test]
    fn unknown_field_is_a_config_error() {
        let err = parse_sanity_rules("product:\n  Colour: { required: true }\n", &schema())
            .unwrap_err();
        assert!(err.to_string().contains("unknown product field 'Colour'"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = parse_sanity_rules("product:\n  SKU: { pattern: \"[\" }\n", &schema())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn unknown_rule_key_is_rejected() {
        assert!(parse_sanity_rules("product:\n  SKU: { max: 3 }\n", &schema()).is_err());
    }

    #[test]
    fn load_sanity_rules_from_example_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("sanity.example.yaml");
        let rules = load_sanity_rules(&path, &schema()).unwrap();
        assert!(!rules.is_empty());
    }
}
