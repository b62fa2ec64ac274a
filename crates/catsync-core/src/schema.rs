//! Private field schema: which deployment-specific columns a catalog carries
//! and in which order.
//!
//! The schema is derived once from configuration and then owned by a
//! [`crate::FlatCatalog`]. Serializer and parser both walk it, so the column
//! order it holds is the column order of the text export.

use serde::{Deserialize, Serialize};

use crate::app_config::CatalogConfig;
use crate::strings::{camel_to_underscore, same_field_name};
use crate::tree::NodeKind;
use crate::ConfigError;

/// The two row kinds of the flat catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Product,
    RatePlan,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Product => write!(f, "product"),
            EntityKind::RatePlan => write!(f, "rate plan"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "text", alias = "picklist")]
    String,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "decimal", alias = "integer")]
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Remote object carrying the field. `None` means the entity's own node
    /// (`Product` or `ProductRatePlan`).
    pub origin: Option<NodeKind>,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            origin: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: NodeKind) -> Self {
        self.origin = Some(origin);
        self
    }

    /// True when the field lives on remote objects of `kind`.
    #[must_use]
    pub fn lives_on(&self, kind: NodeKind) -> bool {
        match self.origin {
            Some(origin) => origin == kind,
            None => matches!(kind, NodeKind::Product | NodeKind::RatePlan),
        }
    }
}

/// Which field identifies an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyField {
    /// SKU for products, name for rate plans.
    Default,
    /// A declared private field.
    Private(String),
}

impl KeyField {
    /// Field name as the remote service spells it in a query filter.
    #[must_use]
    pub fn remote_name(&self, entity: EntityKind, schema: &CatalogSchema) -> String {
        match (self, entity) {
            (KeyField::Default, EntityKind::Product) => "SKU".to_string(),
            (KeyField::Default, EntityKind::RatePlan) => "Name".to_string(),
            (KeyField::Private(name), _) => schema.remote_field_name(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSchema {
    product_fields: Vec<FieldDescriptor>,
    rate_plan_fields: Vec<FieldDescriptor>,
    pub product_key: KeyField,
    pub rate_plan_key: KeyField,
    /// Suffix marking a private field on a remote row, e.g. `__c`.
    pub private_suffix: String,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        Self {
            product_fields: Vec::new(),
            rate_plan_fields: Vec::new(),
            product_key: KeyField::Default,
            rate_plan_key: KeyField::Default,
            private_suffix: "__c".to_string(),
        }
    }
}

impl CatalogSchema {
    /// Builds a schema with default keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a field name repeats within an
    /// entity kind.
    pub fn new(
        product_fields: Vec<FieldDescriptor>,
        rate_plan_fields: Vec<FieldDescriptor>,
    ) -> Result<Self, ConfigError> {
        check_unique(EntityKind::Product, &product_fields)?;
        check_unique(EntityKind::RatePlan, &rate_plan_fields)?;
        Ok(Self {
            product_fields,
            rate_plan_fields,
            ..Self::default()
        })
    }

    /// Overrides the key field of `entity`.
    ///
    /// `name` may spell the default key (`sku` / `name`) or any declared
    /// private field of that entity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `name` is neither.
    pub fn with_key(mut self, entity: EntityKind, name: &str) -> Result<Self, ConfigError> {
        let default_name = match entity {
            EntityKind::Product => "sku",
            EntityKind::RatePlan => "name",
        };
        let key = if name.eq_ignore_ascii_case(default_name) {
            KeyField::Default
        } else {
            let declared = self.descriptor(entity, name).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "{entity} key '{name}' is not a declared private field"
                ))
            })?;
            KeyField::Private(declared.name.clone())
        };
        match entity {
            EntityKind::Product => self.product_key = key,
            EntityKind::RatePlan => self.rate_plan_key = key,
        }
        Ok(self)
    }

    #[must_use]
    pub fn fields(&self, entity: EntityKind) -> &[FieldDescriptor] {
        match entity {
            EntityKind::Product => &self.product_fields,
            EntityKind::RatePlan => &self.rate_plan_fields,
        }
    }

    pub fn names(&self, entity: EntityKind) -> impl Iterator<Item = &str> {
        self.fields(entity).iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn key(&self, entity: EntityKind) -> &KeyField {
        match entity {
            EntityKind::Product => &self.product_key,
            EntityKind::RatePlan => &self.rate_plan_key,
        }
    }

    /// Exact-name lookup first, then a case-style-insensitive one.
    #[must_use]
    pub fn descriptor(&self, entity: EntityKind, name: &str) -> Option<&FieldDescriptor> {
        let fields = self.fields(entity);
        fields
            .iter()
            .find(|d| d.name == name)
            .or_else(|| fields.iter().find(|d| same_field_name(&d.name, name)))
    }

    /// Exact-name lookup only; the text format is case sensitive.
    #[must_use]
    pub fn exact_descriptor(&self, entity: EntityKind, name: &str) -> Option<&FieldDescriptor> {
        self.fields(entity).iter().find(|d| d.name == name)
    }

    /// Rearranges the private fields of `entity` into `order`.
    ///
    /// `order` must be a permutation of the declared names; on error the
    /// schema is left untouched and the offending name is returned.
    ///
    /// # Errors
    ///
    /// Returns the first unknown, repeated or missing field name.
    pub fn reorder(&mut self, entity: EntityKind, order: &[&str]) -> Result<(), String> {
        let current = self.fields(entity);
        let mut reordered: Vec<FieldDescriptor> = Vec::with_capacity(current.len());
        for name in order {
            if reordered.iter().any(|d| d.name == *name) {
                return Err((*name).to_string());
            }
            let descriptor = self
                .exact_descriptor(entity, name)
                .ok_or_else(|| (*name).to_string())?;
            reordered.push(descriptor.clone());
        }
        if let Some(missing) = current
            .iter()
            .find(|d| !reordered.iter().any(|r| r.name == d.name))
        {
            return Err(missing.name.clone());
        }
        match entity {
            EntityKind::Product => self.product_fields = reordered,
            EntityKind::RatePlan => self.rate_plan_fields = reordered,
        }
        Ok(())
    }

    /// Private fields stored on remote objects of `kind`, in column order.
    pub fn remote_fields(&self, kind: NodeKind) -> impl Iterator<Item = &FieldDescriptor> {
        let entity = match kind {
            NodeKind::Product => EntityKind::Product,
            NodeKind::RatePlan | NodeKind::Charge | NodeKind::ChargeTier => EntityKind::RatePlan,
        };
        self.fields(entity).iter().filter(move |d| d.lives_on(kind))
    }

    /// Remote spelling of a private field: lower-camel stem plus suffix,
    /// `NextSlug` → `nextSlug__c`.
    #[must_use]
    pub fn remote_field_name(&self, name: &str) -> String {
        let mut chars = name.chars();
        let stem = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{stem}{}", self.private_suffix)
    }
}

fn check_unique(entity: EntityKind, fields: &[FieldDescriptor]) -> Result<(), ConfigError> {
    for (i, field) in fields.iter().enumerate() {
        if fields[..i]
            .iter()
            .any(|d| camel_to_underscore(&d.name) == camel_to_underscore(&field.name))
        {
            return Err(ConfigError::Validation(format!(
                "{entity} private field '{}' is declared twice",
                field.name
            )));
        }
    }
    Ok(())
}

/// Derives the private column layout from the field declarations of
/// `config`.
///
/// Product columns come from the `Product` declaration. Rate plan columns
/// concatenate the rate plan, charge and charge tier declarations, because
/// one flat rate plan row carries all three levels.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] if a field is declared twice for the
/// same row kind or a key override names an undeclared field.
pub fn private_field_schema(config: &CatalogConfig) -> Result<CatalogSchema, ConfigError> {
    let mut product_fields = Vec::new();
    let mut rate_plan_fields = Vec::new();
    for (kind, fields) in &config.private_fields {
        match kind {
            NodeKind::Product => product_fields.extend(fields.iter().cloned()),
            NodeKind::RatePlan => rate_plan_fields.extend(fields.iter().cloned()),
            NodeKind::Charge | NodeKind::ChargeTier => rate_plan_fields
                .extend(fields.iter().map(|d| d.clone().with_origin(*kind))),
        }
    }

    let mut schema = CatalogSchema::new(product_fields, rate_plan_fields)?;
    schema.private_suffix.clone_from(&config.private_field_suffix);
    if let Some(key) = &config.keys.product {
        schema = schema.with_key(EntityKind::Product, key)?;
    }
    if let Some(key) = &config.keys.rate_plan {
        schema = schema.with_key(EntityKind::RatePlan, key)?;
    }
    Ok(schema)
}
