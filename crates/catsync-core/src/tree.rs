//! The catalog as the remote service describes it: products, their rate
//! plans, each rate plan's charges and each charge's per-currency tiers.
//!
//! All four levels share one node type. Fields are kept exactly as fetched
//! (loosely typed), the flat projection in [`crate::projection`] decides what
//! they mean.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Product,
    RatePlan,
    Charge,
    ChargeTier,
}

impl NodeKind {
    /// The kind every child of a node of this kind must have. `None` for
    /// the leaf level.
    #[must_use]
    pub fn child_kind(self) -> Option<NodeKind> {
        match self {
            NodeKind::Product => Some(NodeKind::RatePlan),
            NodeKind::RatePlan => Some(NodeKind::Charge),
            NodeKind::Charge => Some(NodeKind::ChargeTier),
            NodeKind::ChargeTier => None,
        }
    }

    /// Object type name used by the remote service and the config file.
    #[must_use]
    pub fn remote_name(self) -> &'static str {
        match self {
            NodeKind::Product => "Product",
            NodeKind::RatePlan => "ProductRatePlan",
            NodeKind::Charge => "ProductRatePlanCharge",
            NodeKind::ChargeTier => "ProductRatePlanChargeTier",
        }
    }

    #[must_use]
    pub fn from_remote_name(name: &str) -> Option<Self> {
        [
            NodeKind::Product,
            NodeKind::RatePlan,
            NodeKind::Charge,
            NodeKind::ChargeTier,
        ]
        .into_iter()
        .find(|k| k.remote_name() == name)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Product => write!(f, "Product"),
            NodeKind::RatePlan => write!(f, "RatePlan"),
            NodeKind::Charge => write!(f, "Charge"),
            NodeKind::ChargeTier => write!(f, "ChargeTier"),
        }
    }
}

/// A scalar field value as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Bool(bool),
}

impl FieldValue {
    /// Converts a JSON scalar. Returns `None` for `null`, arrays and objects.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                let raw = n.to_string();
                let parsed = Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw));
                Some(parsed.map_or(FieldValue::Text(raw), FieldValue::Number))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(d) => serde_json::Number::from_str(&d.to_string())
                .map_or_else(|_| serde_json::Value::String(d.to_string()), Into::into),
        }
    }

    /// Numeric view of the value; text is parsed when it looks like a number.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(d) => Some(*d),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(d) => write!(f, "{d}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub kind: NodeKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub children: Vec<CatalogNode>,
}

impl CatalogNode {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builds a node from a row of the remote service, dropping `null` and
    /// non-scalar values.
    #[must_use]
    pub fn from_row(kind: NodeKind, row: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = row
            .iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|fv| (k.clone(), fv)))
            .collect();
        Self {
            kind,
            fields,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_text(self, name: &str, value: &str) -> Self {
        self.with_field(name, FieldValue::Text(value.to_string()))
    }

    #[must_use]
    pub fn with_child(mut self, child: CatalogNode) -> Self {
        self.push_child(child);
        self
    }

    pub fn push_child(&mut self, child: CatalogNode) {
        debug_assert_eq!(
            self.kind.child_kind(),
            Some(child.kind),
            "a {} cannot hold a {}",
            self.kind,
            child.kind
        );
        self.children.push(child);
    }

    /// Case-insensitive field lookup: the service returns `SKU` where older
    /// snapshots stored `sKU`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// The field rendered as text; `None` when absent or empty.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(ToString::to_string)
            .filter(|s| !s.is_empty())
    }

    fn write_indented(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        depth: usize,
    ) -> std::fmt::Result {
        for _ in 0..depth {
            f.write_str("\t")?;
        }
        write!(f, "-> {}: ", self.kind)?;
        let mut first = true;
        for (k, v) in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{k} = {v}")?;
            first = false;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// A full catalog snapshot: the ordered list of product trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTree {
    pub products: Vec<CatalogNode>,
}

impl CatalogTree {
    #[must_use]
    pub fn new(products: Vec<CatalogNode>) -> Self {
        Self { products }
    }

    /// Persists the snapshot as a single JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotIo`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let io_err = |source| CoreError::SnapshotIo {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| io_err(e.into()))?;
        writer.flush().map_err(io_err)?;
        tracing::debug!(
            path = %path.display(),
            products = self.products.len(),
            "saved catalog snapshot"
        );
        Ok(())
    }

    /// Loads a snapshot written by [`CatalogTree::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotIo`] if the file cannot be opened, or
    /// [`CoreError::SnapshotFormat`] if it is not a catalog snapshot.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let file = File::open(path).map_err(|source| CoreError::SnapshotIo {
            path: path.display().to_string(),
            source,
        })?;
        let tree: CatalogTree = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            CoreError::SnapshotFormat {
                path: path.display().to_string(),
                source,
            }
        })?;
        tracing::debug!(
            path = %path.display(),
            products = tree.products.len(),
            "loaded catalog snapshot"
        );
        Ok(tree)
    }
}

impl std::fmt::Display for CatalogTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for product in &self.products {
            product.write_indented(f, 0)?;
        }
        Ok(())
    }
}
