pub mod app_config;
pub mod config;
pub mod currency;
pub mod flat;
pub mod projection;
pub mod sanity;
pub mod schema;
pub mod strings;
pub mod tree;

use thiserror::Error;

pub use app_config::{
    CatalogConfig, CsvSettings, EnvironmentConfig, KeyConfig, ZuoraSettings, DUMP_ENVIRONMENT,
};
pub use config::{load_config, ENV_OVERRIDE_VAR};
pub use currency::Currency;
pub use flat::{
    is_fixed_column, FlatCatalog, FlatProduct, FlatRatePlan, Price, Prices, PrivateFields,
};
pub use projection::{project, remote_private_fields};
pub use sanity::{load_sanity_rules, parse_sanity_rules, SanityRules};
pub use schema::{
    private_field_schema, CatalogSchema, EntityKind, FieldDescriptor, FieldType, KeyField,
};
pub use tree::{CatalogNode, CatalogTree, FieldValue, NodeKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    FileParse(#[source] serde_yaml::Error),

    #[error("config for environment '{0}' does not exist")]
    UnknownEnvironment(String),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("product node is missing its SKU")]
    MissingProductKey,

    #[error("failed to read snapshot {path}: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path} is not a valid catalog: {source}")]
    SnapshotFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} '{key}': field {field} {reason}")]
    Sanity {
        entity: EntityKind,
        key: String,
        field: String,
        reason: String,
    },
}
