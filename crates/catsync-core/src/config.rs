use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::app_config::{
    CatalogConfig, CsvSettings, EnvironmentConfig, KeyConfig, ZuoraSettings, DUMP_ENVIRONMENT,
};
use crate::schema::{private_field_schema, FieldDescriptor, FieldType};
use crate::tree::NodeKind;
use crate::ConfigError;

/// Environment variable that overrides the environment requested on the
/// command line.
pub const ENV_OVERRIDE_VAR: &str = "CATALOG_ENV";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRIVATE_SUFFIX: &str = "__c";

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    environments: HashMap<String, RawEnvironment>,
    #[serde(default)]
    private_fields: serde_yaml::Mapping,
    #[serde(default)]
    keys: RawKeys,
    #[serde(default)]
    csv: RawCsv,
    #[serde(default)]
    private_field_suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnvironment {
    zuora: RawZuora,
}

#[derive(Debug, Deserialize)]
struct RawZuora {
    #[serde(default)]
    is_dump: bool,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawKeys {
    product: Option<String>,
    rate_plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCsv {
    delimiter: Option<String>,
}

/// Load the catalog configuration for `env` from the YAML file at `path`.
///
/// `CATALOG_ENV`, when set, takes precedence over `env`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, the
/// environment does not exist, or a declaration is invalid.
pub fn load_config(env: &str, path: &Path) -> Result<CatalogConfig, ConfigError> {
    build_config(env, path, |key| std::env::var(key))
}

/// Core loading logic with the environment lookup injected, so tests can
/// drive the `CATALOG_ENV` override from a plain map.
fn build_config<F>(env: &str, path: &Path, lookup: F) -> Result<CatalogConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let env_name = match lookup(ENV_OVERRIDE_VAR) {
        Ok(over) if !over.trim().is_empty() => {
            tracing::info!(env = %over, "using environment from {ENV_OVERRIDE_VAR}");
            over.trim().to_string()
        }
        _ => env.to_string(),
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawConfigFile = serde_yaml::from_str(&content).map_err(ConfigError::FileParse)?;

    let raw_env = raw
        .environments
        .get(&env_name)
        .ok_or_else(|| ConfigError::UnknownEnvironment(env_name.clone()))?;
    let environment = build_environment(&env_name, &raw_env.zuora)?;

    let config = CatalogConfig {
        environment,
        private_fields: parse_private_fields(&raw.private_fields)?,
        keys: KeyConfig {
            product: raw.keys.product,
            rate_plan: raw.keys.rate_plan,
        },
        csv: parse_csv(&raw.csv)?,
        private_field_suffix: parse_suffix(raw.private_field_suffix)?,
    };

    // Key overrides and duplicate declarations are only detectable once the
    // schema is assembled.
    private_field_schema(&config)?;

    tracing::debug!(
        env = %config.environment.name,
        dump = config.environment.is_dump(),
        "loaded catalog config"
    );
    Ok(config)
}

fn build_environment(name: &str, raw: &RawZuora) -> Result<EnvironmentConfig, ConfigError> {
    let environment = EnvironmentConfig {
        name: name.to_string(),
        zuora: ZuoraSettings {
            is_dump: raw.is_dump,
            url: raw.url.clone(),
            username: raw.username.clone(),
            password: raw.password.clone(),
            timeout_secs: raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        },
    };

    if !environment.is_dump() && environment.zuora.url.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigError::Validation(format!(
            "environment '{name}' needs zuora.url unless it is a {DUMP_ENVIRONMENT} environment"
        )));
    }
    if environment.zuora.timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "environment '{name}' has zuora.timeout_secs = 0"
        )));
    }
    Ok(environment)
}

/// Entity kind name as written in the file. `ProductRatePlanTier` is an older
/// spelling of the charge tier kind still found in deployed configs.
fn parse_node_kind(name: &str) -> Result<NodeKind, ConfigError> {
    if name == "ProductRatePlanTier" {
        return Ok(NodeKind::ChargeTier);
    }
    NodeKind::from_remote_name(name).ok_or_else(|| {
        ConfigError::Validation(format!("unknown entity kind '{name}' in private_fields"))
    })
}

fn yaml_str<'a>(value: &'a serde_yaml::Value, what: &str) -> Result<&'a str, ConfigError> {
    value
        .as_str()
        .ok_or_else(|| ConfigError::Validation(format!("{what} must be a string")))
}

fn parse_private_fields(
    mapping: &serde_yaml::Mapping,
) -> Result<Vec<(NodeKind, Vec<FieldDescriptor>)>, ConfigError> {
    let mut declarations = Vec::with_capacity(mapping.len());
    for (kind, fields) in mapping {
        let kind = parse_node_kind(yaml_str(kind, "private_fields entity kind")?)?;
        let descriptors = match fields {
            // Plain list form: `Product: "Category Color"`, every field a string.
            serde_yaml::Value::String(names) => names
                .split_whitespace()
                .map(|n| FieldDescriptor::new(n, FieldType::String))
                .collect(),
            serde_yaml::Value::Mapping(typed) => {
                let mut descriptors = Vec::with_capacity(typed.len());
                for (name, field_type) in typed {
                    let name = yaml_str(name, "private field name")?;
                    let field_type: FieldType = serde_yaml::from_value(field_type.clone())
                        .map_err(|e| {
                            ConfigError::Validation(format!(
                                "private field '{name}' of {kind}: {e}"
                            ))
                        })?;
                    descriptors.push(FieldDescriptor::new(name, field_type));
                }
                descriptors
            }
            serde_yaml::Value::Null => Vec::new(),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "private_fields for {kind} must be a mapping or a list of names"
                )))
            }
        };
        declarations.push((kind, descriptors));
    }
    Ok(declarations)
}

fn parse_csv(raw: &RawCsv) -> Result<CsvSettings, ConfigError> {
    let Some(text) = raw.delimiter.as_deref() else {
        return Ok(CsvSettings::default());
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !matches!(c, ';' | '\r' | '\n') => Ok(CsvSettings { delimiter: c }),
        _ => Err(ConfigError::Validation(format!(
            "csv.delimiter must be a single character other than ';', CR or LF, got {text:?}"
        ))),
    }
}

fn parse_suffix(raw: Option<String>) -> Result<String, ConfigError> {
    match raw {
        None => Ok(DEFAULT_PRIVATE_SUFFIX.to_string()),
        Some(s) if s.trim().is_empty() => Err(ConfigError::Validation(
            "private_field_suffix must be non-empty".to_string(),
        )),
        Some(s) => Ok(s),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
