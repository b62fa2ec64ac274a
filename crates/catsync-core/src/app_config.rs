use crate::schema::FieldDescriptor;
use crate::tree::NodeKind;

/// Name of the environment that never talks to the remote service.
pub const DUMP_ENVIRONMENT: &str = "dump";

#[derive(Clone)]
pub struct ZuoraSettings {
    pub is_dump: bool,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ZuoraSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZuoraSettings")
            .field("is_dump", &self.is_dump)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub name: String,
    pub zuora: ZuoraSettings,
}

impl EnvironmentConfig {
    /// A dump environment works from a saved snapshot only.
    #[must_use]
    pub fn is_dump(&self) -> bool {
        self.zuora.is_dump || self.name == DUMP_ENVIRONMENT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSettings {
    pub delimiter: char,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Key field overrides, as written in the config file. `None` keeps the
/// default (SKU for products, name for rate plans).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyConfig {
    pub product: Option<String>,
    pub rate_plan: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub environment: EnvironmentConfig,
    /// Private field declarations in file order, per remote object type.
    pub private_fields: Vec<(NodeKind, Vec<FieldDescriptor>)>,
    pub keys: KeyConfig,
    pub csv: CsvSettings,
    pub private_field_suffix: String,
}
