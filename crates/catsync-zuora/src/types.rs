//! Request and response bodies of the Zuora REST action API.

use serde::{Deserialize, Serialize};

use crate::service::Row;

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    #[serde(rename = "queryString")]
    pub query_string: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryMoreRequest<'a> {
    #[serde(rename = "queryLocator")]
    pub query_locator: &'a str,
}

/// One page of a ZOQL query.
///
/// `done` is `false` while more pages can be pulled with `queryLocator`.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub records: Vec<Row>,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(rename = "queryLocator", default)]
    pub query_locator: Option<String>,
}

fn default_done() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionRequest<'a> {
    #[serde(rename = "type")]
    pub object_type: &'a str,
    pub objects: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    #[serde(rename = "type")]
    pub object_type: &'a str,
    pub ids: Vec<&'a str>,
}

/// Per-object outcome of create / update (`Success`, `Id`) and delete
/// (`success`, `id`).
#[derive(Debug, Deserialize)]
pub(crate) struct SaveResult {
    #[serde(rename = "Success", alias = "success")]
    pub success: bool,
    #[serde(rename = "Id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(rename = "Errors", alias = "errors", default)]
    pub errors: Option<Vec<ErrorDetail>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "Code", alias = "code", default)]
    pub code: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (None, Some(message)) => f.write_str(message),
            (Some(code), None) => f.write_str(code),
            (None, None) => f.write_str("unknown error"),
        }
    }
}
