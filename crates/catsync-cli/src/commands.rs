//! Handlers for the three actions. Each loads what it needs from the config
//! and the paths on the command line, and reports progress through tracing.

use std::io::{BufRead, Write};

use anyhow::Context;
use catsync_core::{
    load_sanity_rules, private_field_schema, project, CatalogConfig, CatalogSchema, CatalogTree,
    FlatCatalog, SanityRules,
};
use catsync_csv::{read_catalog_file, write_catalog_file, CatalogReader};
use catsync_validate::{cross_validate, DiffCounts};
use catsync_zuora::{fetch_catalog, AlwaysYes, Confirm, SyncExecutor, SyncOutcome, ZuoraClient};

use crate::Cli;

/// Asks on `output` and reads the answer from `input`. Only `y` (any case)
/// accepts; end of input or a read failure refuses.
pub(crate) struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        if let Err(e) = write!(self.output, "{prompt} [y/n]? ").and_then(|()| self.output.flush())
        {
            tracing::warn!(error = %e, "could not write prompt");
            return false;
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => false,
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(e) => {
                tracing::warn!(error = %e, "could not read answer");
                false
            }
        }
    }
}

/// Snapshot projection and parsed CSV, side by side.
struct Catalogs {
    reference: FlatCatalog,
    candidate: FlatCatalog,
}

fn load_catalogs(
    cli: &Cli,
    config: &CatalogConfig,
    schema: &CatalogSchema,
) -> anyhow::Result<Catalogs> {
    let tree = CatalogTree::load(&cli.dump)
        .with_context(|| format!("loading snapshot {}", cli.dump.display()))?;
    let reference = project(&tree, schema)?;

    let sanity: Option<SanityRules> = cli
        .sanity
        .as_deref()
        .map(|path| load_sanity_rules(path, schema))
        .transpose()?;
    let mut reader = CatalogReader::new(schema).with_delimiter(config.csv.delimiter);
    if let Some(rules) = &sanity {
        reader = reader.with_sanity(rules);
    }
    let candidate = read_catalog_file(&cli.csv, &reader)
        .with_context(|| format!("reading {}", cli.csv.display()))?;

    tracing::info!(
        reference_products = reference.products.len(),
        candidate_products = candidate.products.len(),
        "catalogs loaded"
    );
    Ok(Catalogs {
        reference,
        candidate,
    })
}

/// Writes the catalog of the environment as CSV. A dump environment reads
/// the snapshot; any other downloads the catalog and saves the snapshot
/// first.
pub(crate) async fn run_fetch(cli: &Cli, config: &CatalogConfig) -> anyhow::Result<()> {
    let schema = private_field_schema(config)?;

    let tree = if config.environment.is_dump() {
        tracing::info!(dump = %cli.dump.display(), "reading catalog from snapshot");
        CatalogTree::load(&cli.dump)?
    } else {
        let client = ZuoraClient::from_environment(&config.environment, &schema)?;
        let tree = fetch_catalog(&client, None).await?;
        tree.save(&cli.dump)
            .with_context(|| format!("saving snapshot {}", cli.dump.display()))?;
        tree
    };

    let catalog = project(&tree, &schema)?;
    write_catalog_file(&cli.csv, &catalog, config.csv.delimiter)?;
    tracing::info!(
        products = catalog.products.len(),
        csv = %cli.csv.display(),
        "catalog written"
    );
    Ok(())
}

/// Compares the CSV against the snapshot and returns the bucket sizes.
pub(crate) fn run_validate(cli: &Cli, config: &CatalogConfig) -> anyhow::Result<DiffCounts> {
    if !config.environment.is_dump() {
        anyhow::bail!(
            "validate works offline; use a dump environment instead of '{}'",
            config.environment.name
        );
    }
    let schema = private_field_schema(config)?;
    let catalogs = load_catalogs(cli, config, &schema)?;

    let diff = cross_validate(&catalogs.reference, &catalogs.candidate)?;
    Ok(diff.counts())
}

/// Applies the CSV changes to the environment. The snapshot must be a fresh
/// fetch of the same environment.
pub(crate) async fn run_sync(cli: &Cli, config: &CatalogConfig) -> anyhow::Result<()> {
    if config.environment.is_dump() {
        anyhow::bail!(
            "sync needs a live environment, '{}' is a dump",
            config.environment.name
        );
    }
    let schema = private_field_schema(config)?;
    let catalogs = load_catalogs(cli, config, &schema)?;
    let diff = cross_validate(&catalogs.reference, &catalogs.candidate)?;

    let client = ZuoraClient::from_environment(&config.environment, &schema)?;
    let outcome = if cli.push_through {
        SyncExecutor::new(&client, AlwaysYes).apply(&diff).await?
    } else {
        let stdin = std::io::stdin();
        let confirm = PromptConfirm::new(stdin.lock(), std::io::stdout());
        SyncExecutor::new(&client, confirm).apply(&diff).await?
    };

    match outcome {
        SyncOutcome::NothingToDo => tracing::info!("catalog already in sync"),
        SyncOutcome::Completed { applied } => tracing::info!(applied, "sync complete"),
        SyncOutcome::Aborted { applied } => {
            tracing::warn!(applied, "sync aborted, fetch again before the next run");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use catsync_core::{CatalogNode, NodeKind};
    use clap::Parser;
    use serde_json::json;

    use super::*;

    const CONFIG: &str = "\
environments:
  dump:
    zuora:
      is_dump: true
  sandbox:
    zuora:
      url: http://127.0.0.1:9
private_fields:
  Product:
    Category: string
  ProductRatePlan:
    Slug: string
    Trial: boolean
";

    fn row(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn snapshot() -> CatalogTree {
        let mut charge = CatalogNode::from_row(
            NodeKind::Charge,
            &row(json!({
                "BillingPeriod": "Month",
                "ChargeType": "Recurring",
                "AccountingCode": "ACC-1"
            })),
        );
        charge.push_child(CatalogNode::from_row(
            NodeKind::ChargeTier,
            &row(json!({"Currency": "USD", "Price": 9.99})),
        ));
        let mut plan = CatalogNode::from_row(
            NodeKind::RatePlan,
            &row(json!({"Name": "bronze-monthly", "Slug__c": "bronze-m", "Trial__c": false})),
        );
        plan.push_child(charge);
        let mut product = CatalogNode::from_row(
            NodeKind::Product,
            &row(json!({"SKU": "bronze", "Name": "Bronze", "Category__c": "waffle"})),
        );
        product.push_child(plan);
        CatalogTree::new(vec![product])
    }

    fn cli(dir: &Path, env: &str, action: &str) -> Cli {
        let arg = |name: &str| dir.join(name).display().to_string();
        Cli::try_parse_from([
            "catsync".to_string(),
            action.to_string(),
            "-e".to_string(),
            env.to_string(),
            "-k".to_string(),
            arg("catalog.yaml"),
            "-c".to_string(),
            arg("catalog.csv"),
            "-d".to_string(),
            arg("snapshot.json"),
        ])
        .expect("expected valid cli args")
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("catalog.yaml"), CONFIG).expect("write config");
        snapshot()
            .save(&dir.path().join("snapshot.json"))
            .expect("save snapshot");
        dir
    }

    #[tokio::test]
    async fn fetch_from_dump_then_validate_finds_nothing() {
        let dir = workspace();

        let fetch = cli(dir.path(), "dump", "-F");
        let config = catsync_core::load_config("dump", &fetch.config).unwrap();
        run_fetch(&fetch, &config).await.expect("fetch from dump");

        let csv = std::fs::read_to_string(dir.path().join("catalog.csv")).unwrap();
        assert!(csv.contains("bronze"), "csv: {csv}");
        assert!(csv.contains("waffle"), "csv: {csv}");

        let validate = cli(dir.path(), "dump", "-V");
        let counts = run_validate(&validate, &config).expect("validate");
        assert_eq!(counts.as_array(), [0; 9]);
    }

    #[tokio::test]
    async fn validate_reports_an_edited_private_field() {
        let dir = workspace();
        let fetch = cli(dir.path(), "dump", "-F");
        let config = catsync_core::load_config("dump", &fetch.config).unwrap();
        run_fetch(&fetch, &config).await.unwrap();

        let csv_path = dir.path().join("catalog.csv");
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        std::fs::write(&csv_path, csv.replace("waffle", "pancake")).unwrap();

        let counts = run_validate(&cli(dir.path(), "dump", "-V"), &config).unwrap();
        assert_eq!(counts.products_diff_ok, 1);
        assert_eq!(counts.products_diff_error, 0);
    }

    #[test]
    fn validate_refuses_a_live_environment() {
        let dir = workspace();
        let validate = cli(dir.path(), "sandbox", "-V");
        let config = catsync_core::load_config("sandbox", &validate.config).unwrap();

        let err = run_validate(&validate, &config).unwrap_err();
        assert!(err.to_string().contains("dump environment"), "got: {err}");
    }

    #[tokio::test]
    async fn sync_refuses_a_dump_environment() {
        let dir = workspace();
        let sync = cli(dir.path(), "dump", "-S");
        let config = catsync_core::load_config("dump", &sync.config).unwrap();

        let err = run_sync(&sync, &config).await.unwrap_err();
        assert!(err.to_string().contains("is a dump"), "got: {err}");
    }

    #[test]
    fn prompt_accepts_only_y() {
        let mut out = Vec::new();
        let mut confirm = PromptConfirm::new(Cursor::new("Y\nyes\n"), &mut out);
        assert!(confirm.confirm("Update product bronze"));
        assert!(!confirm.confirm("Update product silver"));
        assert!(!confirm.confirm("Update product gold"));

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.starts_with("Update product bronze [y/n]? "));
    }
}
