// ABOUTME: Prepare command implementation - reconcile object ownership before replication
// ABOUTME: Transfers drifted source objects to the owner role, optionally truncates the destination

use crate::catalog::{CatalogSource, PgCatalogReader, Snapshot, Table};
use crate::config::{load_config, DbConfig, PgConfig};
use crate::interactive::{gate_for, ConfirmationGate};
use crate::postgres::connect;
use crate::reconcile::{
    display_batch, execute_batch, truncate_statements, OwnedKind, OwnershipReconciler,
    ReconciliationPlan,
};
use crate::utils::generate_password;
use anyhow::{Context, Result};
use std::path::Path;

const GENERATED_PASSWORD_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareOptions {
    /// Empty destination tables after the ownership changes
    pub truncate_destination: bool,
    /// Skip confirmation prompts
    pub assume_yes: bool,
}

/// Reconcile ownership on the source database described by a config file
///
/// Builds the ownership plan from the source catalog, shows it, and after
/// confirmation executes it as separate transactions (bootstrap, functions,
/// objects). With `truncate_destination`, destination tables are truncated
/// after a second confirmation. Finally, destination tables not owned by
/// the destination owner are reported.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use pg_compare::commands::{prepare, PrepareOptions};
/// # async fn example() -> Result<()> {
/// prepare("config.json", PrepareOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn prepare(config_path: impl AsRef<Path>, options: PrepareOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let mut gate = gate_for(options.assume_yes);

    tracing::info!("Connecting to source database...");
    let mut source_client = connect(&config.src.root_pg_config()?)
        .await
        .context("Failed to connect to source database")?;

    let plan = {
        let reader = PgCatalogReader::new(&source_client, "source");
        build_plan(&reader, &config).await?
    };

    if plan.is_empty() {
        tracing::info!(
            "✓ Every source object is already owned by {}",
            config.required_owner()
        );
    } else if confirm_plan(&plan, &config, gate.as_mut())? {
        for batch in plan.batches() {
            tracing::info!(
                "Executing {} batch ({} statements)",
                batch.name,
                batch.statements.len()
            );
            execute_batch(
                &mut source_client,
                "source",
                &batch.statements,
                &config.lock_timeout,
            )
            .await
            .with_context(|| format!("Failed to execute {} batch", batch.name))?;
        }
        tracing::info!("✓ Ownership changes applied");
    } else {
        tracing::info!("Skipping ownership changes");
    }

    tracing::info!("Connecting to destination database...");
    let mut destination_client = connect(&config.dst.root_pg_config()?)
        .await
        .context("Failed to connect to destination database")?;

    if options.truncate_destination {
        let tables = {
            let reader = PgCatalogReader::new(&destination_client, "destination");
            truncation_targets(&reader, &config.tables).await?
        };
        truncate_destination(&mut destination_client, &tables, &config, gate.as_mut()).await?;
    }

    let reader = PgCatalogReader::new(&destination_client, "destination");
    check_destination_ownership(&reader, &config.dst, &config.reserved_roles).await
}

/// Ownership plan for the source database, with a bootstrap prefix when
/// the required owner role does not exist yet
pub async fn build_plan(
    source: &dyn CatalogSource,
    config: &PgConfig,
) -> Result<ReconciliationPlan> {
    let reconciler =
        OwnershipReconciler::new(config.required_owner(), config.reserved_roles.clone());

    let exists = source
        .role_exists(config.required_owner())
        .await
        .context("Failed to check required owner role")?;

    let snapshot = Snapshot::capture(source)
        .await
        .context("Failed to capture source catalog")?;

    let mut plan = reconciler.plan(&snapshot);
    if !exists {
        tracing::warn!(
            "Required owner {} does not exist; it will be created",
            config.required_owner()
        );
        plan.bootstrap = reconciler.bootstrap(
            &config.src.db,
            generate_password(GENERATED_PASSWORD_LENGTH),
            &config.bootstrap_schemas,
        );
    }
    Ok(plan)
}

fn confirm_plan(
    plan: &ReconciliationPlan,
    config: &PgConfig,
    gate: &mut dyn ConfirmationGate,
) -> Result<bool> {
    for line in plan_preview(plan, &config.lock_timeout) {
        tracing::info!("{}", line);
    }
    tracing::info!("Owner changes will be applied to source db: {}", config.src.db);
    gate.confirm("Do you want to apply ownership changes?")
}

/// Per-kind statement counts followed by every batch; passwords are masked
fn plan_preview(plan: &ReconciliationPlan, lock_timeout: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for kind in [
        OwnedKind::Function,
        OwnedKind::Table,
        OwnedKind::Sequence,
        OwnedKind::View,
    ] {
        let count = plan.statements_for(kind).len();
        if count > 0 {
            lines.push(format!("{} statement(s) for {}", count, kind));
        }
    }
    for batch in plan.batches() {
        lines.push(format!("{} batch:", batch.name));
        for line in display_batch(&batch.statements, lock_timeout).lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

/// Destination tables to truncate, limited to the allow-list when one is set
pub async fn truncation_targets(
    destination: &dyn CatalogSource,
    allow_list: &[String],
) -> Result<Vec<Table>> {
    let mut tables = destination
        .tables()
        .await
        .context("Failed to list destination tables")?;
    if !allow_list.is_empty() {
        tables.retain(|t| allow_list.contains(&t.name));
    }
    Ok(tables)
}

async fn truncate_destination(
    client: &mut tokio_postgres::Client,
    tables: &[Table],
    config: &PgConfig,
    gate: &mut dyn ConfirmationGate,
) -> Result<()> {
    if tables.is_empty() {
        tracing::info!("No destination tables to truncate");
        return Ok(());
    }

    tracing::info!("Truncate will be applied to destination db: {}", config.dst.db);
    for table in tables {
        tracing::info!("  Table: {}", table);
    }
    if !gate.confirm("Do you want to truncate these tables?")? {
        tracing::info!("Skipping table truncation");
        return Ok(());
    }

    execute_batch(
        client,
        "destination",
        &truncate_statements(tables),
        &config.lock_timeout,
    )
    .await
    .context("Failed to truncate destination tables")?;
    tracing::info!("✓ Truncated {} table(s)", tables.len());
    Ok(())
}

/// Warn about destination tables not owned by the destination owner
///
/// Nothing is changed on the destination.
pub async fn check_destination_ownership(
    destination: &dyn CatalogSource,
    dst: &DbConfig,
    reserved_roles: &[String],
) -> Result<()> {
    let drifted = destination_drift(destination, dst, reserved_roles).await?;
    if drifted.is_empty() {
        tracing::info!("✓ Destination tables are owned by {}", dst.owner_user.name);
    }
    Ok(())
}

async fn destination_drift(
    destination: &dyn CatalogSource,
    dst: &DbConfig,
    reserved_roles: &[String],
) -> Result<Vec<Table>> {
    let reconciler =
        OwnershipReconciler::new(dst.owner_user.name.clone(), reserved_roles.to_vec());
    let tables = destination
        .tables()
        .await
        .context("Failed to list destination tables")?;

    let drifted: Vec<Table> = reconciler.drifted(&tables).into_iter().cloned().collect();
    for table in &drifted {
        tracing::warn!(
            server = %destination.label(),
            "table {} owner is {} instead of {}",
            table,
            table.owner,
            reconciler.required_owner()
        );
    }
    Ok(drifted)
}
