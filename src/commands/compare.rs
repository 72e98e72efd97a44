// ABOUTME: Compare command implementation - verify destination matches source
// ABOUTME: Snapshots both catalogs, reports differences, optionally creates missing sequences

use crate::catalog::{CatalogSource, PgCatalogReader, Snapshot};
use crate::config::{load_config, PgConfig};
use crate::diff::{ComparisonReport, DiffEngine, DiffOptions, SequenceDiff};
use crate::interactive::{gate_for, ConfirmationGate};
use crate::postgres::connect;
use crate::reconcile::{display_batch, execute_batch, missing_sequence_statements, Statement};
use crate::report;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    /// Only print rows that differ or failed
    pub show_false_only: bool,
    /// Treat the run as part of a scheduled workflow, in addition to the config flag
    pub scheduled: bool,
    /// Skip confirmation prompts
    pub assume_yes: bool,
}

/// Compare source and destination databases described by a config file
///
/// Connects to both instances as the root user, captures each catalog,
/// restricts it to the configured allow-lists, and prints one table per
/// object kind followed by a summary. When the run is scheduled and the
/// destination lacks sequences, offers to create them as the owner user.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use pg_compare::commands::{compare, CompareOptions};
/// # async fn example() -> Result<()> {
/// compare("config.json", CompareOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn compare(config_path: impl AsRef<Path>, options: CompareOptions) -> Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Connecting to source database...");
    let source_client = connect(&config.src.root_pg_config()?)
        .await
        .context("Failed to connect to source database")?;
    tracing::info!("Connecting to destination database...");
    let destination_client = connect(&config.dst.root_pg_config()?)
        .await
        .context("Failed to connect to destination database")?;

    let source = PgCatalogReader::new(&source_client, "source")
        .with_row_count_timeout(&config.row_count_timeout);
    let destination = PgCatalogReader::new(&destination_client, "destination")
        .with_row_count_timeout(&config.row_count_timeout);

    let engine = DiffEngine::new(DiffOptions {
        show_false_only: options.show_false_only,
    });
    let report = compare_catalogs(&source, &destination, &config, engine).await?;
    report::log_report(&report, &config.src.host, &config.dst.host);

    let statements = missing_sequence_batch(
        &report.sequences,
        &config,
        options.scheduled || config.scheduled,
    );
    if statements.is_empty() {
        return Ok(());
    }

    let mut gate = gate_for(options.assume_yes);
    create_missing_sequences(&config, &statements, gate.as_mut()).await
}

/// Capture both catalogs and run every comparison
///
/// Live connections are logged before the allow-lists are applied; table
/// row counts are fetched under a progress bar.
pub async fn compare_catalogs(
    source: &dyn CatalogSource,
    destination: &dyn CatalogSource,
    config: &PgConfig,
    engine: DiffEngine,
) -> Result<ComparisonReport> {
    let source_snapshot = Snapshot::capture(source)
        .await
        .context("Failed to capture source catalog")?;
    let destination_snapshot = Snapshot::capture(destination)
        .await
        .context("Failed to capture destination catalog")?;

    report::log_connections(source.label(), &source_snapshot.connections);
    report::log_connections(destination.label(), &destination_snapshot.connections);

    let source_snapshot = source_snapshot.restrict(&config.tables, &config.sequences);
    let destination_snapshot = destination_snapshot.restrict(&config.tables, &config.sequences);

    tracing::info!(
        "Comparing {} tables, {} sequences, {} views, {} functions",
        source_snapshot.tables.len(),
        source_snapshot.sequences.len(),
        source_snapshot.views.len(),
        source_snapshot.functions.len()
    );

    let progress = ProgressBar::new(source_snapshot.tables.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );

    let report = engine
        .compare(
            &source_snapshot,
            &destination_snapshot,
            source,
            destination,
            |table| {
                progress.inc(1);
                progress.set_message(format!("Counting {}", table));
            },
        )
        .await;
    progress.finish_with_message("Row counts complete");

    Ok(report)
}

/// Statements creating the sequences missing on the destination
///
/// Empty unless the run is scheduled; sequence creation belongs to the
/// scheduled workflow only.
pub fn missing_sequence_batch(
    sequences: &SequenceDiff,
    config: &PgConfig,
    scheduled: bool,
) -> Vec<Statement> {
    if sequences.missing_sequences.is_empty() {
        return Vec::new();
    }
    if !scheduled {
        tracing::info!(
            "{} sequence(s) missing in destination; rerun with --scheduled to create them",
            sequences.missing_sequences.len()
        );
        return Vec::new();
    }
    missing_sequence_statements(
        &sequences.missing_sequences,
        config.sequence_owned_by.as_ref(),
    )
}

async fn create_missing_sequences(
    config: &PgConfig,
    statements: &[Statement],
    gate: &mut dyn ConfirmationGate,
) -> Result<()> {
    tracing::info!("Sequences will be created in destination db: {}", config.dst.db);
    for line in display_batch(statements, &config.lock_timeout).lines() {
        tracing::info!("  {}", line);
    }

    if !gate.confirm("Do you want to create the missing sequences?")? {
        tracing::info!("Skipping sequence creation");
        return Ok(());
    }

    let mut owner_client = connect(&config.dst.owner_pg_config()?)
        .await
        .context("Failed to connect to destination database as owner")?;
    execute_batch(
        &mut owner_client,
        "destination",
        statements,
        &config.lock_timeout,
    )
    .await
    .context("Failed to create missing sequences")?;

    tracing::info!("✓ Created {} sequence(s)", statements.len());
    Ok(())
}
