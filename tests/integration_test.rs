// ABOUTME: Integration tests for compare and prepare against real databases
// ABOUTME: Driven by TEST_SOURCE_URL / TEST_TARGET_URL; run with --ignored

use pg_compare::catalog::{PgCatalogReader, Snapshot};
use pg_compare::commands::{self, CompareOptions, PrepareOptions};
use pg_compare::postgres::connect;
use pg_compare::reconcile::OwnershipReconciler;
use std::env;
use std::io::Write;
use tokio_postgres::config::Host;

/// Helper to get test database URLs from environment
fn get_test_urls() -> Option<(String, String)> {
    let source = env::var("TEST_SOURCE_URL").ok()?;
    let target = env::var("TEST_TARGET_URL").ok()?;
    Some((source, target))
}

/// Config section for one database, using the URL's user as both root and owner
fn db_section(url: &str) -> serde_json::Value {
    let config: tokio_postgres::Config = url.parse().expect("invalid connection URL");
    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        _ => "localhost".to_string(),
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);
    let user = config.get_user().unwrap_or("postgres").to_string();
    let password = config
        .get_password()
        .map(|pw| String::from_utf8_lossy(pw).into_owned())
        .unwrap_or_default();
    let db = config.get_dbname().unwrap_or("postgres").to_string();

    serde_json::json!({
        "host": host,
        "db": db,
        "port": port.to_string(),
        "root_user": {"name": user, "pw": password},
        "owner_user": {"name": user, "pw": password},
    })
}

fn write_config(source_url: &str, target_url: &str) -> tempfile::NamedTempFile {
    let config = serde_json::json!({
        "db": "integration",
        "dc": "local",
        "src": db_section(source_url),
        "dst": db_section(target_url),
    });
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(file, "{}", config).unwrap();
    file
}

#[tokio::test]
#[ignore]
async fn test_compare_command_integration() {
    let (source_url, target_url) =
        get_test_urls().expect("TEST_SOURCE_URL and TEST_TARGET_URL must be set");
    let config = write_config(&source_url, &target_url);

    println!("Testing compare command...");
    let result = commands::compare(
        config.path(),
        CompareOptions {
            show_false_only: true,
            scheduled: false,
            assume_yes: true,
        },
    )
    .await;

    assert!(result.is_ok(), "compare failed: {:?}", result.err());
    println!("✓ Compare command completed successfully");
}

#[tokio::test]
#[ignore]
async fn test_prepare_leaves_no_drift_for_connecting_user() {
    let (source_url, target_url) =
        get_test_urls().expect("TEST_SOURCE_URL and TEST_TARGET_URL must be set");
    let config = write_config(&source_url, &target_url);

    println!("Testing prepare command...");
    let result = commands::prepare(
        config.path(),
        PrepareOptions {
            truncate_destination: false,
            assume_yes: true,
        },
    )
    .await;

    assert!(result.is_ok(), "prepare failed: {:?}", result.err());
    println!("✓ Prepare command completed successfully");

    let client = connect(&source_url.parse().unwrap()).await.unwrap();
    let reader = PgCatalogReader::new(&client, "source");
    let snapshot = Snapshot::capture(&reader).await.unwrap();
    let owner = client
        .query_one("SELECT current_user::text", &[])
        .await
        .unwrap()
        .get::<_, String>(0);

    let plan = OwnershipReconciler::with_default_roles(owner).plan(&snapshot);
    assert!(plan.is_empty(), "drift remains after prepare: {:?}", plan);
}
