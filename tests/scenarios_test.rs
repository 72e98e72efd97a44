// ABOUTME: End-to-end comparison and reconciliation scenarios against in-memory catalogs
// ABOUTME: Exercises the public API without a database connection

use pg_compare::catalog::{
    Function, MemoryCatalog, ScriptedFailure, Sequence, Snapshot, Table, View,
};
use pg_compare::diff::{Cell, DiffEngine, DiffOptions, Side, STAT_QUERIES};
use pg_compare::reconcile::{OwnedKind, OwnershipReconciler, Statement};

fn table(schema: &str, name: &str, owner: &str) -> Table {
    Table {
        schema: schema.to_string(),
        name: name.to_string(),
        owner: owner.to_string(),
    }
}

fn sequence(schema: &str, name: &str, owner: &str) -> Sequence {
    Sequence {
        schema: schema.to_string(),
        name: name.to_string(),
        owner: owner.to_string(),
        owned_by: None,
    }
}

fn view(schema: &str, name: &str, owner: &str) -> View {
    View {
        schema: schema.to_string(),
        name: name.to_string(),
        owner: owner.to_string(),
    }
}

fn function(schema: &str, name: &str, owner: &str) -> Function {
    Function {
        schema: schema.to_string(),
        name: name.to_string(),
        owner: owner.to_string(),
        arguments: String::new(),
    }
}

fn with_stats(catalog: MemoryCatalog) -> MemoryCatalog {
    STAT_QUERIES
        .iter()
        .fold(catalog, |c, stat| c.with_scalar_count(stat.query, 0))
}

/// Drifted objects spread over several schemas and every kind
fn mixed_snapshot() -> Snapshot {
    Snapshot {
        tables: vec![
            table("billing", "invoices", "legacy"),
            table("public", "users", "required"),
            table("audit", "events", "etl"),
            table("public", "orders", "legacy"),
        ],
        sequences: vec![
            sequence("public", "orders_id_seq", "legacy"),
            sequence("audit", "events_id_seq", "etl"),
        ],
        views: vec![
            view("reporting", "daily", "analyst"),
            view("public", "active_users", "rdsadmin"),
        ],
        functions: vec![
            function("billing", "close_period", "legacy"),
            function("public", "touch", "rds_superuser"),
        ],
        ..Default::default()
    }
}

#[test]
fn test_schema_grant_precedes_every_statement_in_schema() {
    let plan = OwnershipReconciler::with_default_roles("required").plan(&mixed_snapshot());

    let mut flattened = plan.functions.clone();
    flattened.extend(plan.object_statements());

    let mut granted: Vec<String> = Vec::new();
    for statement in &flattened {
        match statement {
            Statement::GrantSchema { schema, .. } => {
                assert!(
                    !granted.contains(schema),
                    "schema {} granted twice",
                    schema
                );
                granted.push(schema.clone());
            }
            other => {
                let schema = other.schema().unwrap();
                assert!(
                    granted.iter().any(|g| g == schema),
                    "{} emitted before schema grant",
                    other
                );
            }
        }
    }
    assert_eq!(granted, vec!["billing", "public", "audit", "reporting"]);
}

#[test]
fn test_function_statements_are_disjoint_from_objects() {
    let plan = OwnershipReconciler::with_default_roles("required").plan(&mixed_snapshot());

    let function_kind = |s: &Statement| match s {
        Statement::AlterOwner { kind, .. } | Statement::GrantOnObject { kind, .. } => {
            Some(*kind == OwnedKind::Function)
        }
        _ => None,
    };

    assert!(plan.functions.iter().all(|s| function_kind(s) != Some(false)));
    assert!(plan
        .object_statements()
        .iter()
        .all(|s| function_kind(s) != Some(true)));

    let batches = plan.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].statements, plan.functions);
}

#[test]
fn test_reserved_role_objects_never_planned() {
    let plan = OwnershipReconciler::with_default_roles("required").plan(&mixed_snapshot());
    let rendered: Vec<String> = plan
        .functions
        .iter()
        .chain(plan.object_statements().iter())
        .map(Statement::render)
        .collect();

    assert!(!rendered.iter().any(|s| s.contains("\"touch\"")));
    assert!(!rendered.iter().any(|s| s.contains("\"active_users\"")));
    assert!(!rendered.iter().any(|s| s.contains("\"users\"")));
}

#[test]
fn test_single_drifted_table_scenario() {
    let snapshot = Snapshot {
        tables: vec![table("public", "a", "x"), table("public", "b", "required")],
        ..Default::default()
    };
    let plan = OwnershipReconciler::with_default_roles("required").plan(&snapshot);

    assert!(plan.functions.is_empty());
    let rendered: Vec<String> = plan
        .object_statements()
        .iter()
        .map(Statement::render)
        .collect();
    assert_eq!(
        rendered,
        vec![
            "GRANT ALL ON SCHEMA \"public\" TO \"required\";",
            "ALTER TABLE \"public\".\"a\" OWNER TO \"required\";",
            "GRANT ALL ON \"public\".\"a\" TO \"x\";",
        ]
    );
}

#[tokio::test]
async fn test_identical_catalogs_compare_clean() {
    let snapshot = mixed_snapshot();
    let source = with_stats(
        MemoryCatalog::new("source", snapshot.clone())
            .with_row_count("billing.invoices", 5)
            .with_row_count("public.users", 7)
            .with_row_count("audit.events", 0)
            .with_row_count("public.orders", 12),
    );
    let destination = with_stats(
        MemoryCatalog::new("destination", snapshot.clone())
            .with_row_count("billing.invoices", 5)
            .with_row_count("public.users", 7)
            .with_row_count("audit.events", 0)
            .with_row_count("public.orders", 12),
    );

    let report = DiffEngine::default()
        .compare(&snapshot, &snapshot, &source, &destination, |_| {})
        .await;

    assert!(report.is_clean());
    assert!(report.tables.missing.is_empty());
    assert_eq!(report.tables.compared, 4);
}

#[tokio::test]
async fn test_destination_timeout_continues_with_next_table() {
    let snapshot = Snapshot {
        tables: vec![
            table("public", "a", "x"),
            table("public", "c", "x"),
            table("public", "d", "x"),
        ],
        ..Default::default()
    };
    let source = MemoryCatalog::new("source", snapshot.clone())
        .with_row_count("public.a", 1)
        .with_row_count("public.c", 2)
        .with_row_count("public.d", 3);
    let destination = MemoryCatalog::new("destination", snapshot.clone())
        .with_row_count("public.a", 1)
        .with_row_count_failure("public.c", ScriptedFailure::Timeout)
        .with_row_count("public.d", 3);

    let mut visited = Vec::new();
    let result = DiffEngine::new(DiffOptions {
        show_false_only: true,
    })
    .compare_tables(&snapshot, &snapshot, &source, &destination, |t| {
        visited.push(t.name.clone())
    })
    .await;

    assert_eq!(visited, vec!["a", "c", "d"]);
    assert_eq!(result.compared, 3);
    assert_eq!(result.equal, 2);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].name, "public.c");
    assert_eq!(result.rows[0].destination, Cell::Failed);
    assert_eq!(result.failures[0].side, Side::Destination);
    assert!(result.failures[0].error.is_timeout());
}

#[test]
fn test_missing_sequence_scenario() {
    let source = Snapshot {
        sequences: vec![sequence("public", "s1", "x"), sequence("public", "s2", "x")],
        ..Default::default()
    };
    let destination = Snapshot {
        sequences: vec![sequence("public", "s1", "x")],
        ..Default::default()
    };

    let diff = DiffEngine::default().compare_sequences(&source, &destination);
    assert!(!diff.counts_equal);
    assert_eq!(diff.result.missing, vec!["public.s2"]);
    assert_eq!(diff.missing_sequences, vec![sequence("public", "s2", "x")]);
}
