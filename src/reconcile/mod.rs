// ABOUTME: OwnershipReconciler - turns drifted catalog objects into an ordered statement plan
// ABOUTME: Groups by owner then schema in encounter order; functions form their own earlier batch

pub mod execute;
pub mod statement;

pub use execute::execute_batch;
pub use statement::{display_batch, ObjectName, OwnedKind, Privilege, Statement};

use crate::catalog::{ColumnRef, Function, Owned, Sequence, Snapshot, Table, View};
use crate::config::DEFAULT_RESERVED_ROLES;

/// Objects of one original owner, split by schema, both in first-seen order
#[derive(Debug)]
pub struct OwnerGroup<'a, T> {
    pub owner: &'a str,
    pub schemas: Vec<(&'a str, Vec<&'a T>)>,
}

/// Group objects by owner, then by schema, preserving encounter order
pub fn group_by_owner<'a, T: Owned>(objects: &[&'a T]) -> Vec<OwnerGroup<'a, T>> {
    let mut groups: Vec<OwnerGroup<'a, T>> = Vec::new();

    for &object in objects {
        let position = match groups.iter().position(|g| g.owner == object.owner()) {
            Some(position) => position,
            None => {
                groups.push(OwnerGroup {
                    owner: object.owner(),
                    schemas: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let schemas = &mut groups[position].schemas;
        match schemas.iter_mut().find(|(s, _)| *s == object.schema()) {
            Some((_, members)) => members.push(object),
            None => schemas.push((object.schema(), vec![object])),
        }
    }

    groups
}

/// A named set of statements executed in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub name: &'static str,
    pub statements: Vec<Statement>,
}

/// Ordered corrective statements for one database
///
/// `functions` runs as its own transaction before `objects`: altering a
/// function's owner can block on locks held by table-owning transactions, so
/// the two streams are never mixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Creates the required owner when it does not exist yet
    pub bootstrap: Vec<Statement>,
    pub functions: Vec<Statement>,
    /// Table, sequence, and view statements, in that order
    pub objects: Vec<(OwnedKind, Vec<Statement>)>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.bootstrap.is_empty()
            && self.functions.is_empty()
            && self.objects.iter().all(|(_, s)| s.is_empty())
    }

    pub fn statements_for(&self, kind: OwnedKind) -> &[Statement] {
        if kind == OwnedKind::Function {
            return &self.functions;
        }
        self.objects
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }

    /// Table, sequence, and view statements flattened in plan order
    pub fn object_statements(&self) -> Vec<Statement> {
        self.objects
            .iter()
            .flat_map(|(_, statements)| statements.iter().cloned())
            .collect()
    }

    /// Non-empty batches in execution order: bootstrap, functions, objects
    pub fn batches(&self) -> Vec<Batch> {
        let batches = vec![
            Batch {
                name: "bootstrap",
                statements: self.bootstrap.clone(),
            },
            Batch {
                name: "functions",
                statements: self.functions.clone(),
            },
            Batch {
                name: "objects",
                statements: self.object_statements(),
            },
        ];
        batches
            .into_iter()
            .filter(|b| !b.statements.is_empty())
            .collect()
    }
}

/// Emits `GRANT ALL ON SCHEMA` the first time a schema is touched
#[derive(Debug)]
struct SchemaGrants<'a> {
    role: &'a str,
    granted: Vec<String>,
}

impl<'a> SchemaGrants<'a> {
    fn new(role: &'a str) -> Self {
        Self {
            role,
            granted: Vec::new(),
        }
    }

    fn ensure(&mut self, schema: &str, out: &mut Vec<Statement>) {
        if self.granted.iter().any(|s| s == schema) {
            return;
        }
        self.granted.push(schema.to_string());
        out.push(Statement::GrantSchema {
            schema: schema.to_string(),
            role: self.role.to_string(),
        });
    }
}

/// Plans ownership transfer of drifted objects to the required owner
#[derive(Debug, Clone)]
pub struct OwnershipReconciler {
    required_owner: String,
    reserved_roles: Vec<String>,
}

impl OwnershipReconciler {
    pub fn new(required_owner: impl Into<String>, reserved_roles: Vec<String>) -> Self {
        Self {
            required_owner: required_owner.into(),
            reserved_roles,
        }
    }

    /// Reconciler with the platform's default reserved roles
    pub fn with_default_roles(required_owner: impl Into<String>) -> Self {
        Self::new(
            required_owner,
            DEFAULT_RESERVED_ROLES.iter().map(|r| r.to_string()).collect(),
        )
    }

    pub fn required_owner(&self) -> &str {
        &self.required_owner
    }

    /// Owned by someone other than the required owner and not a reserved role
    pub fn is_drifted(&self, owner: &str) -> bool {
        owner != self.required_owner && !self.reserved_roles.iter().any(|r| r == owner)
    }

    pub fn drifted<'a, T: Owned>(&self, objects: &'a [T]) -> Vec<&'a T> {
        objects.iter().filter(|o| self.is_drifted(o.owner())).collect()
    }

    /// Build the full plan for one snapshot
    ///
    /// The function stream is built first and shares schema-grant bookkeeping
    /// with the object stream, so across the flattened plan every schema grant
    /// precedes every statement on an object in that schema.
    pub fn plan(&self, snapshot: &Snapshot) -> ReconciliationPlan {
        let mut grants = SchemaGrants::new(&self.required_owner);

        let functions = self.function_statements(&snapshot.functions, &mut grants);
        let tables = self.table_statements(&snapshot.tables, &mut grants);
        let sequences = self.sequence_statements(&snapshot.sequences, &mut grants);
        let views = self.view_statements(&snapshot.views, &mut grants);

        ReconciliationPlan {
            bootstrap: Vec::new(),
            functions,
            objects: vec![
                (OwnedKind::Table, tables),
                (OwnedKind::Sequence, sequences),
                (OwnedKind::View, views),
            ],
        }
    }

    /// Statements creating the required owner on a database that lacks it
    pub fn bootstrap(
        &self,
        database: &str,
        password: String,
        schemas: &[String],
    ) -> Vec<Statement> {
        let mut statements = vec![
            Statement::CreateRole {
                role: self.required_owner.clone(),
                password,
            },
            Statement::GrantDatabase {
                database: database.to_string(),
                role: self.required_owner.clone(),
            },
        ];
        statements.extend(schemas.iter().map(|schema| Statement::GrantSchema {
            schema: schema.clone(),
            role: self.required_owner.clone(),
        }));
        statements
    }

    fn alter_owner(&self, kind: OwnedKind, object: ObjectName) -> Statement {
        Statement::AlterOwner {
            kind,
            object,
            owner: self.required_owner.clone(),
        }
    }

    fn table_statements(&self, tables: &[Table], grants: &mut SchemaGrants) -> Vec<Statement> {
        let mut out = Vec::new();
        for group in group_by_owner(&self.drifted(tables)) {
            tracing::info!("{}, tables: {}", group.owner, describe(&group));
            for (schema, members) in &group.schemas {
                grants.ensure(schema, &mut out);
                for table in members {
                    let object = ObjectName::new(schema, &table.name);
                    out.push(self.alter_owner(OwnedKind::Table, object.clone()));
                    out.push(Statement::GrantOnObject {
                        kind: OwnedKind::Table,
                        privilege: Privilege::All,
                        object,
                        role: group.owner.to_string(),
                    });
                }
            }
        }
        out
    }

    fn sequence_statements(
        &self,
        sequences: &[Sequence],
        grants: &mut SchemaGrants,
    ) -> Vec<Statement> {
        let mut out = Vec::new();
        for group in group_by_owner(&self.drifted(sequences)) {
            tracing::info!("{}, sequences: {}", group.owner, describe(&group));
            for (schema, members) in &group.schemas {
                grants.ensure(schema, &mut out);
                for sequence in members {
                    let object = ObjectName::new(schema, &sequence.name);
                    out.push(self.alter_owner(OwnedKind::Sequence, object));
                }
                out.push(Statement::GrantAllSequencesInSchema {
                    schema: schema.to_string(),
                    role: group.owner.to_string(),
                });
            }
        }
        out
    }

    fn view_statements(&self, views: &[View], grants: &mut SchemaGrants) -> Vec<Statement> {
        let mut out = Vec::new();
        for group in group_by_owner(&self.drifted(views)) {
            tracing::debug!("{}, views: {}", group.owner, describe(&group));
            for (schema, members) in &group.schemas {
                grants.ensure(schema, &mut out);
                for view in members {
                    let object = ObjectName::new(schema, &view.name);
                    out.push(self.alter_owner(OwnedKind::View, object.clone()));
                    out.push(Statement::GrantOnObject {
                        kind: OwnedKind::View,
                        privilege: Privilege::Select,
                        object,
                        role: group.owner.to_string(),
                    });
                }
            }
        }
        out
    }

    fn function_statements(
        &self,
        functions: &[Function],
        grants: &mut SchemaGrants,
    ) -> Vec<Statement> {
        let mut out = Vec::new();
        for group in group_by_owner(&self.drifted(functions)) {
            tracing::debug!("{}, functions: {}", group.owner, describe(&group));
            for (schema, members) in &group.schemas {
                grants.ensure(schema, &mut out);
                for function in members {
                    let object = ObjectName::function(schema, &function.name, &function.arguments);
                    out.push(self.alter_owner(OwnedKind::Function, object.clone()));
                    out.push(Statement::GrantOnObject {
                        kind: OwnedKind::Function,
                        privilege: Privilege::Execute,
                        object,
                        role: group.owner.to_string(),
                    });
                }
            }
        }
        out
    }
}

fn describe<T: Owned>(group: &OwnerGroup<'_, T>) -> String {
    group
        .schemas
        .iter()
        .map(|(schema, members)| format!("{} ({})", schema, members.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE SEQUENCE` statements for sequences missing on the destination
///
/// The owning column comes from `owned_by_override` when configured,
/// otherwise from the source sequence's own catalog entry. A sequence with no
/// owning column on the source is created without `OWNED BY`.
pub fn missing_sequence_statements(
    missing: &[Sequence],
    owned_by_override: Option<&ColumnRef>,
) -> Vec<Statement> {
    missing
        .iter()
        .map(|sequence| Statement::CreateSequence {
            object: ObjectName::new(&sequence.schema, &sequence.name),
            owned_by: owned_by_override
                .cloned()
                .or_else(|| sequence.owned_by.clone()),
        })
        .collect()
}

/// `TRUNCATE ... CASCADE` for each table, in the given order
pub fn truncate_statements(tables: &[Table]) -> Vec<Statement> {
    tables
        .iter()
        .map(|table| Statement::Truncate {
            object: ObjectName::new(&table.schema, &table.name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_grouping_preserves_encounter_order() {
        let tables = vec![
            table("zeta", "t1", "bob"),
            table("alpha", "t2", "alice"),
            table("zeta", "t3", "alice"),
            table("alpha", "t4", "bob"),
            table("zeta", "t5", "bob"),
        ];
        let refs: Vec<&Table> = tables.iter().collect();
        let groups = group_by_owner(&refs);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].owner, "bob");
        assert_eq!(groups[0].schemas[0].0, "zeta");
        assert_eq!(
            groups[0].schemas[0]
                .1
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>(),
            vec!["t1", "t5"]
        );
        assert_eq!(groups[0].schemas[1].0, "alpha");
        assert_eq!(groups[1].owner, "alice");
        assert_eq!(groups[1].schemas[0].0, "alpha");
    }

    #[test]
    fn test_reserved_roles_never_drift() {
        let reconciler = OwnershipReconciler::with_default_roles("app_owner");
        assert!(!reconciler.is_drifted("app_owner"));
        assert!(!reconciler.is_drifted("rdsadmin"));
        assert!(!reconciler.is_drifted("rds_superuser"));
        assert!(reconciler.is_drifted("legacy"));

        let custom = OwnershipReconciler::new("app_owner", vec!["cloudsqladmin".to_string()]);
        assert!(custom.is_drifted("rdsadmin"));
        assert!(!custom.is_drifted("cloudsqladmin"));
    }

    #[test]
    fn test_sequence_grant_is_schema_level_after_group() {
        let snapshot = Snapshot {
            sequences: vec![
                sequence("public", "a_id_seq", "legacy"),
                sequence("public", "b_id_seq", "legacy"),
            ],
            ..Default::default()
        };
        let plan = OwnershipReconciler::with_default_roles("app_owner").plan(&snapshot);
        let rendered: Vec<String> = plan
            .statements_for(OwnedKind::Sequence)
            .iter()
            .map(Statement::render)
            .collect();

        assert_eq!(
            rendered,
            vec![
                "GRANT ALL ON SCHEMA \"public\" TO \"app_owner\";",
                "ALTER SEQUENCE \"public\".\"a_id_seq\" OWNER TO \"app_owner\";",
                "ALTER SEQUENCE \"public\".\"b_id_seq\" OWNER TO \"app_owner\";",
                "GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA \"public\" TO \"legacy\";",
            ]
        );
    }

    #[test]
    fn test_schema_grant_emitted_once_across_kinds() {
        let snapshot = Snapshot {
            tables: vec![table("public", "a", "legacy")],
            views: vec![View {
                schema: "public".to_string(),
                name: "v".to_string(),
                owner: "other".to_string(),
            }],
            ..Default::default()
        };
        let plan = OwnershipReconciler::with_default_roles("app_owner").plan(&snapshot);
        let grants = plan
            .object_statements()
            .iter()
            .filter(|s| matches!(s, Statement::GrantSchema { .. }))
            .count();
        assert_eq!(grants, 1);
        assert_eq!(plan.statements_for(OwnedKind::View).len(), 2);
    }

    #[test]
    fn test_empty_plan_has_no_batches() {
        let snapshot = Snapshot {
            tables: vec![table("public", "a", "app_owner"), table("public", "b", "rdsadmin")],
            ..Default::default()
        };
        let plan = OwnershipReconciler::with_default_roles("app_owner").plan(&snapshot);
        assert!(plan.is_empty());
        assert!(plan.batches().is_empty());
    }

    #[test]
    fn test_bootstrap_statements() {
        let reconciler = OwnershipReconciler::with_default_roles("app_owner");
        let statements =
            reconciler.bootstrap("app", "pw".to_string(), &["pglogical".to_string()]);
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[1].render(),
            "GRANT ALL PRIVILEGES ON DATABASE \"app\" TO \"app_owner\";"
        );
        assert_eq!(
            statements[2].render(),
            "GRANT ALL ON SCHEMA \"pglogical\" TO \"app_owner\";"
        );
    }

    #[test]
    fn test_missing_sequence_owning_column_resolution() {
        let mut owned = sequence("public", "tasks_unique_id_seq", "app");
        owned.owned_by = Some(ColumnRef::new("public", "tasks", "unique_id"));
        let free = sequence("public", "free_seq", "app");

        let derived = missing_sequence_statements(&[owned.clone(), free.clone()], None);
        assert!(derived[0]
            .render()
            .ends_with("OWNED BY \"public\".\"tasks\".\"unique_id\";"));
        assert!(!derived[1].render().contains("OWNED BY"));

        let jobs_id = ColumnRef {
            schema: None,
            table: "jobs".to_string(),
            column: "id".to_string(),
        };
        let overridden = missing_sequence_statements(&[free], Some(&jobs_id));
        assert!(overridden[0]
            .render()
            .ends_with("OWNED BY \"jobs\".\"id\";"));
    }

    #[test]
    fn test_truncate_statements_keep_order() {
        let statements =
            truncate_statements(&[table("public", "b", "x"), table("public", "a", "x")]);
        assert_eq!(
            statements[0].render(),
            "TRUNCATE TABLE \"public\".\"b\" CASCADE;"
        );
        assert_eq!(statements[1].schema(), Some("public"));
    }
}
