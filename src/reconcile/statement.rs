// ABOUTME: Structured corrective statements, rendered to SQL only at execution time
// ABOUTME: Covers ownership transfer, grants, role bootstrap, sequence creation, and truncation

use crate::catalog::ColumnRef;
use crate::utils::{qualified, quote_ident, quote_literal};
use std::fmt;

/// A schema-qualified object reference; functions carry their argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub schema: String,
    pub name: String,
    pub arguments: Option<String>,
}

impl ObjectName {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            arguments: None,
        }
    }

    pub fn function(schema: &str, name: &str, arguments: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            arguments: Some(arguments.to_string()),
        }
    }

    fn render(&self) -> String {
        match &self.arguments {
            Some(args) => format!("{}({})", qualified(&self.schema, &self.name), args),
            None => qualified(&self.schema, &self.name),
        }
    }
}

/// Object kinds whose ownership the reconciler transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnedKind {
    Table,
    Sequence,
    View,
    Function,
}

impl OwnedKind {
    fn keyword(self) -> &'static str {
        match self {
            OwnedKind::Table => "TABLE",
            OwnedKind::Sequence => "SEQUENCE",
            OwnedKind::View => "VIEW",
            OwnedKind::Function => "FUNCTION",
        }
    }
}

impl fmt::Display for OwnedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnedKind::Table => "tables",
            OwnedKind::Sequence => "sequences",
            OwnedKind::View => "views",
            OwnedKind::Function => "functions",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    All,
    Select,
    Execute,
}

impl Privilege {
    fn sql(self) -> &'static str {
        match self {
            Privilege::All => "ALL",
            Privilege::Select => "SELECT",
            Privilege::Execute => "EXECUTE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateRole {
        role: String,
        password: String,
    },
    GrantDatabase {
        database: String,
        role: String,
    },
    /// `GRANT ALL ON SCHEMA`; must precede ownership transfers in that schema
    GrantSchema {
        schema: String,
        role: String,
    },
    AlterOwner {
        kind: OwnedKind,
        object: ObjectName,
        owner: String,
    },
    GrantOnObject {
        kind: OwnedKind,
        privilege: Privilege,
        object: ObjectName,
        role: String,
    },
    GrantAllSequencesInSchema {
        schema: String,
        role: String,
    },
    CreateSequence {
        object: ObjectName,
        owned_by: Option<ColumnRef>,
    },
    Truncate {
        object: ObjectName,
    },
}

fn quote_column(column: &ColumnRef) -> String {
    let table = match &column.schema {
        Some(schema) => qualified(schema, &column.table),
        None => quote_ident(&column.table),
    };
    format!("{}.{}", table, quote_ident(&column.column))
}

impl Statement {
    /// Schema the statement touches, if it is scoped to one
    pub fn schema(&self) -> Option<&str> {
        match self {
            Statement::GrantSchema { schema, .. }
            | Statement::GrantAllSequencesInSchema { schema, .. } => Some(schema),
            Statement::AlterOwner { object, .. }
            | Statement::GrantOnObject { object, .. }
            | Statement::CreateSequence { object, .. }
            | Statement::Truncate { object } => Some(&object.schema),
            Statement::CreateRole { .. } | Statement::GrantDatabase { .. } => None,
        }
    }

    /// Literal SQL, terminated with `;`
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    fn render_with(&self, redact: bool) -> String {
        match self {
            Statement::CreateRole { role, password } => {
                let password = if redact {
                    "'********'".to_string()
                } else {
                    quote_literal(password)
                };
                format!("CREATE USER {} WITH PASSWORD {};", quote_ident(role), password)
            }
            Statement::GrantDatabase { database, role } => format!(
                "GRANT ALL PRIVILEGES ON DATABASE {} TO {};",
                quote_ident(database),
                quote_ident(role)
            ),
            Statement::GrantSchema { schema, role } => format!(
                "GRANT ALL ON SCHEMA {} TO {};",
                quote_ident(schema),
                quote_ident(role)
            ),
            Statement::AlterOwner {
                kind,
                object,
                owner,
            } => format!(
                "ALTER {} {} OWNER TO {};",
                kind.keyword(),
                object.render(),
                quote_ident(owner)
            ),
            Statement::GrantOnObject {
                kind,
                privilege,
                object,
                role,
            } => {
                let target = match kind {
                    OwnedKind::Function => format!("FUNCTION {}", object.render()),
                    _ => object.render(),
                };
                format!(
                    "GRANT {} ON {} TO {};",
                    privilege.sql(),
                    target,
                    quote_ident(role)
                )
            }
            Statement::GrantAllSequencesInSchema { schema, role } => format!(
                "GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA {} TO {};",
                quote_ident(schema),
                quote_ident(role)
            ),
            Statement::CreateSequence { object, owned_by } => {
                let mut sql = format!(
                    "CREATE SEQUENCE IF NOT EXISTS {} START 1 INCREMENT 1",
                    object.render()
                );
                if let Some(column) = owned_by {
                    sql.push_str(" OWNED BY ");
                    sql.push_str(&quote_column(column));
                }
                sql.push(';');
                sql
            }
            Statement::Truncate { object } => {
                format!("TRUNCATE TABLE {} CASCADE;", object.render())
            }
        }
    }
}

/// Displays the SQL with any password masked, for logs and confirmation prompts
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(true))
    }
}

/// A batch as the executor runs it, one statement per line, with passwords masked
pub fn display_batch(statements: &[Statement], lock_timeout: &str) -> String {
    let mut sql = format!("SET LOCAL lock_timeout = {};", quote_literal(lock_timeout));
    for statement in statements {
        sql.push('\n');
        sql.push_str(&statement.to_string());
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ownership_templates() {
        let table = Statement::AlterOwner {
            kind: OwnedKind::Table,
            object: ObjectName::new("public", "users"),
            owner: "app_owner".to_string(),
        };
        assert_eq!(
            table.render(),
            "ALTER TABLE \"public\".\"users\" OWNER TO \"app_owner\";"
        );

        let function = Statement::AlterOwner {
            kind: OwnedKind::Function,
            object: ObjectName::function("public", "touch", "id integer, note text"),
            owner: "app_owner".to_string(),
        };
        assert_eq!(
            function.render(),
            "ALTER FUNCTION \"public\".\"touch\"(id integer, note text) OWNER TO \"app_owner\";"
        );
    }

    #[test]
    fn test_render_grants() {
        let view = Statement::GrantOnObject {
            kind: OwnedKind::View,
            privilege: Privilege::Select,
            object: ObjectName::new("reporting", "daily"),
            role: "analyst".to_string(),
        };
        assert_eq!(
            view.render(),
            "GRANT SELECT ON \"reporting\".\"daily\" TO \"analyst\";"
        );

        let function = Statement::GrantOnObject {
            kind: OwnedKind::Function,
            privilege: Privilege::Execute,
            object: ObjectName::function("public", "touch", ""),
            role: "legacy".to_string(),
        };
        assert_eq!(
            function.render(),
            "GRANT EXECUTE ON FUNCTION \"public\".\"touch\"() TO \"legacy\";"
        );

        let sequences = Statement::GrantAllSequencesInSchema {
            schema: "public".to_string(),
            role: "legacy".to_string(),
        };
        assert_eq!(
            sequences.render(),
            "GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA \"public\" TO \"legacy\";"
        );
    }

    #[test]
    fn test_create_sequence_owned_by() {
        let with_owner = Statement::CreateSequence {
            object: ObjectName::new("public", "tasks_unique_id_seq"),
            owned_by: Some(ColumnRef {
                schema: None,
                table: "tasks".to_string(),
                column: "unique_id".to_string(),
            }),
        };
        assert_eq!(
            with_owner.render(),
            "CREATE SEQUENCE IF NOT EXISTS \"public\".\"tasks_unique_id_seq\" START 1 INCREMENT 1 \
             OWNED BY \"tasks\".\"unique_id\";"
        );

        let without = Statement::CreateSequence {
            object: ObjectName::new("public", "free_seq"),
            owned_by: None,
        };
        assert!(!without.render().contains("OWNED BY"));
    }

    #[test]
    fn test_create_sequence_owned_by_dotted_identifiers() {
        let statement = Statement::CreateSequence {
            object: ObjectName::new("public", "my.table_id_seq"),
            owned_by: Some(ColumnRef::new("public", "my.table", "id")),
        };
        assert_eq!(
            statement.render(),
            "CREATE SEQUENCE IF NOT EXISTS \"public\".\"my.table_id_seq\" START 1 INCREMENT 1 \
             OWNED BY \"public\".\"my.table\".\"id\";"
        );
    }

    #[test]
    fn test_display_redacts_password() {
        let statement = Statement::CreateRole {
            role: "app_owner".to_string(),
            password: "s3cret".to_string(),
        };
        assert!(statement.render().contains("'s3cret'"));
        assert!(!statement.to_string().contains("s3cret"));
        assert_eq!(statement.schema(), None);
    }

    #[test]
    fn test_display_batch_sets_lock_timeout_first() {
        let batch = vec![Statement::Truncate {
            object: ObjectName::new("public", "events"),
        }];
        let sql = display_batch(&batch, "2s");
        let mut lines = sql.lines();
        assert_eq!(lines.next(), Some("SET LOCAL lock_timeout = '2s';"));
        assert_eq!(
            lines.next(),
            Some("TRUNCATE TABLE \"public\".\"events\" CASCADE;")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_display_batch_masks_password() {
        let batch = vec![
            Statement::CreateRole {
                role: "app_owner".to_string(),
                password: "S3cretPw".to_string(),
            },
            Statement::GrantDatabase {
                database: "app".to_string(),
                role: "app_owner".to_string(),
            },
        ];
        let sql = display_batch(&batch, "2s");
        assert!(!sql.contains("S3cretPw"));
        assert!(sql.contains("CREATE USER \"app_owner\" WITH PASSWORD '********';"));
    }
}
