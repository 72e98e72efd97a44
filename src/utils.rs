// ABOUTME: Small helpers shared by the reader, the reconciler, and the commands
// ABOUTME: Identifier quoting, display sanitizing, and password generation

use rand::{distributions::Alphanumeric, Rng};

/// Quote an identifier for inclusion in SQL text
///
/// Always wraps in double quotes and doubles any embedded quote, so mixed-case
/// and reserved-word names survive unchanged.
///
/// # Examples
///
/// ```
/// # use pg_compare::utils::quote_ident;
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("Odd\"Name"), "\"Odd\"\"Name\"");
/// ```
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote a string literal for inclusion in SQL text
///
/// # Examples
///
/// ```
/// # use pg_compare::utils::quote_literal;
/// assert_eq!(quote_literal("2s"), "'2s'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a `schema."name"` pair the way every statement template expects
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Sanitize an identifier (table name, schema name, etc.) for display
///
/// Removes control characters and limits length to prevent log injection
/// and keep report rows readable.
///
/// **Note**: This is for display purposes only. SQL text goes through
/// [`quote_ident`].
///
/// # Examples
///
/// ```
/// # use pg_compare::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Generate a random alphanumeric password for a freshly created owner role
pub fn generate_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
