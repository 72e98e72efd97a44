// ABOUTME: Catalog module - typed snapshots of one database's schema objects
// ABOUTME: Exports the object model, the Snapshot bundle, and the CatalogSource seam

// Public only so tests/ can drive the engines without a database
#[doc(hidden)]
pub mod memory;
pub mod model;
pub mod reader;

#[doc(hidden)]
pub use memory::{MemoryCatalog, ScriptedFailure};
pub use model::{
    ColumnRef, Function, IndexRef, LiveConnection, ObjectKind, Owned, Sequence, Snapshot, Table, View,
};
pub use reader::{CatalogSource, PgCatalogReader};
