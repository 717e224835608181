use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialect::Dialect;
use crate::model::{OrderedTable, TableRef};

/// Failure reported by a catalog reader.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CatalogError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CatalogError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a lower-level error (usually a driver error) with a short message.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = format!("{}: {source}", message.into());
        Self {
            message,
            source: Some(Box::new(source)),
        }
    }
}

/// Convenience alias for catalog reader results.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// A foreign key column of a table and the table it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub child_column: String,
    pub references: TableRef,
}

/// One `(constraint, column position)` row of foreign key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintColumn {
    pub constraint_name: String,
    pub child_table: TableRef,
    pub child_column: String,
    pub parent_table: TableRef,
    pub parent_column: String,
    pub on_delete: String,
    pub ordinal_position: u32,
}

/// Bound query parameter. Values are never interpolated into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Null,
}

/// Read/write access to a database's metadata and data, implemented by adapters.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// SQL dialect used to quote identifiers in generated statements.
    fn dialect(&self) -> Dialect;

    async fn table_exists(&self, table: &TableRef) -> CatalogResult<bool>;

    /// Foreign keys of `table`, excluding ones that reference `table` itself.
    async fn list_foreign_keys_of(&self, table: &TableRef) -> CatalogResult<Vec<ForeignKeyRef>>;

    /// Tables with at least one foreign key to another table.
    async fn list_all_foreign_key_tables(&self) -> CatalogResult<Vec<TableRef>>;

    /// Tables outside system schemas, optionally limited to one schema.
    async fn list_tables(
        &self,
        schema: Option<&str>,
        include_size: bool,
    ) -> CatalogResult<Vec<OrderedTable>>;

    async fn list_foreign_key_constraints(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> CatalogResult<Vec<ConstraintColumn>>;

    /// Run a query returning a single integer (e.g. `COUNT(*)`).
    async fn execute_scalar(&self, sql: &str, params: &[SqlParam]) -> CatalogResult<i64>;

    /// Run a write statement and return the number of affected rows.
    async fn execute_write(&self, sql: &str, params: &[SqlParam]) -> CatalogResult<u64>;
}
