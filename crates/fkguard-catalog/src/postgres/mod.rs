use async_trait::async_trait;
use sqlx::PgPool;

use fkguard_core::{
    CatalogReader, CatalogResult, ConstraintColumn, Dialect, ForeignKeyRef, OrderedTable,
    SqlParam, TableRef,
};

use crate::options::CatalogOptions;

mod queries;

/// Catalog reader for PostgreSQL, built on `pg_catalog`.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
    excluded_schemas: Vec<String>,
}

impl PostgresCatalog {
    /// Create a new reader using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_options(pool, CatalogOptions::default())
    }

    /// Create a new reader with caller-provided options.
    pub fn with_options(pool: PgPool, options: CatalogOptions) -> Self {
        Self {
            excluded_schemas: options.excluded_for(Dialect::Postgres),
            pool,
        }
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalog {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn table_exists(&self, table: &TableRef) -> CatalogResult<bool> {
        queries::table_exists(&self.pool, &table.schema, &table.name).await
    }

    async fn list_foreign_keys_of(&self, table: &TableRef) -> CatalogResult<Vec<ForeignKeyRef>> {
        queries::list_foreign_keys_of(&self.pool, &table.schema, &table.name).await
    }

    async fn list_all_foreign_key_tables(&self) -> CatalogResult<Vec<TableRef>> {
        queries::list_all_foreign_key_tables(&self.pool).await
    }

    async fn list_tables(
        &self,
        schema: Option<&str>,
        include_size: bool,
    ) -> CatalogResult<Vec<OrderedTable>> {
        queries::list_tables(&self.pool, &self.excluded_schemas, schema, include_size).await
    }

    async fn list_foreign_key_constraints(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> CatalogResult<Vec<ConstraintColumn>> {
        queries::list_foreign_key_constraints(&self.pool, schema, table).await
    }

    async fn execute_scalar(&self, sql: &str, params: &[SqlParam]) -> CatalogResult<i64> {
        queries::execute_scalar(&self.pool, sql, params).await
    }

    async fn execute_write(&self, sql: &str, params: &[SqlParam]) -> CatalogResult<u64> {
        tracing::debug!(event = "write_statement", engine = "postgres", sql = %sql);
        queries::execute_write(&self.pool, sql, params).await
    }
}
