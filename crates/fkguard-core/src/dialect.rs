use serde::{Deserialize, Serialize};

use crate::model::TableRef;

/// SQL flavour of the database behind a catalog reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    MySql,
    Postgres,
}

impl Dialect {
    /// Engine identifier used in logs and reports.
    pub fn engine(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Fully qualified, quoted table name.
    pub fn qualified(&self, table: &TableRef) -> String {
        format!(
            "{}.{}",
            self.quote_ident(&table.schema),
            self.quote_ident(&table.name)
        )
    }

    /// Comparison that treats two NULLs as equal.
    pub fn null_safe_eq(&self, left: &str, right: &str) -> String {
        match self {
            Dialect::MySql => format!("{left} <=> {right}"),
            Dialect::Postgres => format!("{left} IS NOT DISTINCT FROM {right}"),
        }
    }

    /// Schemas that never hold user tables.
    pub fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &[
                "information_schema",
                "performance_schema",
                "mysql",
                "sys",
                "test",
            ],
            Dialect::Postgres => &["information_schema", "pg_catalog", "pg_toast"],
        }
    }

    pub fn is_system_schema(&self, schema: &str) -> bool {
        if self.system_schemas().contains(&schema) {
            return true;
        }
        matches!(self, Dialect::Postgres) && schema.starts_with("pg_")
    }
}
