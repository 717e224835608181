use thiserror::Error;

use crate::catalog::CatalogError;
use crate::model::{DependencyClosure, Violation};

/// Core error type shared across fkguard crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The catalog could not answer a structural query.
    #[error("metadata error while {context}: {source}")]
    Metadata {
        context: String,
        source: CatalogError,
    },
    /// No total order exists; the listed tables sit on at least one cycle.
    #[error("cyclic foreign key dependencies among: {}", list_tables(.tables))]
    CyclicDependency { tables: Vec<DependencyClosure> },
    /// A repair statement failed. `fixed` holds the violations repaired before it.
    #[error(
        "remediation failed on constraint {constraint} after {} repaired constraint(s): {source}",
        .fixed.len()
    )]
    Remediation {
        constraint: String,
        fixed: Vec<Violation>,
        source: CatalogError,
    },
}

impl Error {
    pub(crate) fn metadata(context: impl Into<String>, source: CatalogError) -> Self {
        Error::Metadata {
            context: context.into(),
            source,
        }
    }
}

fn list_tables(tables: &[DependencyClosure]) -> String {
    tables
        .iter()
        .map(|closure| closure.table.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias for results returned by fkguard crates.
pub type Result<T> = std::result::Result<T, Error>;
