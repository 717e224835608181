use std::collections::BTreeSet;

use crate::catalog::CatalogReader;
use crate::error::{Error, Result};
use crate::model::{DependencyClosure, TableRef};
use crate::resolver::DependencyResolver;

/// A table to check for cycle membership, with its closure if already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCandidate {
    pub table: TableRef,
    pub dependencies: Option<BTreeSet<TableRef>>,
}

impl From<TableRef> for CycleCandidate {
    fn from(table: TableRef) -> Self {
        Self {
            table,
            dependencies: None,
        }
    }
}

impl From<DependencyClosure> for CycleCandidate {
    fn from(closure: DependencyClosure) -> Self {
        Self {
            table: closure.table,
            dependencies: Some(closure.dependencies),
        }
    }
}

/// Return the candidates whose dependency closure contains themselves.
///
/// Without candidates, every table with a foreign key to another table is
/// checked. The result flags involvement in some cycle; it does not isolate
/// the edges that form it.
pub async fn find_cycles<C>(
    catalog: &C,
    tables: Option<Vec<CycleCandidate>>,
) -> Result<Vec<DependencyClosure>>
where
    C: CatalogReader + ?Sized,
{
    let candidates = match tables {
        Some(candidates) => candidates,
        None => catalog
            .list_all_foreign_key_tables()
            .await
            .map_err(|err| Error::metadata("listing tables with foreign keys", err))?
            .into_iter()
            .map(CycleCandidate::from)
            .collect(),
    };

    let checked = candidates.len();
    let mut resolver = DependencyResolver::new(catalog);
    let mut cyclic = Vec::new();

    for candidate in candidates {
        let closure = match candidate.dependencies {
            Some(dependencies) => DependencyClosure {
                table: candidate.table,
                dependencies,
            },
            None => resolver.resolve(&candidate.table).await?,
        };

        if closure.is_cyclic() {
            tracing::warn!(event = "cycle_detected", table = %closure.table);
            cyclic.push(closure);
        }
    }

    tracing::debug!(
        event = "cycle_check_finished",
        checked = checked,
        cyclic = cyclic.len()
    );

    Ok(cyclic)
}
