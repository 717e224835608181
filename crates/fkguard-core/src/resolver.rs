use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::catalog::{CatalogError, CatalogReader};
use crate::error::{Error, Result};
use crate::model::{DependencyClosure, DependencyEdge, TableRef};

/// Resolve every table `table` transitively depends on.
pub async fn resolve_dependencies<C>(catalog: &C, table: &TableRef) -> Result<DependencyClosure>
where
    C: CatalogReader + ?Sized,
{
    DependencyResolver::new(catalog).resolve(table).await
}

/// Breadth-first closure over foreign keys.
///
/// Direct edges are memoized for the lifetime of the resolver, so one resolver
/// should live no longer than one operation.
pub struct DependencyResolver<'a, C: ?Sized> {
    catalog: &'a C,
    direct: HashMap<TableRef, Vec<TableRef>>,
}

impl<'a, C> DependencyResolver<'a, C>
where
    C: CatalogReader + ?Sized,
{
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            direct: HashMap::new(),
        }
    }

    /// Compute the closure of `table`. Terminates on cyclic graphs.
    pub async fn resolve(&mut self, table: &TableRef) -> Result<DependencyClosure> {
        let exists = self
            .catalog
            .table_exists(table)
            .await
            .map_err(|err| Error::metadata(format!("checking table {table}"), err))?;
        if !exists {
            return Err(Error::metadata(
                format!("resolving dependencies of {table}"),
                CatalogError::new(format!("table {table} does not exist")),
            ));
        }

        let mut dependencies = BTreeSet::new();
        let mut queue = VecDeque::from([table.clone()]);

        while let Some(current) = queue.pop_front() {
            for parent in self.direct_dependencies(&current).await? {
                if dependencies.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }

        tracing::debug!(
            event = "dependencies_resolved",
            table = %table,
            dependencies = dependencies.len()
        );

        Ok(DependencyClosure {
            table: table.clone(),
            dependencies,
        })
    }

    async fn direct_dependencies(&mut self, table: &TableRef) -> Result<Vec<TableRef>> {
        if let Some(parents) = self.direct.get(table) {
            return Ok(parents.clone());
        }

        let foreign_keys = self
            .catalog
            .list_foreign_keys_of(table)
            .await
            .map_err(|err| Error::metadata(format!("listing foreign keys of {table}"), err))?;

        let mut parents: Vec<TableRef> = foreign_keys
            .into_iter()
            .map(|fk| DependencyEdge {
                table: table.clone(),
                depends_on: fk.references,
            })
            .filter(|edge| !edge.is_self_reference())
            .map(|edge| edge.depends_on)
            .collect();
        parents.sort();
        parents.dedup();

        self.direct.insert(table.clone(), parents.clone());
        Ok(parents)
    }
}
