use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogReader;
use crate::cycles::{CycleCandidate, find_cycles};
use crate::error::{Error, Result};
use crate::model::{DependencyClosure, OrderedTable, TableRef};
use crate::resolver::DependencyResolver;

/// Options for [`order_tables`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderOptions {
    /// Limit ordering to one schema.
    pub schema: Option<String>,
    /// Prefer smaller tables among those that become eligible together.
    pub by_size: bool,
}

/// Order tables so that every table comes after the tables it references.
///
/// Fails with [`Error::CyclicDependency`] when the remaining graph has a cycle.
/// Dependencies outside the listed tables (another schema when filtering) are
/// treated as already satisfied.
pub async fn order_tables<C>(catalog: &C, options: &OrderOptions) -> Result<Vec<OrderedTable>>
where
    C: CatalogReader + ?Sized,
{
    let listed = catalog
        .list_tables(options.schema.as_deref(), options.by_size)
        .await
        .map_err(|err| {
            let scope = options.schema.as_deref().unwrap_or("all schemas");
            Error::metadata(format!("listing tables in {scope}"), err)
        })?;
    let candidates = sort_candidates(listed, options.by_size);
    let scope: BTreeSet<TableRef> = candidates.iter().map(|item| item.table.clone()).collect();

    let mut resolver = DependencyResolver::new(catalog);
    let mut ordered = Vec::with_capacity(candidates.len());
    let mut placed = BTreeSet::new();
    let mut pending: Vec<(OrderedTable, DependencyClosure)> = Vec::new();

    for candidate in candidates {
        let closure = resolver.resolve(&candidate.table).await?;
        if closure.dependencies.is_empty() {
            placed.insert(candidate.table.clone());
            ordered.push(candidate);
        } else {
            pending.push((candidate, closure));
        }
    }

    let cyclic = find_cycles(
        catalog,
        Some(
            pending
                .iter()
                .map(|(_, closure)| CycleCandidate::from(closure.clone()))
                .collect(),
        ),
    )
    .await?;
    if !cyclic.is_empty() {
        return Err(Error::CyclicDependency { tables: cyclic });
    }

    let remaining: Vec<(OrderedTable, BTreeSet<TableRef>)> = pending
        .into_iter()
        .map(|(item, closure)| {
            let (inside, outside): (BTreeSet<TableRef>, BTreeSet<TableRef>) = closure
                .dependencies
                .into_iter()
                .partition(|dependency| scope.contains(dependency));
            if !outside.is_empty() {
                tracing::debug!(
                    event = "external_dependencies_skipped",
                    table = %item.table,
                    external = outside.len()
                );
            }
            (item, inside)
        })
        .collect();

    place_in_passes(remaining, &mut placed, &mut ordered)?;

    tracing::info!(
        event = "tables_ordered",
        schema = options.schema.as_deref().unwrap_or("*"),
        by_size = options.by_size,
        tables = ordered.len()
    );

    Ok(ordered)
}

/// Emit tables whose working set is fully placed, pass after pass.
///
/// A pass that places nothing fails with the stalled tables and what they still wait on.
fn place_in_passes(
    mut remaining: Vec<(OrderedTable, BTreeSet<TableRef>)>,
    placed: &mut BTreeSet<TableRef>,
    ordered: &mut Vec<OrderedTable>,
) -> Result<()> {
    while !remaining.is_empty() {
        let before = remaining.len();
        let mut blocked = Vec::with_capacity(before);

        for (item, mut working) in remaining {
            working.retain(|dependency| !placed.contains(dependency));
            if working.is_empty() {
                placed.insert(item.table.clone());
                ordered.push(item);
            } else {
                blocked.push((item, working));
            }
        }

        if blocked.len() == before {
            return Err(Error::CyclicDependency {
                tables: blocked
                    .into_iter()
                    .map(|(item, working)| DependencyClosure {
                        table: item.table,
                        dependencies: working,
                    })
                    .collect(),
            });
        }
        remaining = blocked;
    }
    Ok(())
}

fn sort_candidates(mut listed: Vec<OrderedTable>, by_size: bool) -> Vec<OrderedTable> {
    if by_size {
        listed.sort_by(|left, right| {
            left.size_bytes
                .unwrap_or(0)
                .cmp(&right.size_bytes.unwrap_or(0))
                .then_with(|| left.table.cmp(&right.table))
        });
    } else {
        listed.sort_by(|left, right| left.table.cmp(&right.table));
    }

    let mut seen = BTreeSet::new();
    listed.retain(|item| seen.insert(item.table.clone()));
    listed
}
