use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogReader, ConstraintColumn};
use crate::error::{Error, Result};
use crate::model::{ColumnPair, Constraint, FkAction, TableRef, Violation};
use crate::statements::OrphanStatements;

/// Which foreign keys to audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub schema: Option<String>,
    pub table: Option<String>,
    /// Only audit `ON DELETE SET NULL` constraints.
    pub nullable_only: bool,
}

/// Find foreign keys with orphaned child rows.
///
/// Constraints without violating rows are left out of the result.
pub async fn find_violations<C>(catalog: &C, filter: &AuditFilter) -> Result<Vec<Violation>>
where
    C: CatalogReader + ?Sized,
{
    let rows = catalog
        .list_foreign_key_constraints(filter.schema.as_deref(), filter.table.as_deref())
        .await
        .map_err(|err| Error::metadata(format!("listing constraints of {}", scope(filter)), err))?;

    let constraints: Vec<Constraint> = group_constraints(rows)
        .into_iter()
        .filter(|constraint| !filter.nullable_only || constraint.on_delete == FkAction::SetNull)
        .collect();

    let dialect = catalog.dialect();
    let mut violations = Vec::new();

    for constraint in constraints {
        let Some(statements) = OrphanStatements::build(dialect, &constraint) else {
            tracing::warn!(event = "constraint_without_columns", constraint = %constraint.name);
            continue;
        };

        let count = catalog
            .execute_scalar(&statements.count, &[])
            .await
            .map_err(|err| {
                Error::metadata(
                    format!(
                        "counting violations of {} on {}",
                        constraint.name, constraint.child_table
                    ),
                    err,
                )
            })?;
        if count <= 0 {
            continue;
        }

        tracing::info!(
            event = "violation_found",
            constraint = %constraint.name,
            table = %constraint.child_table,
            on_delete = constraint.on_delete.as_rule(),
            count = count
        );

        violations.push(Violation {
            constraint,
            count: count as u64,
            select: statements.select,
            update: statements.update,
            delete: statements.delete,
            action: None,
            fixed: None,
        });
    }

    Ok(violations)
}

/// Group per-column constraint rows into constraints with ordered column pairs.
///
/// Rows are keyed by child table and constraint name: PostgreSQL only
/// requires foreign key names to be unique per table.
pub fn group_constraints(rows: Vec<ConstraintColumn>) -> Vec<Constraint> {
    let mut grouped: BTreeMap<(TableRef, String), (Constraint, Vec<(u32, ColumnPair)>)> =
        BTreeMap::new();

    for row in rows {
        let key = (row.child_table.clone(), row.constraint_name.clone());
        let (_, columns) = grouped.entry(key).or_insert_with(|| {
            (
                Constraint {
                    name: row.constraint_name.clone(),
                    child_table: row.child_table.clone(),
                    parent_table: row.parent_table.clone(),
                    columns: Vec::new(),
                    on_delete: FkAction::from_rule(&row.on_delete),
                },
                Vec::new(),
            )
        });
        columns.push((
            row.ordinal_position,
            ColumnPair {
                child: row.child_column,
                parent: row.parent_column,
            },
        ));
    }

    grouped
        .into_values()
        .map(|(mut constraint, mut columns)| {
            columns.sort_by_key(|(position, _)| *position);
            constraint.columns = columns.into_iter().map(|(_, pair)| pair).collect();
            constraint
        })
        .collect()
}

fn scope(filter: &AuditFilter) -> String {
    match (filter.schema.as_deref(), filter.table.as_deref()) {
        (Some(schema), Some(table)) => format!("{schema}.{table}"),
        (Some(schema), None) => schema.to_string(),
        (None, Some(table)) => format!("*.{table}"),
        (None, None) => "all schemas".to_string(),
    }
}
