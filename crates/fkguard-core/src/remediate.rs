use serde::{Deserialize, Serialize};

use crate::audit::{AuditFilter, find_violations};
use crate::catalog::CatalogReader;
use crate::error::{Error, Result};
use crate::model::{FkAction, RepairAction, Violation};

/// Options for [`fix_violations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationOptions {
    pub schema: Option<String>,
    pub table: Option<String>,
    /// Only repair `ON DELETE SET NULL` constraints. When false, orphans of
    /// every other rule are deleted.
    pub nullable_only: bool,
    /// Delete orphans even where they could be nulled out.
    pub force_delete: bool,
}

impl Default for RemediationOptions {
    fn default() -> Self {
        Self {
            schema: None,
            table: None,
            nullable_only: true,
            force_delete: false,
        }
    }
}

/// Repair foreign key violations and report the affected rows per constraint.
///
/// This writes to the database without a transaction. On a failed write the
/// error carries the violations repaired so far.
pub async fn fix_violations<C>(catalog: &C, options: &RemediationOptions) -> Result<Vec<Violation>>
where
    C: CatalogReader + ?Sized,
{
    let filter = AuditFilter {
        schema: options.schema.clone(),
        table: options.table.clone(),
        nullable_only: options.nullable_only,
    };
    let violations = find_violations(catalog, &filter).await?;
    let mut repaired = Vec::with_capacity(violations.len());

    for mut violation in violations {
        let action = choose_action(violation.constraint.on_delete, options.force_delete);
        let statement = match action {
            RepairAction::Nullify => &violation.update,
            RepairAction::Delete => &violation.delete,
        };

        let fixed = match catalog.execute_write(statement, &[]).await {
            Ok(fixed) => fixed,
            Err(source) => {
                tracing::error!(
                    event = "violation_fix_failed",
                    constraint = %violation.constraint.name,
                    table = %violation.constraint.child_table,
                    error = %source
                );
                return Err(Error::Remediation {
                    constraint: violation.constraint.name,
                    fixed: repaired,
                    source,
                });
            }
        };

        tracing::info!(
            event = "violation_fixed",
            constraint = %violation.constraint.name,
            table = %violation.constraint.child_table,
            action = ?action,
            fixed = fixed
        );

        violation.action = Some(action);
        violation.fixed = Some(fixed);
        repaired.push(violation);
    }

    Ok(repaired)
}

fn choose_action(on_delete: FkAction, force_delete: bool) -> RepairAction {
    if on_delete == FkAction::SetNull && !force_delete {
        RepairAction::Nullify
    } else {
        RepairAction::Delete
    }
}
