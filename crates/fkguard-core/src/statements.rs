use crate::dialect::Dialect;
use crate::model::Constraint;

const CHILD_ALIAS: &str = "child";
const PARENT_ALIAS: &str = "parent";
const ORPHANS_ALIAS: &str = "orphans";

/// SQL text that finds and repairs rows violating one foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanStatements {
    pub select: String,
    pub count: String,
    pub update: String,
    pub delete: String,
}

impl OrphanStatements {
    /// Build the statements for `constraint`. Only identifiers are interpolated, always quoted.
    ///
    /// Returns `None` for a constraint without columns.
    pub fn build(dialect: Dialect, constraint: &Constraint) -> Option<Self> {
        let first = constraint.columns.first()?;

        let child = |column: &str| format!("{CHILD_ALIAS}.{}", dialect.quote_ident(column));
        let parent = |column: &str| format!("{PARENT_ALIAS}.{}", dialect.quote_ident(column));

        let child_columns: Vec<String> = constraint
            .columns
            .iter()
            .map(|pair| child(&pair.child))
            .collect();
        let bare_columns: Vec<String> = constraint
            .columns
            .iter()
            .map(|pair| dialect.quote_ident(&pair.child))
            .collect();
        let on_clause = constraint
            .columns
            .iter()
            .map(|pair| dialect.null_safe_eq(&child(&pair.child), &parent(&pair.parent)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let populated = constraint
            .columns
            .iter()
            .map(|pair| format!("{} IS NOT NULL", child(&pair.child)))
            .collect::<Vec<_>>()
            .join(" OR ");

        let child_table = dialect.qualified(&constraint.child_table);
        let orphan_source = format!(
            "FROM {child_table} AS {CHILD_ALIAS} LEFT JOIN {} AS {PARENT_ALIAS} ON {on_clause} \
             WHERE ({populated}) AND {} IS NULL",
            dialect.qualified(&constraint.parent_table),
            parent(&first.parent),
        );

        let select_body = format!("SELECT {} {orphan_source}", child_columns.join(", "));
        let tuple = bare_columns.join(", ");
        // The derived table lets MySQL read the table it is modifying.
        let scope = format!(
            "({tuple}) IN (SELECT {tuple} FROM ({select_body}) AS {ORPHANS_ALIAS})"
        );
        let assignments = bare_columns
            .iter()
            .map(|column| format!("{column} = NULL"))
            .collect::<Vec<_>>()
            .join(", ");

        Some(Self {
            select: format!("{select_body};"),
            count: format!("SELECT COUNT(*) {orphan_source};"),
            update: format!("UPDATE {child_table} SET {assignments} WHERE {scope};"),
            delete: format!("DELETE FROM {child_table} WHERE {scope};"),
        })
    }
}
