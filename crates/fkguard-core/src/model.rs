use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A table identified by its schema and name.
///
/// Equality and ordering are by the exact string pair; quoting is left to
/// [`crate::Dialect`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// `table` has a foreign key referencing `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub table: TableRef,
    pub depends_on: TableRef,
}

impl DependencyEdge {
    /// Self-references never count as dependencies.
    pub fn is_self_reference(&self) -> bool {
        self.table == self.depends_on
    }
}

/// Every table reachable from `table` through foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyClosure {
    pub table: TableRef,
    pub dependencies: BTreeSet<TableRef>,
}

impl DependencyClosure {
    /// True when some dependency eventually depends back on the table itself.
    pub fn is_cyclic(&self) -> bool {
        self.dependencies.contains(&self.table)
    }
}

/// A table in dependency order, optionally annotated with its size on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedTable {
    pub table: TableRef,
    pub size_bytes: Option<u64>,
}

/// Foreign key `ON DELETE` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    Unknown,
}

impl FkAction {
    /// Parse the textual rule reported by the catalog (`SET NULL`, `CASCADE`, ...).
    pub fn from_rule(rule: &str) -> Self {
        let normalized = rule.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "NO ACTION" => FkAction::NoAction,
            "RESTRICT" => FkAction::Restrict,
            "CASCADE" => FkAction::Cascade,
            "SET NULL" => FkAction::SetNull,
            "SET DEFAULT" => FkAction::SetDefault,
            _ => FkAction::Unknown,
        }
    }

    pub fn as_rule(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
            FkAction::Unknown => "UNKNOWN",
        }
    }
}

/// One child/parent column pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub child: String,
    pub parent: String,
}

/// Foreign key definition preserving column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub child_table: TableRef,
    pub parent_table: TableRef,
    pub columns: Vec<ColumnPair>,
    pub on_delete: FkAction,
}

/// How a violation was repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    Nullify,
    Delete,
}

/// Orphaned rows found for one constraint, with the statements to repair them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub constraint: Constraint,
    pub count: u64,
    pub select: String,
    pub update: String,
    pub delete: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RepairAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<u64>,
}
