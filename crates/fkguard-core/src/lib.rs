//! Core contracts and algorithms for fkguard.
//!
//! This crate orders tables by foreign-key dependency, flags tables caught in
//! dependency cycles, and audits/repairs rows that violate foreign keys. All
//! database access goes through the [`CatalogReader`] trait so that adapters
//! live in separate crates.

pub mod audit;
pub mod catalog;
pub mod cycles;
pub mod dialect;
pub mod error;
pub mod model;
pub mod order;
pub mod remediate;
pub mod resolver;
pub mod statements;

pub use audit::{AuditFilter, find_violations, group_constraints};
pub use catalog::{
    CatalogError, CatalogReader, CatalogResult, ConstraintColumn, ForeignKeyRef, SqlParam,
};
pub use cycles::{CycleCandidate, find_cycles};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use model::{
    ColumnPair, Constraint, DependencyClosure, DependencyEdge, FkAction, OrderedTable,
    RepairAction, TableRef, Violation,
};
pub use order::{OrderOptions, order_tables};
pub use remediate::{RemediationOptions, fix_violations};
pub use resolver::{DependencyResolver, resolve_dependencies};
pub use statements::OrphanStatements;
