//! Catalog readers backed by live databases.
//!
//! Each adapter implements [`fkguard_core::CatalogReader`] over a `sqlx` pool.

pub mod mysql;
pub mod options;
pub mod postgres;

pub use mysql::MySqlCatalog;
pub use options::CatalogOptions;
pub use postgres::PostgresCatalog;

pub use fkguard_core::CatalogReader;
