use fkguard_core::Dialect;

/// Options that control which schemas a catalog reader exposes.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Schemas to hide in addition to the dialect's system schemas.
    pub excluded_schemas: Vec<String>,
}

impl CatalogOptions {
    /// Every schema hidden from table listings for `dialect`.
    pub fn excluded_for(&self, dialect: Dialect) -> Vec<String> {
        let mut excluded: Vec<String> = dialect
            .system_schemas()
            .iter()
            .map(|schema| schema.to_string())
            .collect();
        for schema in &self.excluded_schemas {
            if !excluded.contains(schema) {
                excluded.push(schema.clone());
            }
        }
        excluded
    }
}
