#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use fkguard_core::{
    CatalogError, CatalogReader, CatalogResult, ConstraintColumn, Dialect, ForeignKeyRef,
    OrderedTable, OrphanStatements, SqlParam, TableRef, group_constraints,
};

pub type Row = BTreeMap<String, Option<i64>>;

#[derive(Debug, Default)]
struct MemoryTable {
    size: u64,
    rows: Vec<Row>,
}

#[derive(Debug, Clone)]
struct MemoryForeignKey {
    name: String,
    child: TableRef,
    parent: TableRef,
    columns: Vec<(String, String)>,
    on_delete: String,
}

/// Catalog double holding tables, foreign keys and integer-valued rows.
///
/// It answers exactly the count/update/delete statements the auditor builds
/// for its foreign keys and applies them to the stored rows.
pub struct MemoryCatalog {
    dialect: Dialect,
    tables: Mutex<BTreeMap<TableRef, MemoryTable>>,
    foreign_keys: Vec<MemoryForeignKey>,
    failing_table: Option<TableRef>,
    failing_reads: BTreeSet<&'static str>,
    writes: Mutex<Vec<String>>,
}

pub fn table(schema: &str, name: &str) -> TableRef {
    TableRef::new(schema, name)
}

pub fn row(values: &[(&str, Option<i64>)]) -> Row {
    values
        .iter()
        .map(|(column, value)| (column.to_string(), *value))
        .collect()
}

impl MemoryCatalog {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Mutex::new(BTreeMap::new()),
            foreign_keys: Vec::new(),
            failing_table: None,
            failing_reads: BTreeSet::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_table(mut self, schema: &str, name: &str, size: u64) -> Self {
        self.tables
            .get_mut()
            .unwrap()
            .entry(table(schema, name))
            .or_default()
            .size = size;
        self
    }

    pub fn with_rows(mut self, schema: &str, name: &str, rows: Vec<Row>) -> Self {
        self.tables
            .get_mut()
            .unwrap()
            .entry(table(schema, name))
            .or_default()
            .rows
            .extend(rows);
        self
    }

    /// Register a foreign key; both tables are created when missing.
    pub fn with_foreign_key(
        mut self,
        name: &str,
        child: (&str, &str),
        parent: (&str, &str),
        columns: &[(&str, &str)],
        on_delete: &str,
    ) -> Self {
        let child = table(child.0, child.1);
        let parent = table(parent.0, parent.1);
        {
            let tables = self.tables.get_mut().unwrap();
            tables.entry(child.clone()).or_default();
            tables.entry(parent.clone()).or_default();
        }
        self.foreign_keys.push(MemoryForeignKey {
            name: name.to_string(),
            child,
            parent,
            columns: columns
                .iter()
                .map(|(child, parent)| (child.to_string(), parent.to_string()))
                .collect(),
            on_delete: on_delete.to_string(),
        });
        self
    }

    /// Shorthand for a single-column `NO ACTION` dependency edge.
    pub fn with_edge(self, child: (&str, &str), parent: (&str, &str)) -> Self {
        let name = format!("{}_{}_fk", child.1, parent.1);
        self.with_foreign_key(&name, child, parent, &[("parent_id", "id")], "NO ACTION")
    }

    pub fn failing_writes_on(mut self, schema: &str, name: &str) -> Self {
        self.failing_table = Some(table(schema, name));
        self
    }

    /// Make the named reader method (`"list_tables"`, `"execute_scalar"`, ...) fail.
    pub fn failing_reads_on(mut self, method: &'static str) -> Self {
        self.failing_reads.insert(method);
        self
    }

    fn read(&self, method: &str) -> CatalogResult<()> {
        if self.failing_reads.contains(method) {
            return Err(CatalogError::new(format!("{method} unavailable")));
        }
        Ok(())
    }

    pub fn rows(&self, schema: &str, name: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(&table(schema, name))
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn constraint_rows(fk: &MemoryForeignKey) -> Vec<ConstraintColumn> {
        fk.columns
            .iter()
            .enumerate()
            .map(|(idx, (child, parent))| ConstraintColumn {
                constraint_name: fk.name.clone(),
                child_table: fk.child.clone(),
                child_column: child.clone(),
                parent_table: fk.parent.clone(),
                parent_column: parent.clone(),
                on_delete: fk.on_delete.clone(),
                ordinal_position: idx as u32 + 1,
            })
            .collect()
    }

    fn statements(&self, fk: &MemoryForeignKey) -> Option<OrphanStatements> {
        let constraint = group_constraints(Self::constraint_rows(fk)).into_iter().next()?;
        OrphanStatements::build(self.dialect, &constraint)
    }

    fn child_values(fk: &MemoryForeignKey, row: &Row) -> Vec<Option<i64>> {
        fk.columns
            .iter()
            .map(|(child, _)| row.get(child).copied().flatten())
            .collect()
    }

    fn orphan_tuples(
        tables: &BTreeMap<TableRef, MemoryTable>,
        fk: &MemoryForeignKey,
    ) -> Vec<Vec<Option<i64>>> {
        let Some(child) = tables.get(&fk.child) else {
            return Vec::new();
        };
        let parent_rows: &[Row] = tables
            .get(&fk.parent)
            .map(|table| table.rows.as_slice())
            .unwrap_or(&[]);

        child
            .rows
            .iter()
            .map(|row| Self::child_values(fk, row))
            .filter(|values| values.iter().any(Option::is_some))
            .filter(|values| {
                !parent_rows.iter().any(|parent| {
                    fk.columns
                        .iter()
                        .zip(values.iter())
                        .all(|((_, column), value)| parent.get(column).copied().flatten() == *value)
                })
            })
            .collect()
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn table_exists(&self, table: &TableRef) -> CatalogResult<bool> {
        self.read("table_exists")?;
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn list_foreign_keys_of(&self, table: &TableRef) -> CatalogResult<Vec<ForeignKeyRef>> {
        self.read("list_foreign_keys_of")?;
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| &fk.child == table && fk.parent != fk.child)
            .flat_map(|fk| {
                fk.columns.iter().map(|(child, _)| ForeignKeyRef {
                    child_column: child.clone(),
                    references: fk.parent.clone(),
                })
            })
            .collect())
    }

    async fn list_all_foreign_key_tables(&self) -> CatalogResult<Vec<TableRef>> {
        self.read("list_all_foreign_key_tables")?;
        let tables: BTreeSet<TableRef> = self
            .foreign_keys
            .iter()
            .filter(|fk| fk.parent != fk.child)
            .map(|fk| fk.child.clone())
            .collect();
        Ok(tables.into_iter().collect())
    }

    async fn list_tables(
        &self,
        schema: Option<&str>,
        include_size: bool,
    ) -> CatalogResult<Vec<OrderedTable>> {
        self.read("list_tables")?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .filter(|(table, _)| !self.dialect.is_system_schema(&table.schema))
            .filter(|(table, _)| schema.is_none_or(|schema| table.schema == schema))
            .map(|(table, data)| OrderedTable {
                table: table.clone(),
                size_bytes: include_size.then_some(data.size),
            })
            .collect())
    }

    async fn list_foreign_key_constraints(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> CatalogResult<Vec<ConstraintColumn>> {
        self.read("list_foreign_key_constraints")?;
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| schema.is_none_or(|schema| fk.child.schema == schema))
            .filter(|fk| table.is_none_or(|table| fk.child.name == table))
            .flat_map(Self::constraint_rows)
            .collect())
    }

    async fn execute_scalar(&self, sql: &str, _params: &[SqlParam]) -> CatalogResult<i64> {
        self.read("execute_scalar")?;
        let tables = self.tables.lock().unwrap();
        for fk in &self.foreign_keys {
            if self.statements(fk).is_some_and(|statements| statements.count == sql) {
                return Ok(Self::orphan_tuples(&tables, fk).len() as i64);
            }
        }
        Err(CatalogError::new(format!("unrecognized query: {sql}")))
    }

    async fn execute_write(&self, sql: &str, _params: &[SqlParam]) -> CatalogResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        for fk in &self.foreign_keys {
            let Some(statements) = self.statements(fk) else {
                continue;
            };
            let nullify = statements.update == sql;
            if !nullify && statements.delete != sql {
                continue;
            }
            if self.failing_table.as_ref() == Some(&fk.child) {
                return Err(CatalogError::new(format!("write rejected on {}", fk.child)));
            }

            // Tuple IN never matches a tuple containing NULL.
            let targets: BTreeSet<Vec<Option<i64>>> = Self::orphan_tuples(&tables, fk)
                .into_iter()
                .filter(|values| values.iter().all(Option::is_some))
                .collect();
            let child = tables.get_mut(&fk.child).expect("child table");
            let is_target = |row: &Row| targets.contains(&Self::child_values(fk, row));

            let affected = child.rows.iter().filter(|row| is_target(*row)).count() as u64;
            if nullify {
                for row in child.rows.iter_mut() {
                    if !is_target(&*row) {
                        continue;
                    }
                    for (column, _) in &fk.columns {
                        row.insert(column.clone(), None);
                    }
                }
            } else {
                child.rows.retain(|row| !is_target(row));
            }

            self.writes.lock().unwrap().push(sql.to_string());
            return Ok(affected);
        }
        Err(CatalogError::new(format!("unrecognized statement: {sql}")))
    }
}
