use sqlx::MySqlPool;

use fkguard_core::{
    CatalogError, CatalogResult, ConstraintColumn, ForeignKeyRef, OrderedTable, SqlParam,
    TableRef,
};

// information_schema columns are cast to CHAR because some server versions
// report them as binary strings.

pub async fn table_exists(pool: &MySqlPool, schema: &str, table: &str) -> CatalogResult<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = ?
          AND TABLE_NAME = ?
          AND TABLE_TYPE = 'BASE TABLE'
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|err| CatalogError::with_source("checking table existence", err))?;

    Ok(count > 0)
}

pub async fn list_foreign_keys_of(
    pool: &MySqlPool,
    schema: &str,
    table: &str,
) -> CatalogResult<Vec<ForeignKeyRef>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"
        SELECT DISTINCT
          CAST(COLUMN_NAME AS CHAR) AS child_column,
          CAST(REFERENCED_TABLE_SCHEMA AS CHAR) AS ref_schema,
          CAST(REFERENCED_TABLE_NAME AS CHAR) AS ref_table
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = ?
          AND TABLE_NAME = ?
          AND REFERENCED_TABLE_NAME IS NOT NULL
          AND NOT (REFERENCED_TABLE_SCHEMA = TABLE_SCHEMA AND REFERENCED_TABLE_NAME = TABLE_NAME)
        ORDER BY ref_schema, ref_table, child_column
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| CatalogError::with_source("listing foreign keys", err))?;

    Ok(rows
        .into_iter()
        .map(|(child_column, ref_schema, ref_table)| ForeignKeyRef {
            child_column,
            references: TableRef::new(ref_schema, ref_table),
        })
        .collect())
}

pub async fn list_all_foreign_key_tables(pool: &MySqlPool) -> CatalogResult<Vec<TableRef>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT DISTINCT
          CAST(TABLE_SCHEMA AS CHAR) AS table_schema,
          CAST(TABLE_NAME AS CHAR) AS table_name
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE REFERENCED_TABLE_SCHEMA IS NOT NULL
          AND NOT (REFERENCED_TABLE_SCHEMA = TABLE_SCHEMA AND REFERENCED_TABLE_NAME = TABLE_NAME)
        ORDER BY table_schema, table_name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|err| CatalogError::with_source("listing tables with foreign keys", err))?;

    Ok(rows
        .into_iter()
        .map(|(schema, name)| TableRef::new(schema, name))
        .collect())
}

pub async fn list_tables(
    pool: &MySqlPool,
    excluded: &[String],
    schema: Option<&str>,
    include_size: bool,
) -> CatalogResult<Vec<OrderedTable>> {
    let exclusion = if excluded.is_empty() {
        String::new()
    } else {
        format!(
            "AND TABLE_SCHEMA NOT IN ({})",
            vec!["?"; excluded.len()].join(", ")
        )
    };
    let sql = format!(
        r#"
        SELECT
          CAST(TABLE_SCHEMA AS CHAR) AS table_schema,
          CAST(TABLE_NAME AS CHAR) AS table_name,
          CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS SIGNED) AS size
        FROM information_schema.TABLES
        WHERE TABLE_TYPE = 'BASE TABLE'
          {exclusion}
          AND (? IS NULL OR TABLE_SCHEMA = ?)
        ORDER BY table_schema, table_name
        "#
    );

    let mut query = sqlx::query_as::<_, (String, String, i64)>(&sql);
    for name in excluded {
        query = query.bind(name.as_str());
    }

    let rows = query
        .bind(schema)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(|err| CatalogError::with_source("listing tables", err))?;

    Ok(rows
        .into_iter()
        .map(|(schema, name, size)| OrderedTable {
            table: TableRef::new(schema, name),
            size_bytes: include_size
                .then(|| u64::try_from(size).ok())
                .flatten(),
        })
        .collect())
}

type RawConstraintColumn = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
);

pub async fn list_foreign_key_constraints(
    pool: &MySqlPool,
    schema: Option<&str>,
    table: Option<&str>,
) -> CatalogResult<Vec<ConstraintColumn>> {
    let rows = sqlx::query_as::<_, RawConstraintColumn>(
        r#"
        SELECT
          CAST(tc.CONSTRAINT_NAME AS CHAR),
          CAST(tc.TABLE_SCHEMA AS CHAR),
          CAST(tc.TABLE_NAME AS CHAR),
          CAST(kcu.COLUMN_NAME AS CHAR),
          CAST(kcu.REFERENCED_TABLE_SCHEMA AS CHAR),
          CAST(kcu.REFERENCED_TABLE_NAME AS CHAR),
          CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR),
          CAST(rc.DELETE_RULE AS CHAR),
          CAST(kcu.ORDINAL_POSITION AS SIGNED)
        FROM information_schema.TABLE_CONSTRAINTS AS tc
        JOIN information_schema.KEY_COLUMN_USAGE AS kcu
          ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
          AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA
          AND tc.TABLE_NAME = kcu.TABLE_NAME
        JOIN information_schema.REFERENTIAL_CONSTRAINTS AS rc
          ON tc.CONSTRAINT_NAME = rc.CONSTRAINT_NAME
          AND tc.TABLE_SCHEMA = rc.CONSTRAINT_SCHEMA
        WHERE tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
          AND (? IS NULL OR tc.TABLE_SCHEMA = ?)
          AND (? IS NULL OR tc.TABLE_NAME = ?)
        ORDER BY tc.TABLE_SCHEMA, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#,
    )
    .bind(schema)
    .bind(schema)
    .bind(table)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| CatalogError::with_source("listing foreign key constraints", err))?;

    Ok(rows
        .into_iter()
        .map(
            |(name, child_schema, child_table, child_column, ref_schema, ref_table, ref_column, rule, ord)| {
                ConstraintColumn {
                    constraint_name: name,
                    child_table: TableRef::new(child_schema, child_table),
                    child_column,
                    parent_table: TableRef::new(ref_schema, ref_table),
                    parent_column: ref_column,
                    on_delete: rule,
                    ordinal_position: u32::try_from(ord).unwrap_or_default(),
                }
            },
        )
        .collect())
}

pub async fn execute_scalar(pool: &MySqlPool, sql: &str, params: &[SqlParam]) -> CatalogResult<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(statement_text(sql));
    for param in params {
        query = match param {
            SqlParam::Text(value) => query.bind(value.clone()),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Null => query.bind(None::<String>),
        };
    }

    query
        .fetch_one(pool)
        .await
        .map_err(|err| CatalogError::with_source("executing scalar query", err))
}

pub async fn execute_write(pool: &MySqlPool, sql: &str, params: &[SqlParam]) -> CatalogResult<u64> {
    let mut query = sqlx::query(statement_text(sql));
    for param in params {
        query = match param {
            SqlParam::Text(value) => query.bind(value.clone()),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Null => query.bind(None::<String>),
        };
    }

    let result = query
        .execute(pool)
        .await
        .map_err(|err| CatalogError::with_source("executing write statement", err))?;
    Ok(result.rows_affected())
}

// Prepared statements take a single statement without its terminator.
fn statement_text(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';')
}
