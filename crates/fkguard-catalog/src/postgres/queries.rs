use sqlx::PgPool;

// Foreign keys cloned onto partitions carry a non-zero `conparentid`; only the
// constraint declared on the partitioned table itself is reported.

use fkguard_core::{
    CatalogError, CatalogResult, ConstraintColumn, ForeignKeyRef, OrderedTable, SqlParam,
    TableRef,
};

pub async fn table_exists(pool: &PgPool, schema: &str, table: &str) -> CatalogResult<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        select exists (
          select 1
          from pg_class c
          join pg_namespace n on n.oid = c.relnamespace
          where n.nspname = $1::name
            and c.relname = $2::name
            and c.relkind in ('r', 'p')
        )
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|err| CatalogError::with_source("checking table existence", err))
}

pub async fn list_foreign_keys_of(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> CatalogResult<Vec<ForeignKeyRef>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"
        select distinct
          att.attname::text,
          ref_nsp.nspname::text,
          ref_rel.relname::text
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey) as k(attnum) on true
        join pg_attribute att on att.attrelid = con.conrelid and att.attnum = k.attnum
        where con.contype = 'f'
          and src_nsp.nspname = $1::name
          and src_rel.relname = $2::name
          and con.confrelid <> con.conrelid
          and con.conparentid = 0
        order by 2, 3, 1
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

pub async fn list_all_foreign_key_tables(pool: &PgPool) -> CatalogResult<Vec<TableRef>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        select distinct
          src_nsp.nspname::text,
          src_rel.relname::text
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        where con.contype = 'f'
          and con.confrelid <> con.conrelid
          and con.conparentid = 0
        order by 1, 2
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
    pool: &PgPool,
    excluded: &[String],
    schema: Option<&str>,
    include_size: bool,
) -> CatalogResult<Vec<OrderedTable>> {
    let rows = sqlx::query_as::<_, (String, String, Option<i64>)>(
        r#"
        select
          n.nspname::text,
          c.relname::text,
          case when $3::bool then pg_total_relation_size(c.oid) else null end
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where c.relkind in ('r', 'p')
          and not c.relispartition
          and n.nspname::text <> all($1)
          and n.nspname::text not like 'pg\_%'
          and ($2::text is null or n.nspname::text = $2)
        order by 1, 2
        "#,
    )
    .bind(excluded)
    .bind(schema)
    .bind(include_size)
    .fetch_all(pool)
    .await
    .map_err(|err| CatalogError::with_source("listing tables", err))?;

    Ok(rows
        .into_iter()
        .map(|(schema, name, size)| OrderedTable {
            table: TableRef::new(schema, name),
            size_bytes: size.and_then(|size| u64::try_from(size).ok()),
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
    i32,
);

pub async fn list_foreign_key_constraints(
    pool: &PgPool,
    schema: Option<&str>,
    table: Option<&str>,
) -> CatalogResult<Vec<ConstraintColumn>> {
    let rows = sqlx::query_as::<_, RawConstraintColumn>(
        r#"
        select
          con.conname::text,
          src_nsp.nspname::text,
          src_rel.relname::text,
          src_att.attname::text,
          ref_nsp.nspname::text,
          ref_rel.relname::text,
          ref_att.attname::text,
          case con.confdeltype
            when 'a' then 'NO ACTION'
            when 'r' then 'RESTRICT'
            when 'c' then 'CASCADE'
            when 'n' then 'SET NULL'
            when 'd' then 'SET DEFAULT'
            else 'UNKNOWN'
          end,
          k.ord::int4
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality as k(src_attnum, ref_attnum, ord) on true
        join pg_attribute src_att on src_att.attrelid = con.conrelid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = con.confrelid and ref_att.attnum = k.ref_attnum
        where con.contype = 'f'
          and con.conparentid = 0
          and ($1::text is null or src_nsp.nspname::text = $1)
          and ($2::text is null or src_rel.relname::text = $2)
        order by src_nsp.nspname, con.conname, k.ord
        "#,
    )
    .bind(schema)
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

pub async fn execute_scalar(pool: &PgPool, sql: &str, params: &[SqlParam]) -> CatalogResult<i64> {
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

pub async fn execute_write(pool: &PgPool, sql: &str, params: &[SqlParam]) -> CatalogResult<u64> {
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
