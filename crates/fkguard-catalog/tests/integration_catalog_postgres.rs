use anyhow::{Context, Result, anyhow};
use fkguard_catalog::{CatalogReader, PostgresCatalog};
use fkguard_core::{
    AuditFilter, CycleCandidate, Error, FkAction, OrderOptions, RemediationOptions, RepairAction,
    TableRef, find_cycles, find_violations, fix_violations, order_tables, resolve_dependencies,
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, fs, path::PathBuf};

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/sql/postgres")
        .join(name)
}

async fn run_fixture(pool: &PgPool, name: &str) -> Result<()> {
    let path = fixture_path(name);
    let script = fs::read_to_string(&path)
        .with_context(|| format!("reading fixture {}", path.display()))?;

    for statement in script.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }

        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture {name}"))?;
    }

    Ok(())
}

async fn connect() -> Result<Option<PgPool>> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to Postgres")?;
    Ok(Some(pool))
}

fn position(order: &[TableRef], name: &str) -> Result<usize> {
    order
        .iter()
        .position(|table| table.name == name)
        .ok_or_else(|| anyhow!("expected {name} in order"))
}

#[tokio::test]
async fn orders_tables_and_detects_cycles() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    run_fixture(&pool, "001_fk_graph.sql").await?;
    let catalog = PostgresCatalog::new(pool);

    let ordered = order_tables(
        &catalog,
        &OrderOptions {
            schema: Some("fkguard_shop".to_string()),
            by_size: true,
        },
    )
    .await?;
    let order: Vec<TableRef> = ordered.iter().map(|item| item.table.clone()).collect();
    assert_eq!(order.len(), 4);
    assert!(position(&order, "customers")? < position(&order, "orders")?);
    assert!(position(&order, "orders")? < position(&order, "order_items")?);
    assert!(
        ordered.iter().all(|item| item.size_bytes.is_some()),
        "sizes are reported when ordering by size"
    );

    let closure =
        resolve_dependencies(&catalog, &TableRef::new("fkguard_shop", "order_items")).await?;
    assert_eq!(
        closure.dependencies.into_iter().collect::<Vec<_>>(),
        vec![
            TableRef::new("fkguard_shop", "customers"),
            TableRef::new("fkguard_shop", "orders"),
        ]
    );

    // Other tests rebuild their own schemas concurrently, so only ours are checked.
    let candidates: Vec<CycleCandidate> = catalog
        .list_all_foreign_key_tables()
        .await?
        .into_iter()
        .filter(|table| table.schema == "fkguard_shop" || table.schema == "fkguard_loop")
        .map(CycleCandidate::from)
        .collect();
    let cycles = find_cycles(&catalog, Some(candidates)).await?;
    let flagged: Vec<TableRef> = cycles.into_iter().map(|closure| closure.table).collect();
    assert_eq!(
        flagged,
        vec![
            TableRef::new("fkguard_loop", "a"),
            TableRef::new("fkguard_loop", "b"),
        ]
    );

    let err = order_tables(
        &catalog,
        &OrderOptions {
            schema: Some("fkguard_loop".to_string()),
            by_size: false,
        },
    )
    .await
    .expect_err("cyclic schema must not order");
    assert!(matches!(err, Error::CyclicDependency { .. }));

    assert!(
        !catalog
            .table_exists(&TableRef::new("fkguard_shop", "missing"))
            .await?
    );

    Ok(())
}

#[tokio::test]
async fn partition_clones_of_foreign_keys_are_ignored() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    run_fixture(&pool, "003_fk_partitions.sql").await?;
    let catalog = PostgresCatalog::new(pool);

    let closure =
        resolve_dependencies(&catalog, &TableRef::new("fkguard_parts", "event_notes")).await?;
    assert_eq!(
        closure.dependencies.into_iter().collect::<Vec<_>>(),
        vec![TableRef::new("fkguard_parts", "events")]
    );

    let constraints = catalog
        .list_foreign_key_constraints(Some("fkguard_parts"), None)
        .await?;
    let children: Vec<String> = constraints
        .iter()
        .map(|row| row.child_table.to_string())
        .collect();
    assert_eq!(
        children,
        vec!["fkguard_parts.event_notes", "fkguard_parts.event_tags"]
    );
    assert!(
        constraints
            .iter()
            .all(|row| row.parent_table.name == "events" || row.parent_table.name == "tags")
    );

    let ordered = order_tables(
        &catalog,
        &OrderOptions {
            schema: Some("fkguard_parts".to_string()),
            by_size: false,
        },
    )
    .await?;
    let order: Vec<TableRef> = ordered.iter().map(|item| item.table.clone()).collect();
    assert_eq!(order.len(), 4, "partitions are not listed: {order:?}");
    assert!(position(&order, "events")? < position(&order, "event_notes")?);
    assert!(position(&order, "tags")? < position(&order, "event_tags")?);

    Ok(())
}

#[tokio::test]
async fn audits_and_repairs_orphans() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    run_fixture(&pool, "002_fk_orphans.sql").await?;
    let catalog = PostgresCatalog::new(pool.clone());

    let filter = AuditFilter {
        schema: Some("fkguard_orphans".to_string()),
        ..AuditFilter::default()
    };
    let violations = find_violations(&catalog, &filter).await?;
    let found: Vec<(&str, u64, FkAction)> = violations
        .iter()
        .map(|violation| {
            (
                violation.constraint.name.as_str(),
                violation.count,
                violation.constraint.on_delete,
            )
        })
        .collect();
    assert_eq!(
        found,
        vec![
            ("order_items_order_fk", 1, FkAction::Cascade),
            ("orders_customer_fk", 1, FkAction::SetNull),
        ]
    );

    let nullified = fix_violations(
        &catalog,
        &RemediationOptions {
            schema: Some("fkguard_orphans".to_string()),
            ..RemediationOptions::default()
        },
    )
    .await?;
    assert_eq!(nullified.len(), 1);
    assert_eq!(nullified[0].action, Some(RepairAction::Nullify));
    assert_eq!(nullified[0].fixed, Some(1));

    let customer: Option<i32> =
        sqlx::query_scalar("select customer_id from fkguard_orphans.orders where id = 11")
            .fetch_one(&pool)
            .await?;
    assert_eq!(customer, None);

    let deleted = fix_violations(
        &catalog,
        &RemediationOptions {
            schema: Some("fkguard_orphans".to_string()),
            nullable_only: false,
            ..RemediationOptions::default()
        },
    )
    .await?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].constraint.name, "order_items_order_fk");
    assert_eq!(deleted[0].action, Some(RepairAction::Delete));

    let remaining: i64 = sqlx::query_scalar("select count(*) from fkguard_orphans.order_items")
        .fetch_one(&pool)
        .await?;
    assert_eq!(remaining, 1);

    assert!(find_violations(&catalog, &filter).await?.is_empty());

    Ok(())
}
