//! Read-only commands: job listing, job detail, budget figures.

use uuid::Uuid;

pub(crate) async fn list_jobs(limit: i64) -> anyhow::Result<()> {
    let pool = connect().await?;
    let rows = restock_db::list_import_jobs(&pool, limit).await?;

    if rows.is_empty() {
        println!("no import jobs yet");
        return Ok(());
    }

    for row in rows {
        println!(
            "{}  {:<10}  {:>4}/{:<4}  ok {:>4}  failed {:>4}  skipped {:>4}  {}",
            row.public_id,
            row.status,
            row.processed,
            row.total,
            row.succeeded,
            row.failed,
            row.skipped,
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

pub(crate) async fn show_job(job_id: Uuid) -> anyhow::Result<()> {
    let pool = connect().await?;
    let row = restock_db::get_import_job_by_public_id(&pool, job_id).await?;
    let errors = restock_db::list_job_errors(&pool, row.id).await?;

    println!("job {}", row.public_id);
    println!("  status:    {}", row.status);
    println!("  trigger:   {}", row.trigger_source);
    println!(
        "  progress:  {}/{} (ok {}, failed {}, skipped {})",
        row.processed, row.total, row.succeeded, row.failed, row.skipped
    );
    println!("  created:   {}", row.created_at);
    if let Some(completed_at) = row.completed_at {
        println!("  completed: {completed_at}");
    }

    if errors.is_empty() {
        println!("  errors:    none");
    } else {
        println!("  errors:");
        for error in errors {
            match error.identifier {
                Some(identifier) => {
                    println!("    [{:<15}] {} — {}", error.kind, identifier, error.message);
                }
                None => println!("    [{:<15}] {}", error.kind, error.message),
            }
        }
    }
    Ok(())
}

pub(crate) async fn show_budget() -> anyhow::Result<()> {
    // The budget counter lives in the server process; the CLI reports the
    // configured daily limit and cost model it would run with.
    let config = restock_core::load_app_config()?;
    println!("daily limit:         {} tokens", config.budget_daily_limit);
    println!(
        "cost per identifier: {} token(s)",
        config.budget_cost_per_identifier
    );
    Ok(())
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let config = restock_core::load_app_config()?;
    let pool_config = restock_db::PoolConfig::from_app_config(&config);
    Ok(restock_db::connect_pool(&config.database_url, pool_config).await?)
}
