use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use crewdeck::availability::{AvailabilityHub, CrewStrategy, EquipmentStrategy};
use crewdeck::cache::ReadCache;
use crewdeck::model::{DateRange, SyncStatus};
use crewdeck::store::{self, ChangeFeed, ChangeFilter, Notification};
use crewdeck::sync::EventSyncEngine;
use crewdeck::{conflict, config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/crewdeck.db", cfg.app.data_dir));

    let pool = store::init_pool(&database_url).await?;
    store::run_migrations(&pool).await?;

    let cache = Arc::new(ReadCache::new(Duration::from_secs(cfg.app.cache_ttl_seconds)));
    let feed = ChangeFeed::default();

    // Feed consumer: the store may be written from other processes, so
    // cached reads are dropped on every notice rather than trusted.
    let consumer_cache = cache.clone();
    let mut subscription = feed.subscribe(None, ChangeFilter::default());
    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Notification::Change(change) => {
                    if let Some(project_id) = change.project_id {
                        consumer_cache.invalidate(crewdeck::cache::Scope::Project(project_id));
                    }
                    if let Some(event_id) = change.event_id {
                        consumer_cache.invalidate(crewdeck::cache::Scope::Event(event_id));
                    }
                }
                Notification::Lagged => {
                    warn!("change feed lagged; clearing cached reads");
                    consumer_cache.clear();
                }
                Notification::Closed => break,
            }
        }
    });

    let engine = EventSyncEngine::new(pool.clone(), cache.clone(), feed.clone());
    let equipment_hub = AvailabilityHub::new(
        Box::new(EquipmentStrategy::new(pool.clone())),
        cache.clone(),
        cfg.ordering.folders.clone(),
    );
    let crew_hub = AvailabilityHub::new(
        Box::new(CrewStrategy::new(pool.clone())),
        cache.clone(),
        cfg.ordering.departments.clone(),
    );

    info!("starting drift and overbooking scan");
    let scan_sleep = Duration::from_millis(cfg.app.scan_interval_ms);
    let horizon = cfg.availability.horizon_days;
    loop {
        if let Err(err) = scan(&pool, &engine, &equipment_hub, &crew_hub, horizon).await {
            error!(?err, "scan failed");
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }
        tokio::time::sleep(scan_sleep).await;
    }
}

/// One advisory pass: report events whose snapshots drifted from the
/// baseline and resource-days booked past capacity. Findings are logged,
/// never auto-repaired; sync stays an explicit user action.
async fn scan(
    pool: &store::Pool,
    engine: &EventSyncEngine,
    equipment_hub: &AvailabilityHub,
    crew_hub: &AvailabilityHub,
    horizon_days: u32,
) -> crewdeck::Result<()> {
    let today = Utc::now().date_naive();
    let range = DateRange::new(today, today + ChronoDuration::days(i64::from(horizon_days) - 1));

    let events = store::list_events_overlapping(pool, &range).await?;
    let mut drifted = 0usize;
    for event in &events {
        if engine.sync_status(event.id).await? == SyncStatus::OutOfSync {
            warn!(event_id = event.id, name = %event.name, "event out of sync with baseline");
            drifted += 1;
        }
    }

    let mut overbooked = 0usize;
    for hub in [equipment_hub, crew_hub] {
        for c in conflict::detect(hub, &range).await? {
            warn!(
                kind = c.kind.as_str(),
                resource = %c.resource_name,
                date = %c.date,
                events = c.competing.len(),
                "resource overbooked"
            );
            overbooked += 1;
        }
    }

    info!(
        events = events.len(),
        drifted, overbooked, "scan complete"
    );
    Ok(())
}
