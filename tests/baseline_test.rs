use crewdeck::cache::ReadCache;
use crewdeck::error::Error;
use crewdeck::manager::VariantResourceManager;
use crewdeck::model::AddOutcome;
use crewdeck::store::{self, ChangeFeed};
use std::sync::Arc;
use std::time::Duration;

async fn setup_pool() -> store::Pool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn manager(pool: &store::Pool) -> VariantResourceManager {
    let cache = Arc::new(ReadCache::new(Duration::from_secs(30)));
    VariantResourceManager::new(pool.clone(), cache, ChangeFeed::default())
}

async fn seed_variant(pool: &store::Pool) -> (i64, i64) {
    let project = store::create_project(pool, "Summer tour").await.unwrap();
    let variant = store::create_variant(pool, project, "default").await.unwrap();
    (project, variant)
}

#[tokio::test]
async fn duplicate_add_merges_into_one_row() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let desk = store::create_equipment(&pool, "Mixing desk", Some("MX-1"), 10, None)
        .await
        .unwrap();

    let (first, outcome) = mgr
        .add_equipment(project, variant, desk, None, 2, None)
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Inserted);
    assert_eq!(first.quantity, 2);

    let (second, outcome) = mgr
        .add_equipment(project, variant, desk, None, 3, None)
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Updated);
    assert_eq!(second.id, first.id);
    assert_eq!(second.quantity, 5);

    let baseline = mgr.list_baseline(project, variant).await.unwrap();
    assert_eq!(baseline.len(), 1);
    assert_eq!(baseline[0].quantity, 5);
}

#[tokio::test]
async fn merge_lets_groupless_row_adopt_group() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let amp = store::create_equipment(&pool, "Amp rack", None, 6, None).await.unwrap();
    let group = mgr.create_group(project, variant, "Backline").await.unwrap();

    mgr.add_equipment(project, variant, amp, None, 1, None)
        .await
        .unwrap();
    let (merged, _) = mgr
        .add_equipment(project, variant, amp, Some(group.id), 1, None)
        .await
        .unwrap();
    assert_eq!(merged.group_id, Some(group.id));
    assert_eq!(merged.quantity, 2);
}

#[tokio::test]
async fn add_rejects_non_positive_quantity() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let amp = store::create_equipment(&pool, "Amp rack", None, 6, None).await.unwrap();

    let err = mgr
        .add_equipment(project, variant, amp, None, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(mgr.list_baseline(project, variant).await.unwrap().is_empty());
}

#[tokio::test]
async fn groups_get_increasing_sort_order() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;

    let a = mgr.create_group(project, variant, "Audio").await.unwrap();
    let b = mgr.create_group(project, variant, "  Lighting  ").await.unwrap();
    assert_eq!(a.sort_order, 1);
    assert_eq!(b.sort_order, 2);
    assert_eq!(b.name, "Lighting");

    let err = mgr.create_group(project, variant, "   ").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn delete_group_moves_members_to_target() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let g = mgr.create_group(project, variant, "Old").await.unwrap();
    let h = mgr.create_group(project, variant, "New").await.unwrap();

    let mut ids = Vec::new();
    for name in ["Desk", "Amp", "Mic"] {
        let eq = store::create_equipment(&pool, name, None, 4, None).await.unwrap();
        mgr.add_equipment(project, variant, eq, Some(g.id), 1, None)
            .await
            .unwrap();
        ids.push(eq);
    }

    mgr.delete_group(g.id, Some(h.id)).await.unwrap();

    assert!(store::get_group(&pool, g.id).await.unwrap().is_none());
    let baseline = mgr.list_baseline(project, variant).await.unwrap();
    assert_eq!(baseline.len(), 3);
    for eq in ids {
        let item = baseline.iter().find(|b| b.equipment_id == eq).unwrap();
        assert_eq!(item.group_id, Some(h.id));
    }
}

#[tokio::test]
async fn delete_group_without_target_deletes_members() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let g = mgr.create_group(project, variant, "Doomed").await.unwrap();

    for name in ["Desk", "Amp", "Mic"] {
        let eq = store::create_equipment(&pool, name, None, 4, None).await.unwrap();
        mgr.add_equipment(project, variant, eq, Some(g.id), 1, None)
            .await
            .unwrap();
    }
    // One assignment outside the group survives.
    let keep = store::create_equipment(&pool, "Cable trunk", None, 9, None)
        .await
        .unwrap();
    mgr.add_equipment(project, variant, keep, None, 2, None)
        .await
        .unwrap();

    mgr.delete_group(g.id, None).await.unwrap();

    assert!(store::get_group(&pool, g.id).await.unwrap().is_none());
    let baseline = mgr.list_baseline(project, variant).await.unwrap();
    assert_eq!(baseline.len(), 1);
    assert_eq!(baseline[0].equipment_id, keep);
}

#[tokio::test]
async fn delete_group_validates_target() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let g = mgr.create_group(project, variant, "Only").await.unwrap();

    let err = mgr.delete_group(9999, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = mgr.delete_group(g.id, Some(g.id)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Target in another variant is rejected.
    let other_variant = store::create_variant(&pool, project, "acoustic set").await.unwrap();
    let foreign = mgr
        .create_group(project, other_variant, "Elsewhere")
        .await
        .unwrap();
    let err = mgr.delete_group(g.id, Some(foreign.id)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn zero_quantity_update_removes_assignment() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let amp = store::create_equipment(&pool, "Amp rack", None, 6, None).await.unwrap();

    let (item, _) = mgr
        .add_equipment(project, variant, amp, None, 3, None)
        .await
        .unwrap();

    let updated = mgr.update_quantity(item.id, 2).await.unwrap();
    assert_eq!(updated.unwrap().quantity, 2);

    let removed = mgr.update_quantity(item.id, 0).await.unwrap();
    assert!(removed.is_none());
    assert!(mgr.list_baseline(project, variant).await.unwrap().is_empty());

    let err = mgr.update_quantity(item.id, 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn preferred_crew_member_is_exclusive_per_variant() {
    let pool = setup_pool().await;
    let mgr = manager(&pool);
    let (project, variant) = seed_variant(&pool).await;
    let foh = store::create_role(&pool, "FOH engineer").await.unwrap();
    let mon = store::create_role(&pool, "Monitor engineer").await.unwrap();
    let alice = store::create_crew_member(&pool, "Alice", None).await.unwrap();

    mgr.add_role(project, variant, foh, Some(400.0), None, Some(alice))
        .await
        .unwrap();

    let err = mgr
        .add_role(project, variant, mon, None, None, Some(alice))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Re-adding the same slot merges instead of duplicating.
    let (slot, outcome) = mgr
        .add_role(project, variant, foh, None, Some(55.0), Some(alice))
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Updated);
    assert_eq!(slot.daily_rate, Some(400.0));
    assert_eq!(slot.hourly_rate, Some(55.0));
    assert_eq!(mgr.list_role_slots(project, variant).await.unwrap().len(), 1);
}
