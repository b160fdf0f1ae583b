use super::model::{
    BaselineItem, BookingRow, EventInfo, EventRole, GroupRow, RoleSlot, SnapshotItem,
};
use crate::error::{Error, Result};
use crate::model::{
    AddOutcome, DateRange, OperationStatus, Resource, ResourceKind, SyncOperation,
};
use chrono::NaiveDate;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn create_folder(pool: &Pool, name: &str, parent_id: Option<i64>) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO folders (name, parent_id) VALUES (?, ?) RETURNING id")
        .bind(name)
        .bind(parent_id)
        .fetch_one(pool)
        .await?;
    Ok(rec.get("id"))
}

pub async fn create_equipment(
    pool: &Pool,
    name: &str,
    code: Option<&str>,
    stock: i64,
    folder_id: Option<i64>,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO equipment (name, code, stock, folder_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(code)
    .bind(stock)
    .bind(folder_id)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

pub async fn create_crew_member(pool: &Pool, name: &str, folder_id: Option<i64>) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO crew_members (name, folder_id) VALUES (?, ?) RETURNING id")
        .bind(name)
        .bind(folder_id)
        .fetch_one(pool)
        .await?;
    Ok(rec.get("id"))
}

pub async fn create_role(pool: &Pool, name: &str) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO roles (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(rec.get("id"))
}

pub async fn create_project(pool: &Pool, name: &str) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO projects (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(rec.get("id"))
}

pub async fn create_variant(pool: &Pool, project_id: i64, name: &str) -> Result<i64> {
    let rec =
        sqlx::query("INSERT INTO project_variants (project_id, name) VALUES (?, ?) RETURNING id")
            .bind(project_id)
            .bind(name)
            .fetch_one(pool)
            .await?;
    Ok(rec.get("id"))
}

pub async fn create_event_type(
    pool: &Pool,
    name: &str,
    needs_equipment: bool,
    needs_crew: bool,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO event_types (name, needs_equipment, needs_crew) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(needs_equipment)
    .bind(needs_crew)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[allow(clippy::too_many_arguments)]
pub async fn create_event(
    pool: &Pool,
    project_id: i64,
    variant_id: i64,
    event_type_id: i64,
    name: &str,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO project_events (project_id, variant_id, event_type_id, name, starts_on, ends_on) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(project_id)
    .bind(variant_id)
    .bind(event_type_id)
    .bind(name)
    .bind(starts_on)
    .bind(ends_on)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

pub async fn get_event(pool: &Pool, event_id: i64) -> Result<Option<EventInfo>> {
    let row = sqlx::query(
        "SELECT e.id, e.project_id, e.variant_id, e.name, e.starts_on, e.ends_on, \
                t.needs_equipment, t.needs_crew \
         FROM project_events e JOIN event_types t ON e.event_type_id = t.id \
         WHERE e.id = ?",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| EventInfo {
        id: row.get("id"),
        project_id: row.get("project_id"),
        variant_id: row.get("variant_id"),
        name: row.get("name"),
        starts_on: row.get("starts_on"),
        ends_on: row.get("ends_on"),
        needs_equipment: row.get("needs_equipment"),
        needs_crew: row.get("needs_crew"),
    }))
}

/// Events whose span overlaps the given range.
pub async fn list_events_overlapping(pool: &Pool, range: &DateRange) -> Result<Vec<EventInfo>> {
    if range.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(
        "SELECT e.id, e.project_id, e.variant_id, e.name, e.starts_on, e.ends_on, \
                t.needs_equipment, t.needs_crew \
         FROM project_events e JOIN event_types t ON e.event_type_id = t.id \
         WHERE e.ends_on >= ? AND e.starts_on <= ? ORDER BY e.starts_on, e.id",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| EventInfo {
            id: row.get("id"),
            project_id: row.get("project_id"),
            variant_id: row.get("variant_id"),
            name: row.get("name"),
            starts_on: row.get("starts_on"),
            ends_on: row.get("ends_on"),
            needs_equipment: row.get("needs_equipment"),
            needs_crew: row.get("needs_crew"),
        })
        .collect())
}

pub async fn list_equipment(pool: &Pool) -> Result<Vec<Resource>> {
    let rows = sqlx::query("SELECT id, name, code, stock, folder_id FROM equipment ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| Resource::Equipment {
            id: row.get("id"),
            name: row.get("name"),
            code: row.get("code"),
            stock: row.get("stock"),
            folder_id: row.get("folder_id"),
        })
        .collect())
}

pub async fn list_crew_members(pool: &Pool) -> Result<Vec<Resource>> {
    let rows = sqlx::query("SELECT id, name, folder_id FROM crew_members ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| Resource::CrewMember {
            id: row.get("id"),
            name: row.get("name"),
            folder_id: row.get("folder_id"),
        })
        .collect())
}

pub async fn folder_names(pool: &Pool) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query("SELECT id, name FROM folders ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("name")))
        .collect())
}

// ---------------------------------------------------------------------------
// Baseline: equipment assignments and groups
// ---------------------------------------------------------------------------

fn baseline_from_row(row: &sqlx::sqlite::SqliteRow) -> BaselineItem {
    BaselineItem {
        id: row.get("id"),
        project_id: row.get("project_id"),
        variant_id: row.get("variant_id"),
        equipment_id: row.get("equipment_id"),
        group_id: row.get("group_id"),
        quantity: row.get("quantity"),
        notes: row.get("notes"),
    }
}

pub async fn get_baseline_item(pool: &Pool, id: i64) -> Result<Option<BaselineItem>> {
    let row = sqlx::query(
        "SELECT id, project_id, variant_id, equipment_id, group_id, quantity, notes \
         FROM project_equipment WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(baseline_from_row))
}

pub async fn list_baseline(pool: &Pool, project_id: i64, variant_id: i64) -> Result<Vec<BaselineItem>> {
    let rows = sqlx::query(
        "SELECT id, project_id, variant_id, equipment_id, group_id, quantity, notes \
         FROM project_equipment WHERE project_id = ? AND variant_id = ? ORDER BY id",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(baseline_from_row).collect())
}

/// Merge-on-duplicate baseline add. Probes for an existing
/// (project, variant, equipment) row inside the transaction: a hit increases
/// quantity (and lets a groupless row adopt the supplied group), a miss
/// inserts. Never produces a second row for the same equipment.
#[instrument(skip_all)]
pub async fn upsert_baseline_item(
    pool: &Pool,
    project_id: i64,
    variant_id: i64,
    equipment_id: i64,
    group_id: Option<i64>,
    quantity: i64,
    notes: Option<&str>,
) -> Result<(BaselineItem, AddOutcome)> {
    let mut tx = pool.begin().await?;
    let existing = sqlx::query(
        "SELECT id, project_id, variant_id, equipment_id, group_id, quantity, notes \
         FROM project_equipment WHERE project_id = ? AND variant_id = ? AND equipment_id = ?",
    )
    .bind(project_id)
    .bind(variant_id)
    .bind(equipment_id)
    .fetch_optional(&mut *tx)
    .await?;

    let out = if let Some(row) = existing {
        let current = baseline_from_row(&row);
        let new_quantity = current.quantity + quantity;
        let new_group = current.group_id.or(group_id);
        sqlx::query("UPDATE project_equipment SET quantity = ?, group_id = ? WHERE id = ?")
            .bind(new_quantity)
            .bind(new_group)
            .bind(current.id)
            .execute(&mut *tx)
            .await?;
        (
            BaselineItem {
                quantity: new_quantity,
                group_id: new_group,
                ..current
            },
            AddOutcome::Updated,
        )
    } else {
        let rec = sqlx::query(
            "INSERT INTO project_equipment (project_id, variant_id, equipment_id, group_id, quantity, notes) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(variant_id)
        .bind(equipment_id)
        .bind(group_id)
        .bind(quantity)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;
        (
            BaselineItem {
                id: rec.get("id"),
                project_id,
                variant_id,
                equipment_id,
                group_id,
                quantity,
                notes: notes.map(str::to_string),
            },
            AddOutcome::Inserted,
        )
    };
    tx.commit().await?;
    Ok(out)
}

#[instrument(skip_all)]
pub async fn update_baseline_quantity(pool: &Pool, id: i64, quantity: i64) -> Result<bool> {
    let res = sqlx::query("UPDATE project_equipment SET quantity = ? WHERE id = ?")
        .bind(quantity)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn delete_baseline_item(pool: &Pool, id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM project_equipment WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_group(pool: &Pool, id: i64) -> Result<Option<GroupRow>> {
    let row = sqlx::query(
        "SELECT id, project_id, variant_id, name, sort_order FROM project_equipment_groups WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| GroupRow {
        id: row.get("id"),
        project_id: row.get("project_id"),
        variant_id: row.get("variant_id"),
        name: row.get("name"),
        sort_order: row.get("sort_order"),
    }))
}

pub async fn list_groups(pool: &Pool, project_id: i64, variant_id: i64) -> Result<Vec<GroupRow>> {
    let rows = sqlx::query(
        "SELECT id, project_id, variant_id, name, sort_order FROM project_equipment_groups \
         WHERE project_id = ? AND variant_id = ? ORDER BY sort_order, id",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| GroupRow {
            id: row.get("id"),
            project_id: row.get("project_id"),
            variant_id: row.get("variant_id"),
            name: row.get("name"),
            sort_order: row.get("sort_order"),
        })
        .collect())
}

/// Insert a group with `sort_order = max(existing) + 1`, computed in the
/// same transaction.
#[instrument(skip_all)]
pub async fn insert_group(
    pool: &Pool,
    project_id: i64,
    variant_id: i64,
    name: &str,
) -> Result<GroupRow> {
    let mut tx = pool.begin().await?;
    let max_order: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(sort_order) FROM project_equipment_groups WHERE project_id = ? AND variant_id = ?",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_one(&mut *tx)
    .await?;
    let sort_order = max_order.unwrap_or(0) + 1;
    let rec = sqlx::query(
        "INSERT INTO project_equipment_groups (project_id, variant_id, name, sort_order) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(project_id)
    .bind(variant_id)
    .bind(name)
    .bind(sort_order)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(GroupRow {
        id: rec.get("id"),
        project_id,
        variant_id,
        name: name.to_string(),
        sort_order,
    })
}

#[instrument(skip_all)]
pub async fn rename_group(pool: &Pool, id: i64, name: &str) -> Result<bool> {
    let res = sqlx::query("UPDATE project_equipment_groups SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn reorder_group(pool: &Pool, id: i64, sort_order: i64) -> Result<bool> {
    let res = sqlx::query("UPDATE project_equipment_groups SET sort_order = ? WHERE id = ?")
        .bind(sort_order)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Delete a group with an explicit member disposition, in one transaction.
/// With `move_to`, baseline members and snapshot rows pointing at the group
/// are reassigned; without, members are deleted and snapshot rows lose the
/// reference. Either way no row is left pointing at the deleted group.
#[instrument(skip_all)]
pub async fn delete_group(pool: &Pool, group_id: i64, move_to: Option<i64>) -> Result<()> {
    let mut tx = pool.begin().await?;
    match move_to {
        Some(target) => {
            sqlx::query("UPDATE project_equipment SET group_id = ? WHERE group_id = ?")
                .bind(target)
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE project_event_equipment SET group_id = ? WHERE group_id = ?")
                .bind(target)
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query("DELETE FROM project_equipment WHERE group_id = ?")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE project_event_equipment SET group_id = NULL WHERE group_id = ?")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    sqlx::query("DELETE FROM project_equipment_groups WHERE id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Baseline: crew role slots
// ---------------------------------------------------------------------------

fn role_slot_from_row(row: &sqlx::sqlite::SqliteRow) -> RoleSlot {
    RoleSlot {
        id: row.get("id"),
        project_id: row.get("project_id"),
        variant_id: row.get("variant_id"),
        role_id: row.get("role_id"),
        daily_rate: row.get("daily_rate"),
        hourly_rate: row.get("hourly_rate"),
        preferred_id: row.get("preferred_id"),
    }
}

pub async fn get_role_slot(pool: &Pool, id: i64) -> Result<Option<RoleSlot>> {
    let row = sqlx::query(
        "SELECT id, project_id, variant_id, role_id, daily_rate, hourly_rate, preferred_id \
         FROM project_roles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(role_slot_from_row))
}

pub async fn list_role_slots(pool: &Pool, project_id: i64, variant_id: i64) -> Result<Vec<RoleSlot>> {
    let rows = sqlx::query(
        "SELECT id, project_id, variant_id, role_id, daily_rate, hourly_rate, preferred_id \
         FROM project_roles WHERE project_id = ? AND variant_id = ? ORDER BY id",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(role_slot_from_row).collect())
}

/// True when the crew member is already preferred on some role slot of this
/// variant, excluding `except_role_id` when given.
pub async fn preferred_elsewhere(
    pool: &Pool,
    project_id: i64,
    variant_id: i64,
    crew_member_id: i64,
    except_role_id: Option<i64>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM project_roles \
         WHERE project_id = ? AND variant_id = ? AND preferred_id = ? \
           AND (? IS NULL OR role_id <> ?)",
    )
    .bind(project_id)
    .bind(variant_id)
    .bind(crew_member_id)
    .bind(except_role_id)
    .bind(except_role_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Merge-on-duplicate role slot add: a second add of the same role updates
/// rates and the preferred member instead of inserting a second slot.
#[instrument(skip_all)]
pub async fn upsert_role_slot(
    pool: &Pool,
    project_id: i64,
    variant_id: i64,
    role_id: i64,
    daily_rate: Option<f64>,
    hourly_rate: Option<f64>,
    preferred_id: Option<i64>,
) -> Result<(RoleSlot, AddOutcome)> {
    let mut tx = pool.begin().await?;
    let existing = sqlx::query(
        "SELECT id, project_id, variant_id, role_id, daily_rate, hourly_rate, preferred_id \
         FROM project_roles WHERE project_id = ? AND variant_id = ? AND role_id = ?",
    )
    .bind(project_id)
    .bind(variant_id)
    .bind(role_id)
    .fetch_optional(&mut *tx)
    .await?;

    let out = if let Some(row) = existing {
        let current = role_slot_from_row(&row);
        let daily = daily_rate.or(current.daily_rate);
        let hourly = hourly_rate.or(current.hourly_rate);
        let preferred = preferred_id.or(current.preferred_id);
        sqlx::query(
            "UPDATE project_roles SET daily_rate = ?, hourly_rate = ?, preferred_id = ? WHERE id = ?",
        )
        .bind(daily)
        .bind(hourly)
        .bind(preferred)
        .bind(current.id)
        .execute(&mut *tx)
        .await?;
        (
            RoleSlot {
                daily_rate: daily,
                hourly_rate: hourly,
                preferred_id: preferred,
                ..current
            },
            AddOutcome::Updated,
        )
    } else {
        let rec = sqlx::query(
            "INSERT INTO project_roles (project_id, variant_id, role_id, daily_rate, hourly_rate, preferred_id) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(variant_id)
        .bind(role_id)
        .bind(daily_rate)
        .bind(hourly_rate)
        .bind(preferred_id)
        .fetch_one(&mut *tx)
        .await?;
        (
            RoleSlot {
                id: rec.get("id"),
                project_id,
                variant_id,
                role_id,
                daily_rate,
                hourly_rate,
                preferred_id,
            },
            AddOutcome::Inserted,
        )
    };
    tx.commit().await?;
    Ok(out)
}

#[instrument(skip_all)]
pub async fn delete_role_slot(pool: &Pool, id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM project_roles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Event snapshots
// ---------------------------------------------------------------------------

pub async fn list_snapshot(pool: &Pool, event_id: i64) -> Result<Vec<SnapshotItem>> {
    let rows = sqlx::query(
        "SELECT id, equipment_id, quantity, group_id, is_synced FROM project_event_equipment \
         WHERE event_id = ? ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| SnapshotItem {
            id: row.get("id"),
            equipment_id: row.get("equipment_id"),
            quantity: row.get("quantity"),
            group_id: row.get("group_id"),
            is_synced: row.get("is_synced"),
        })
        .collect())
}

pub async fn list_event_roles(pool: &Pool, event_id: i64) -> Result<Vec<EventRole>> {
    let rows = sqlx::query(
        "SELECT id, role_id, crew_member_id FROM project_event_roles WHERE event_id = ? ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| EventRole {
            id: row.get("id"),
            role_id: row.get("role_id"),
            crew_member_id: row.get("crew_member_id"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Reconciliation entry points
// ---------------------------------------------------------------------------

/// Reconcile an event's equipment snapshot to the variant baseline, in one
/// transaction. Rows already matching the baseline are left untouched, so a
/// repeated call applies zero writes. Returns the number of applied writes.
#[instrument(skip_all)]
pub async fn sync_equipment(
    pool: &Pool,
    event_id: i64,
    project_id: i64,
    variant_id: i64,
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let baseline = sqlx::query(
        "SELECT id, project_id, variant_id, equipment_id, group_id, quantity, notes \
         FROM project_equipment WHERE project_id = ? AND variant_id = ?",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_all(&mut *tx)
    .await?;
    let snapshot = sqlx::query(
        "SELECT id, equipment_id, quantity, group_id, is_synced FROM project_event_equipment \
         WHERE event_id = ?",
    )
    .bind(event_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut writes = 0u64;
    let mut snapshot_by_equipment = std::collections::HashMap::new();
    for row in &snapshot {
        let item = SnapshotItem {
            id: row.get("id"),
            equipment_id: row.get("equipment_id"),
            quantity: row.get("quantity"),
            group_id: row.get("group_id"),
            is_synced: row.get("is_synced"),
        };
        snapshot_by_equipment.insert(item.equipment_id, item);
    }

    for row in &baseline {
        let item = baseline_from_row(row);
        match snapshot_by_equipment.remove(&item.equipment_id) {
            Some(snap) => {
                if snap.quantity != item.quantity || snap.group_id != item.group_id || !snap.is_synced
                {
                    writes += sync_update_snapshot(&mut tx, snap.id, item.quantity, item.group_id)
                        .await?;
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO project_event_equipment (event_id, equipment_id, quantity, group_id, is_synced) \
                     VALUES (?, ?, ?, ?, 1)",
                )
                .bind(event_id)
                .bind(item.equipment_id)
                .bind(item.quantity)
                .bind(item.group_id)
                .execute(&mut *tx)
                .await?;
                writes += 1;
            }
        }
    }

    // Whatever is left in the snapshot map has no baseline counterpart.
    for stale in snapshot_by_equipment.values() {
        sqlx::query("DELETE FROM project_event_equipment WHERE id = ?")
            .bind(stale.id)
            .execute(&mut *tx)
            .await?;
        writes += 1;
    }

    tx.commit().await?;
    Ok(writes)
}

async fn sync_update_snapshot(
    tx: &mut Transaction<'_, Sqlite>,
    snapshot_id: i64,
    quantity: i64,
    group_id: Option<i64>,
) -> Result<u64> {
    sqlx::query(
        "UPDATE project_event_equipment SET quantity = ?, group_id = ?, is_synced = 1 WHERE id = ?",
    )
    .bind(quantity)
    .bind(group_id)
    .bind(snapshot_id)
    .execute(&mut **tx)
    .await?;
    Ok(1)
}

/// Reconcile an event's crew roles to the variant's role slots, in one
/// transaction. Missing roles are inserted with the slot's preferred member,
/// drifted assignments are repointed, stale roles are deleted.
#[instrument(skip_all)]
pub async fn sync_crew(pool: &Pool, event_id: i64, project_id: i64, variant_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let slots = sqlx::query(
        "SELECT id, project_id, variant_id, role_id, daily_rate, hourly_rate, preferred_id \
         FROM project_roles WHERE project_id = ? AND variant_id = ?",
    )
    .bind(project_id)
    .bind(variant_id)
    .fetch_all(&mut *tx)
    .await?;
    let assigned = sqlx::query(
        "SELECT id, role_id, crew_member_id FROM project_event_roles WHERE event_id = ?",
    )
    .bind(event_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut writes = 0u64;
    let mut assigned_by_role = std::collections::HashMap::new();
    for row in &assigned {
        let er = EventRole {
            id: row.get("id"),
            role_id: row.get("role_id"),
            crew_member_id: row.get("crew_member_id"),
        };
        assigned_by_role.insert(er.role_id, er);
    }

    for row in &slots {
        let slot = role_slot_from_row(row);
        match assigned_by_role.remove(&slot.role_id) {
            Some(er) => {
                if er.crew_member_id != slot.preferred_id {
                    sqlx::query("UPDATE project_event_roles SET crew_member_id = ? WHERE id = ?")
                        .bind(slot.preferred_id)
                        .bind(er.id)
                        .execute(&mut *tx)
                        .await?;
                    writes += 1;
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO project_event_roles (event_id, role_id, crew_member_id) VALUES (?, ?, ?)",
                )
                .bind(event_id)
                .bind(slot.role_id)
                .bind(slot.preferred_id)
                .execute(&mut *tx)
                .await?;
                writes += 1;
            }
        }
    }

    for stale in assigned_by_role.values() {
        sqlx::query("DELETE FROM project_event_roles WHERE id = ?")
            .bind(stale.id)
            .execute(&mut *tx)
            .await?;
        writes += 1;
    }

    tx.commit().await?;
    Ok(writes)
}

// ---------------------------------------------------------------------------
// Sync operation audit log
// ---------------------------------------------------------------------------

/// Record a pending sync attempt. The attempt ordinal counts prior attempts
/// for the same (event, kind), computed in the insert's transaction.
#[instrument(skip_all)]
pub async fn record_sync_pending(
    pool: &Pool,
    project_id: i64,
    event_id: i64,
    kind: ResourceKind,
) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let prior: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sync_operations WHERE event_id = ? AND kind = ?")
            .bind(event_id)
            .bind(kind.as_str())
            .fetch_one(&mut *tx)
            .await?;
    let public_id = Uuid::new_v4();
    let rec = sqlx::query(
        "INSERT INTO sync_operations (public_id, project_id, event_id, kind, status, attempts) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(public_id.to_string())
    .bind(project_id)
    .bind(event_id)
    .bind(kind.as_str())
    .bind(OperationStatus::Pending.as_str())
    .bind(prior + 1)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn finish_sync_operation(
    pool: &Pool,
    id: i64,
    status: OperationStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE sync_operations SET status = ?, error_message = ?, finished_at = CURRENT_TIMESTAMP \
         WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_sync_operations(pool: &Pool, event_id: i64) -> Result<Vec<SyncOperation>> {
    let rows = sqlx::query(
        "SELECT id, public_id, project_id, event_id, kind, status, error_message, attempts, \
                created_at, finished_at \
         FROM sync_operations WHERE event_id = ? ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|row| {
            let public_id: String = row.get("public_id");
            let kind: String = row.get("kind");
            let status: String = row.get("status");
            Ok(SyncOperation {
                id: row.get("id"),
                public_id: Uuid::parse_str(&public_id).map_err(|e| {
                    Error::Validation(format!("malformed sync operation public_id: {e}"))
                })?,
                project_id: row.get("project_id"),
                event_id: row.get("event_id"),
                kind: ResourceKind::parse_kind(&kind)
                    .ok_or_else(|| Error::Validation(format!("unknown sync kind {kind}")))?,
                status: OperationStatus::parse_status(&status)
                    .ok_or_else(|| Error::Validation(format!("unknown sync status {status}")))?,
                error_message: row.get("error_message"),
                attempts: row.get("attempts"),
                created_at: row.get("created_at"),
                finished_at: row.get("finished_at"),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Availability bookings
// ---------------------------------------------------------------------------

/// Equipment booked on events overlapping the range. One row per
/// (event, equipment) with the event's date span.
pub async fn equipment_bookings(pool: &Pool, range: &DateRange) -> Result<Vec<BookingRow>> {
    if range.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(
        "SELECT s.equipment_id AS resource_id, s.event_id, s.quantity, e.starts_on, e.ends_on \
         FROM project_event_equipment s JOIN project_events e ON s.event_id = e.id \
         WHERE e.ends_on >= ? AND e.starts_on <= ? ORDER BY s.id",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(booking_from_row).collect())
}

/// Crew members assigned to roles on events overlapping the range. Quantity
/// is always 1: one person fills one role slot.
pub async fn crew_bookings(pool: &Pool, range: &DateRange) -> Result<Vec<BookingRow>> {
    if range.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(
        "SELECT r.crew_member_id AS resource_id, r.event_id, 1 AS quantity, e.starts_on, e.ends_on \
         FROM project_event_roles r JOIN project_events e ON r.event_id = e.id \
         WHERE r.crew_member_id IS NOT NULL AND e.ends_on >= ? AND e.starts_on <= ? ORDER BY r.id",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(booking_from_row).collect())
}

fn booking_from_row(row: sqlx::sqlite::SqliteRow) -> BookingRow {
    BookingRow {
        resource_id: row.get("resource_id"),
        event_id: row.get("event_id"),
        quantity: row.get("quantity"),
        starts_on: row.get("starts_on"),
        ends_on: row.get("ends_on"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_event(pool: &Pool) -> (i64, i64, i64) {
        let project = create_project(pool, "Tour").await.unwrap();
        let variant = create_variant(pool, project, "default").await.unwrap();
        let kind = create_event_type(pool, "show", true, true).await.unwrap();
        let event = create_event(
            pool,
            project,
            variant,
            kind,
            "Opening night",
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 2).unwrap(),
        )
        .await
        .unwrap();
        (project, variant, event)
    }

    #[tokio::test]
    async fn sync_equipment_inserts_updates_and_deletes() {
        let pool = setup_pool().await;
        let (project, variant, event) = seed_event(&pool).await;
        let desk = create_equipment(&pool, "Mixing desk", Some("MX-1"), 2, None)
            .await
            .unwrap();
        let amp = create_equipment(&pool, "Amp rack", None, 4, None).await.unwrap();

        upsert_baseline_item(&pool, project, variant, desk, None, 1, None)
            .await
            .unwrap();
        upsert_baseline_item(&pool, project, variant, amp, None, 2, None)
            .await
            .unwrap();

        let writes = sync_equipment(&pool, event, project, variant).await.unwrap();
        assert_eq!(writes, 2);
        let snapshot = list_snapshot(&pool, event).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|s| s.is_synced));

        // No baseline change: a second run is a no-op.
        let writes = sync_equipment(&pool, event, project, variant).await.unwrap();
        assert_eq!(writes, 0);

        // Drop one baseline row; the stale snapshot row goes away.
        let baseline = list_baseline(&pool, project, variant).await.unwrap();
        let amp_row = baseline.iter().find(|b| b.equipment_id == amp).unwrap();
        delete_baseline_item(&pool, amp_row.id).await.unwrap();
        let writes = sync_equipment(&pool, event, project, variant).await.unwrap();
        assert_eq!(writes, 1);
        let snapshot = list_snapshot(&pool, event).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].equipment_id, desk);
    }

    #[tokio::test]
    async fn sync_crew_follows_preferred_member() {
        let pool = setup_pool().await;
        let (project, variant, event) = seed_event(&pool).await;
        let foh = create_role(&pool, "FOH engineer").await.unwrap();
        let alice = create_crew_member(&pool, "Alice", None).await.unwrap();
        let bob = create_crew_member(&pool, "Bob", None).await.unwrap();

        upsert_role_slot(&pool, project, variant, foh, Some(400.0), None, Some(alice))
            .await
            .unwrap();
        let writes = sync_crew(&pool, event, project, variant).await.unwrap();
        assert_eq!(writes, 1);
        let roles = list_event_roles(&pool, event).await.unwrap();
        assert_eq!(roles[0].crew_member_id, Some(alice));

        // Swap the preferred member; resync repoints the assignment.
        upsert_role_slot(&pool, project, variant, foh, None, None, Some(bob))
            .await
            .unwrap();
        let writes = sync_crew(&pool, event, project, variant).await.unwrap();
        assert_eq!(writes, 1);
        let roles = list_event_roles(&pool, event).await.unwrap();
        assert_eq!(roles[0].crew_member_id, Some(bob));
    }

    #[tokio::test]
    async fn sync_attempts_are_ordinal_per_event_and_kind() {
        let pool = setup_pool().await;
        let (project, _variant, event) = seed_event(&pool).await;

        let op1 = record_sync_pending(&pool, project, event, ResourceKind::Equipment)
            .await
            .unwrap();
        finish_sync_operation(&pool, op1, OperationStatus::Failed, Some("store unreachable"))
            .await
            .unwrap();
        let op2 = record_sync_pending(&pool, project, event, ResourceKind::Equipment)
            .await
            .unwrap();
        finish_sync_operation(&pool, op2, OperationStatus::Completed, None)
            .await
            .unwrap();
        record_sync_pending(&pool, project, event, ResourceKind::Crew)
            .await
            .unwrap();

        let ops = list_sync_operations(&pool, event).await.unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].attempts, 1);
        assert_eq!(ops[0].status, OperationStatus::Failed);
        assert_eq!(ops[0].error_message.as_deref(), Some("store unreachable"));
        assert_eq!(ops[1].attempts, 2);
        assert_eq!(ops[1].status, OperationStatus::Completed);
        // Crew attempts count separately.
        assert_eq!(ops[2].attempts, 1);
    }
}
