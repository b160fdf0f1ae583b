//! Event Sync Engine: baseline→snapshot difference and reconciliation.
//!
//! `compute_difference` is a pure read and backs the "preview differences"
//! action; `sync` records an audit row per resource kind, runs the store's
//! transactional reconciliation, and reports the outcome. Concurrent syncs
//! of one event are serialized by a per-event advisory lock; syncs of
//! different events proceed independently.

use crate::cache::{CacheKey, ReadCache, Scope};
use crate::error::{Error, Result};
use crate::model::{
    DiffChange, DiffEntry, EventDifference, ResourceDiff, ResourceKind, SyncOperation, SyncStatus,
};
use crate::store::{self, Change, ChangeFeed, EventInfo, Table};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Outcome of reconciling one resource kind of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindOutcome {
    pub operation_id: i64,
    pub writes: u64,
}

/// Outcome of a full `sync(event)` call. A `None` side means the event's
/// type does not carry that resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub event_id: i64,
    pub equipment: Option<KindOutcome>,
    pub crew: Option<KindOutcome>,
}

pub struct EventSyncEngine {
    pool: store::Pool,
    cache: Arc<ReadCache>,
    feed: ChangeFeed,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl EventSyncEngine {
    pub fn new(pool: store::Pool, cache: Arc<ReadCache>, feed: ChangeFeed) -> Self {
        Self {
            pool,
            cache,
            feed,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn event_lock(&self, event_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(event_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Difference between the variant baseline and the event snapshot,
    /// per resource kind. Mutates nothing; cached under the project scope
    /// until a mutation invalidates it.
    #[instrument(skip_all)]
    pub async fn compute_difference(&self, event_id: i64) -> Result<EventDifference> {
        let event = self.require_event(event_id).await?;
        let key = CacheKey::new(Scope::Project(event.project_id), format!("diff:{event_id}"));
        if let Some(value) = self.cache.get(&key) {
            if let Ok(diff) = serde_json::from_value::<EventDifference>(value) {
                return Ok(diff);
            }
        }

        let equipment = if event.needs_equipment {
            Some(self.equipment_diff(&event).await?)
        } else {
            None
        };
        let crew = if event.needs_crew {
            Some(self.crew_diff(&event).await?)
        } else {
            None
        };
        let diff = EventDifference {
            event_id,
            equipment,
            crew,
        };
        if let Ok(value) = serde_json::to_value(&diff) {
            self.cache.put(key, value);
        }
        Ok(diff)
    }

    /// Current state of the event relative to its baseline.
    pub async fn sync_status(&self, event_id: i64) -> Result<SyncStatus> {
        Ok(self.compute_difference(event_id).await?.status())
    }

    /// Reconcile the event snapshot to the baseline. Each resource kind is
    /// audited and reconciled in its own store transaction; a second call
    /// with no baseline change in between applies zero writes.
    #[instrument(skip_all)]
    pub async fn sync(&self, event_id: i64) -> Result<SyncReport> {
        let event = self.require_event(event_id).await?;
        let lock = self.event_lock(event_id);
        let _guard = lock.lock().await;

        let mut report = SyncReport {
            event_id,
            equipment: None,
            crew: None,
        };
        if event.needs_equipment {
            report.equipment = Some(self.sync_kind(&event, ResourceKind::Equipment).await?);
        }
        if event.needs_crew {
            report.crew = Some(self.sync_kind(&event, ResourceKind::Crew).await?);
        }

        self.invalidate_after_sync(&event);
        info!(
            event_id,
            equipment_writes = report.equipment.map(|o| o.writes),
            crew_writes = report.crew.map(|o| o.writes),
            "event synced"
        );
        Ok(report)
    }

    /// Audit trail for one event, oldest first.
    pub async fn operations(&self, event_id: i64) -> Result<Vec<SyncOperation>> {
        store::list_sync_operations(&self.pool, event_id).await
    }

    async fn sync_kind(&self, event: &EventInfo, kind: ResourceKind) -> Result<KindOutcome> {
        let operation_id =
            store::record_sync_pending(&self.pool, event.project_id, event.id, kind).await?;
        let result = match kind {
            ResourceKind::Equipment => {
                store::sync_equipment(&self.pool, event.id, event.project_id, event.variant_id)
                    .await
            }
            ResourceKind::Crew => {
                store::sync_crew(&self.pool, event.id, event.project_id, event.variant_id).await
            }
        };
        match result {
            Ok(writes) => {
                store::finish_sync_operation(
                    &self.pool,
                    operation_id,
                    crate::model::OperationStatus::Completed,
                    None,
                )
                .await?;
                Ok(KindOutcome {
                    operation_id,
                    writes,
                })
            }
            Err(err) => {
                let message = err.to_string();
                warn!(event_id = event.id, kind = kind.as_str(), %message, "sync failed");
                store::finish_sync_operation(
                    &self.pool,
                    operation_id,
                    crate::model::OperationStatus::Failed,
                    Some(&message),
                )
                .await?;
                // Cached reads may describe pre-failure state.
                self.invalidate_after_sync(event);
                Err(Error::Sync {
                    event_id: event.id,
                    message,
                })
            }
        }
    }

    async fn equipment_diff(&self, event: &EventInfo) -> Result<ResourceDiff> {
        let baseline =
            store::list_baseline(&self.pool, event.project_id, event.variant_id).await?;
        let snapshot = store::list_snapshot(&self.pool, event.id).await?;

        let mut snapshot_by_id: HashMap<i64, _> = snapshot
            .into_iter()
            .map(|s| (s.equipment_id, s))
            .collect();
        let mut diff = ResourceDiff::default();
        for item in baseline {
            match snapshot_by_id.remove(&item.equipment_id) {
                Some(snap) => {
                    if snap.quantity != item.quantity || snap.group_id != item.group_id {
                        diff.changed.push(DiffChange {
                            resource_id: item.equipment_id,
                            old_quantity: snap.quantity,
                            new_quantity: item.quantity,
                            old_group: snap.group_id,
                            new_group: item.group_id,
                            old_member: None,
                            new_member: None,
                        });
                    }
                }
                None => diff.added.push(DiffEntry {
                    resource_id: item.equipment_id,
                    quantity: item.quantity,
                    group_id: item.group_id,
                }),
            }
        }
        let mut stale: Vec<_> = snapshot_by_id.into_values().collect();
        stale.sort_by_key(|s| s.equipment_id);
        for snap in stale {
            diff.removed.push(DiffEntry {
                resource_id: snap.equipment_id,
                quantity: snap.quantity,
                group_id: snap.group_id,
            });
        }
        Ok(diff)
    }

    async fn crew_diff(&self, event: &EventInfo) -> Result<ResourceDiff> {
        let slots = store::list_role_slots(&self.pool, event.project_id, event.variant_id).await?;
        let assigned = store::list_event_roles(&self.pool, event.id).await?;

        let mut assigned_by_role: HashMap<i64, _> =
            assigned.into_iter().map(|r| (r.role_id, r)).collect();
        let mut diff = ResourceDiff::default();
        for slot in slots {
            match assigned_by_role.remove(&slot.role_id) {
                Some(er) => {
                    if er.crew_member_id != slot.preferred_id {
                        diff.changed.push(DiffChange {
                            resource_id: slot.role_id,
                            old_quantity: 1,
                            new_quantity: 1,
                            old_group: None,
                            new_group: None,
                            old_member: er.crew_member_id,
                            new_member: slot.preferred_id,
                        });
                    }
                }
                None => diff.added.push(DiffEntry {
                    resource_id: slot.role_id,
                    quantity: 1,
                    group_id: None,
                }),
            }
        }
        let mut stale: Vec<_> = assigned_by_role.into_values().collect();
        stale.sort_by_key(|r| r.role_id);
        for er in stale {
            diff.removed.push(DiffEntry {
                resource_id: er.role_id,
                quantity: 1,
                group_id: None,
            });
        }
        Ok(diff)
    }

    async fn require_event(&self, event_id: i64) -> Result<EventInfo> {
        store::get_event(&self.pool, event_id)
            .await?
            .ok_or(Error::not_found("event", event_id))
    }

    fn invalidate_after_sync(&self, event: &EventInfo) {
        self.cache.invalidate(Scope::Event(event.id));
        self.cache.invalidate(Scope::Project(event.project_id));
        // Snapshot rows feed the availability board, cached globally.
        self.cache.invalidate(Scope::Catalog);
        self.feed.publish(Change {
            table: Table::ProjectEventEquipment,
            project_id: Some(event.project_id),
            event_id: Some(event.id),
        });
        self.feed.publish(Change {
            table: Table::ProjectEventRoles,
            project_id: Some(event.project_id),
            event_id: Some(event.id),
        });
        self.feed.publish(Change {
            table: Table::SyncOperations,
            project_id: Some(event.project_id),
            event_id: Some(event.id),
        });
    }
}
