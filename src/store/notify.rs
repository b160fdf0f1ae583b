//! Change-notification feed for dependent views and caches.
//!
//! Delivery is at-least-once and carries no row data: consumers must
//! re-fetch whatever the change touches rather than trust the payload. A
//! receiver that falls behind observes `Notification::Lagged` and should
//! treat it as "invalidate everything I watch."

use tokio::sync::broadcast;

/// Store tables a consumer can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Equipment,
    CrewMembers,
    ProjectEquipment,
    ProjectEquipmentGroups,
    ProjectRoles,
    ProjectEventEquipment,
    ProjectEventRoles,
    SyncOperations,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Equipment => "equipment",
            Table::CrewMembers => "crew_members",
            Table::ProjectEquipment => "project_equipment",
            Table::ProjectEquipmentGroups => "project_equipment_groups",
            Table::ProjectRoles => "project_roles",
            Table::ProjectEventEquipment => "project_event_equipment",
            Table::ProjectEventRoles => "project_event_roles",
            Table::SyncOperations => "sync_operations",
        }
    }
}

/// A single change notice. Ids are advisory scoping hints, not payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub table: Table,
    pub project_id: Option<i64>,
    pub event_id: Option<i64>,
}

/// Subscription filter. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub project_id: Option<i64>,
    pub event_id: Option<i64>,
}

impl ChangeFilter {
    pub fn project(project_id: i64) -> Self {
        Self {
            project_id: Some(project_id),
            event_id: None,
        }
    }

    pub fn event(event_id: i64) -> Self {
        Self {
            project_id: None,
            event_id: Some(event_id),
        }
    }

    fn matches(&self, change: &Change) -> bool {
        if let Some(p) = self.project_id {
            if change.project_id != Some(p) {
                return false;
            }
        }
        if let Some(e) = self.event_id {
            if change.event_id != Some(e) {
                return false;
            }
        }
        true
    }
}

/// What a subscriber sees on `recv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Change(Change),
    /// The receiver fell behind and missed messages.
    Lagged,
    /// The feed was dropped.
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change. A feed with no live subscribers drops the notice.
    pub fn publish(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    /// Subscribe to one table (or all tables with `None`) under a filter.
    pub fn subscribe(&self, table: Option<Table>, filter: ChangeFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            table,
            filter,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Change>,
    table: Option<Table>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Next matching notification. Non-matching changes are skipped.
    pub async fn recv(&mut self) -> Notification {
        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if let Some(table) = self.table {
                        if change.table != table {
                            continue;
                        }
                    }
                    if !self.filter.matches(&change) {
                        continue;
                    }
                    return Notification::Change(change);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => return Notification::Lagged,
                Err(broadcast::error::RecvError::Closed) => return Notification::Closed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_filters_by_table_and_project() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(Some(Table::ProjectEquipment), ChangeFilter::project(7));

        feed.publish(Change {
            table: Table::ProjectRoles,
            project_id: Some(7),
            event_id: None,
        });
        feed.publish(Change {
            table: Table::ProjectEquipment,
            project_id: Some(8),
            event_id: None,
        });
        feed.publish(Change {
            table: Table::ProjectEquipment,
            project_id: Some(7),
            event_id: None,
        });

        match sub.recv().await {
            Notification::Change(c) => {
                assert_eq!(c.table, Table::ProjectEquipment);
                assert_eq!(c.project_id, Some(7));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wildcard_subscription_sees_everything() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(None, ChangeFilter::default());

        feed.publish(Change {
            table: Table::SyncOperations,
            project_id: Some(1),
            event_id: Some(2),
        });
        assert!(matches!(sub.recv().await, Notification::Change(_)));
    }

    #[tokio::test]
    async fn closed_feed_reports_closed() {
        let feed = ChangeFeed::new(4);
        let mut sub = feed.subscribe(None, ChangeFilter::default());
        drop(feed);
        assert_eq!(sub.recv().await, Notification::Closed);
    }
}
