use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two resource kinds the engine schedules. Equipment depletes integer
/// stock; a crew member is exclusive (one role, one day).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Equipment,
    Crew,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Equipment => "equipment",
            ResourceKind::Crew => "crew",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "equipment" => Some(ResourceKind::Equipment),
            "crew" => Some(ResourceKind::Crew),
            _ => None,
        }
    }
}

/// Snapshot status relative to the baseline it was copied from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    OutOfSync,
}

/// Lifecycle of one recorded sync attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OperationStatus::Pending),
            "completed" => Some(OperationStatus::Completed),
            "failed" => Some(OperationStatus::Failed),
            _ => None,
        }
    }
}

/// A catalog resource. Field-level typing per kind; shared accessors for the
/// availability engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Resource {
    Equipment {
        id: i64,
        name: String,
        code: Option<String>,
        stock: i64,
        folder_id: Option<i64>,
    },
    CrewMember {
        id: i64,
        name: String,
        folder_id: Option<i64>,
    },
}

impl Resource {
    pub fn id(&self) -> i64 {
        match self {
            Resource::Equipment { id, .. } | Resource::CrewMember { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Equipment { name, .. } | Resource::CrewMember { name, .. } => name,
        }
    }

    pub fn folder_id(&self) -> Option<i64> {
        match self {
            Resource::Equipment { folder_id, .. } | Resource::CrewMember { folder_id, .. } => {
                *folder_id
            }
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Equipment { .. } => ResourceKind::Equipment,
            Resource::CrewMember { .. } => ResourceKind::Crew,
        }
    }

    /// Units bookable per day: equipment stock, 1 for a crew member.
    pub fn capacity(&self) -> i64 {
        match self {
            Resource::Equipment { stock, .. } => *stock,
            Resource::CrewMember { .. } => 1,
        }
    }
}

/// Inclusive date span. `start > end` is the empty range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut d = self.start;
        while d <= self.end {
            out.push(d);
            d = d + Duration::days(1);
        }
        out
    }
}

/// Whether an add merged into an existing baseline row or inserted a new one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Updated,
}

/// One baseline-only or snapshot-only resource in a difference report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffEntry {
    pub resource_id: i64,
    pub quantity: i64,
    pub group_id: Option<i64>,
}

/// A resource present on both sides with differing quantity, group, or
/// (for crew role slots) assigned member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffChange {
    pub resource_id: i64,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub old_group: Option<i64>,
    pub new_group: Option<i64>,
    pub old_member: Option<i64>,
    pub new_member: Option<i64>,
}

/// Difference between a variant baseline and one event snapshot, for a
/// single resource kind. Purely informational: computing it mutates nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDiff {
    pub added: Vec<DiffEntry>,
    pub removed: Vec<DiffEntry>,
    pub changed: Vec<DiffChange>,
}

impl ResourceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Full difference report for one event. A `None` side means the event's
/// type does not carry that resource kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventDifference {
    pub event_id: i64,
    pub equipment: Option<ResourceDiff>,
    pub crew: Option<ResourceDiff>,
}

impl EventDifference {
    pub fn status(&self) -> SyncStatus {
        let clean = self.equipment.as_ref().map_or(true, ResourceDiff::is_empty)
            && self.crew.as_ref().map_or(true, ResourceDiff::is_empty);
        if clean {
            SyncStatus::Synced
        } else {
            SyncStatus::OutOfSync
        }
    }
}

/// Audit record of one sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: i64,
    pub public_id: Uuid,
    pub project_id: i64,
    pub event_id: i64,
    pub kind: ResourceKind,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
