//! Store entity and view models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use chrono::NaiveDate;

/// Baseline equipment assignment for one (project, variant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineItem {
    pub id: i64,
    pub project_id: i64,
    pub variant_id: i64,
    pub equipment_id: i64,
    pub group_id: Option<i64>,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Baseline crew role slot. A slot has implicit quantity 1; `preferred_id`
/// is the crew member expected to fill it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSlot {
    pub id: i64,
    pub project_id: i64,
    pub variant_id: i64,
    pub role_id: i64,
    pub daily_rate: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub preferred_id: Option<i64>,
}

/// Equipment snapshot row attached to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotItem {
    pub id: i64,
    pub equipment_id: i64,
    pub quantity: i64,
    pub group_id: Option<i64>,
    pub is_synced: bool,
}

/// Crew snapshot row attached to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRole {
    pub id: i64,
    pub role_id: i64,
    pub crew_member_id: Option<i64>,
}

/// Event joined with its type's resource-kind gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    pub id: i64,
    pub project_id: i64,
    pub variant_id: i64,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub needs_equipment: bool,
    pub needs_crew: bool,
}

/// Baseline group row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub id: i64,
    pub project_id: i64,
    pub variant_id: i64,
    pub name: String,
    pub sort_order: i64,
}

/// One booked span of a resource, shared by both availability strategies
/// (crew bookings carry quantity 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRow {
    pub resource_id: i64,
    pub event_id: i64,
    pub quantity: i64,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}
