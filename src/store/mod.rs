//! Resource store: SQLite schema access and the change feed.
//!
//! This module is split into three submodules:
//! - `model`: typed row and view models returned by repositories.
//! - `repo`: SQL-only functions that map rows into models, including the
//!   transactional `sync_equipment` / `sync_crew` reconciliation entry points.
//! - `notify`: the change-notification feed consumed for cache invalidation.
//!
//! External modules should import from `crewdeck::store`; the repository
//! API and commonly used models are re-exported for convenience.

pub mod model;
pub mod notify;
pub mod repo;

pub use model::{BaselineItem, BookingRow, EventInfo, EventRole, GroupRow, RoleSlot, SnapshotItem};
pub use notify::{Change, ChangeFeed, ChangeFilter, Notification, Table};
pub use repo::*;
