//! Availability Hub: resource-kind-agnostic booking calculator.
//!
//! One generic engine computes per-date usage, overbooking flags, and the
//! minimum available capacity over a range. The differences between
//! equipment (integer stock depletion) and crew (one person, one role, one
//! day) live in an injected strategy; the hub itself never branches on the
//! resource kind.

pub mod crew;
pub mod equipment;

pub use crew::CrewStrategy;
pub use equipment::EquipmentStrategy;

use crate::cache::{CacheKey, ReadCache, Scope};
use crate::error::{Error, Result};
use crate::model::{DateRange, Resource, ResourceKind};
use crate::store::BookingRow;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Kind-specific operations the hub is parameterized by.
#[async_trait]
pub trait AvailabilityStrategy: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// All resources of this kind, each with the name of the collection it
    /// is displayed under (equipment folder, crew department).
    async fn fetch_resources(&self) -> Result<Vec<(Resource, String)>>;

    /// Bookings overlapping the range. An empty range has no bookings.
    async fn fetch_bookings(&self, range: &DateRange) -> Result<Vec<BookingRow>>;

    /// Units of the resource consumed on one date.
    fn usage(&self, resource: &Resource, date: NaiveDate, bookings: &[BookingRow]) -> i64 {
        bookings
            .iter()
            .filter(|b| b.resource_id == resource.id() && b.starts_on <= date && date <= b.ends_on)
            .map(|b| b.quantity)
            .sum()
    }

    /// Units still bookable given the day's usage.
    fn available(&self, resource: &Resource, usage: i64) -> i64;
}

/// One resource-day cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub usage: i64,
    pub available: i64,
    pub overbooked: bool,
}

/// One resource's figures over the queried range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceAvailability {
    pub resource: Resource,
    pub collection: String,
    pub days: Vec<DayAvailability>,
    /// Minimum available over the range; the raw capacity for an empty range.
    pub lowest_available: i64,
}

/// A named, ordered collection of resources (folder or department).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceCollection {
    pub name: String,
    pub resources: Vec<ResourceAvailability>,
}

/// Full availability view for one resource kind over a range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityBoard {
    pub kind: ResourceKind,
    pub range: DateRange,
    pub collections: Vec<ResourceCollection>,
}

impl AvailabilityBoard {
    pub fn find(&self, resource_id: i64) -> Option<&ResourceAvailability> {
        self.collections
            .iter()
            .flat_map(|c| c.resources.iter())
            .find(|r| r.resource.id() == resource_id)
    }
}

pub struct AvailabilityHub {
    strategy: Box<dyn AvailabilityStrategy>,
    cache: Arc<ReadCache>,
    /// Collection names listed here sort first, in list order; the rest
    /// follow alphabetically.
    priority: Vec<String>,
}

impl AvailabilityHub {
    pub fn new(
        strategy: Box<dyn AvailabilityStrategy>,
        cache: Arc<ReadCache>,
        priority: Vec<String>,
    ) -> Self {
        Self {
            strategy,
            cache,
            priority,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.strategy.kind()
    }

    /// Compute the availability board for the range. Results are advisory
    /// and may be served from the read cache until a snapshot write
    /// invalidates it.
    #[instrument(skip_all)]
    pub async fn board(&self, range: &DateRange) -> Result<AvailabilityBoard> {
        let key = CacheKey::new(
            Scope::Catalog,
            format!("board:{}:{}:{}", self.kind().as_str(), range.start, range.end),
        );
        if let Some(value) = self.cache.get(&key) {
            if let Ok(board) = serde_json::from_value::<AvailabilityBoard>(value) {
                return Ok(board);
            }
        }

        let resources = self.strategy.fetch_resources().await?;
        let bookings = self.strategy.fetch_bookings(range).await?;
        let dates = range.days();

        let mut by_collection: BTreeMap<String, Vec<ResourceAvailability>> = BTreeMap::new();
        for (resource, collection) in resources {
            let days: Vec<DayAvailability> = dates
                .iter()
                .map(|&date| {
                    let usage = self.strategy.usage(&resource, date, &bookings);
                    DayAvailability {
                        date,
                        usage,
                        available: self.strategy.available(&resource, usage),
                        overbooked: usage > resource.capacity(),
                    }
                })
                .collect();
            let lowest_available = days
                .iter()
                .map(|d| d.available)
                .min()
                .unwrap_or_else(|| resource.capacity());
            by_collection.entry(collection.clone()).or_default().push(
                ResourceAvailability {
                    resource,
                    collection,
                    days,
                    lowest_available,
                },
            );
        }

        let mut collections: Vec<ResourceCollection> = by_collection
            .into_iter()
            .map(|(name, mut resources)| {
                resources.sort_by(|a, b| {
                    a.resource
                        .name()
                        .cmp(b.resource.name())
                        .then(a.resource.id().cmp(&b.resource.id()))
                });
                ResourceCollection { name, resources }
            })
            .collect();
        collections.sort_by(|a, b| {
            self.priority_rank(&a.name)
                .cmp(&self.priority_rank(&b.name))
                .then(a.name.cmp(&b.name))
        });

        let board = AvailabilityBoard {
            kind: self.kind(),
            range: *range,
            collections,
        };
        if let Ok(value) = serde_json::to_value(&board) {
            self.cache.put(key, value);
        }
        Ok(board)
    }

    /// Minimum bookable units of one resource across the range; answers
    /// "can I book N units for this whole span." An empty range yields the
    /// resource's raw capacity.
    pub async fn lowest_available(&self, resource_id: i64, range: &DateRange) -> Result<i64> {
        let board = self.board(range).await?;
        board
            .find(resource_id)
            .map(|r| r.lowest_available)
            .ok_or(Error::not_found("resource", resource_id))
    }

    /// Bookings as the strategy sees them, for conflict derivation.
    pub async fn bookings(&self, range: &DateRange) -> Result<Vec<BookingRow>> {
        self.strategy.fetch_bookings(range).await
    }

    fn priority_rank(&self, name: &str) -> usize {
        self.priority
            .iter()
            .position(|p| p == name)
            .unwrap_or(self.priority.len())
    }
}
