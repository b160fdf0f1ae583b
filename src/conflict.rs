//! Conflict surfacing and resolution.
//!
//! The resolver contract is an extension point: the shipped implementation
//! reports no conflicts and resolves after a fixed delay. Real detection
//! derives from the availability board's overbooked flags; `detect` does
//! that derivation and is what the daemon logs from.

use crate::availability::{AvailabilityBoard, AvailabilityHub};
use crate::error::Result;
use crate::model::{DateRange, ResourceKind};
use crate::store::BookingRow;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One booking competing for an overbooked resource-day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompetingAssignment {
    pub event_id: i64,
    pub quantity: i64,
}

/// A resource overbooked on one date, with the bookings that collide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ResourceKind,
    pub resource_id: i64,
    pub resource_name: String,
    pub date: NaiveDate,
    pub competing: Vec<CompetingAssignment>,
}

#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn conflicts(&self) -> Result<Vec<Conflict>>;
    async fn resolve(&self, conflict: &Conflict) -> Result<()>;
}

/// Placeholder resolver: no conflicts, resolution succeeds after a fixed
/// delay.
pub struct StubResolver {
    delay: Duration,
}

impl StubResolver {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for StubResolver {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

#[async_trait]
impl ConflictResolver for StubResolver {
    async fn conflicts(&self) -> Result<Vec<Conflict>> {
        Ok(Vec::new())
    }

    async fn resolve(&self, _conflict: &Conflict) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Derive conflicts for a range from the hub's overbooked flags.
pub async fn detect(hub: &AvailabilityHub, range: &DateRange) -> Result<Vec<Conflict>> {
    let board = hub.board(range).await?;
    let bookings = hub.bookings(range).await?;
    Ok(conflicts_from_board(&board, &bookings))
}

/// Pair every overbooked resource-day with the bookings that cover it.
pub fn conflicts_from_board(board: &AvailabilityBoard, bookings: &[BookingRow]) -> Vec<Conflict> {
    let mut out = Vec::new();
    for collection in &board.collections {
        for ra in &collection.resources {
            for day in &ra.days {
                if !day.overbooked {
                    continue;
                }
                let competing: Vec<CompetingAssignment> = bookings
                    .iter()
                    .filter(|b| {
                        b.resource_id == ra.resource.id()
                            && b.starts_on <= day.date
                            && day.date <= b.ends_on
                    })
                    .map(|b| CompetingAssignment {
                        event_id: b.event_id,
                        quantity: b.quantity,
                    })
                    .collect();
                out.push(Conflict {
                    kind: board.kind,
                    resource_id: ra.resource.id(),
                    resource_name: ra.resource.name().to_string(),
                    date: day.date,
                    competing,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_reports_nothing_and_resolves() {
        let resolver = StubResolver::new(Duration::from_millis(1));
        assert!(resolver.conflicts().await.unwrap().is_empty());
        let conflict = Conflict {
            kind: ResourceKind::Crew,
            resource_id: 1,
            resource_name: "Alice".into(),
            date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            competing: vec![],
        };
        resolver.resolve(&conflict).await.unwrap();
    }
}
