//! Exclusivity strategy: crew availability. One person fills one role on
//! one day; a second assignment on the same date is an overbooking.

use super::AvailabilityStrategy;
use crate::error::Result;
use crate::model::{DateRange, Resource, ResourceKind};
use crate::store::{self, BookingRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

const UNASSIGNED: &str = "Unassigned";

pub struct CrewStrategy {
    pool: store::Pool,
}

impl CrewStrategy {
    pub fn new(pool: store::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AvailabilityStrategy for CrewStrategy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Crew
    }

    async fn fetch_resources(&self) -> Result<Vec<(Resource, String)>> {
        let departments: HashMap<i64, String> =
            store::folder_names(&self.pool).await?.into_iter().collect();
        let resources = store::list_crew_members(&self.pool).await?;
        Ok(resources
            .into_iter()
            .map(|r| {
                let collection = r
                    .folder_id()
                    .and_then(|id| departments.get(&id).cloned())
                    .unwrap_or_else(|| UNASSIGNED.to_string());
                (r, collection)
            })
            .collect())
    }

    async fn fetch_bookings(&self, range: &DateRange) -> Result<Vec<BookingRow>> {
        store::crew_bookings(&self.pool, range).await
    }

    /// Count of assignments, not a quantity sum: crew bookings always carry
    /// quantity 1.
    fn usage(&self, resource: &Resource, date: NaiveDate, bookings: &[BookingRow]) -> i64 {
        bookings
            .iter()
            .filter(|b| b.resource_id == resource.id() && b.starts_on <= date && date <= b.ends_on)
            .count() as i64
    }

    fn available(&self, _resource: &Resource, usage: i64) -> i64 {
        if usage == 0 {
            1
        } else {
            0
        }
    }
}
