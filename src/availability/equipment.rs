//! Stock-depletion strategy: equipment availability.

use super::AvailabilityStrategy;
use crate::error::Result;
use crate::model::{DateRange, Resource, ResourceKind};
use crate::store::{self, BookingRow};
use async_trait::async_trait;
use std::collections::HashMap;

const UNFILED: &str = "Uncategorized";

pub struct EquipmentStrategy {
    pool: store::Pool,
}

impl EquipmentStrategy {
    pub fn new(pool: store::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AvailabilityStrategy for EquipmentStrategy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Equipment
    }

    async fn fetch_resources(&self) -> Result<Vec<(Resource, String)>> {
        let folders: HashMap<i64, String> =
            store::folder_names(&self.pool).await?.into_iter().collect();
        let resources = store::list_equipment(&self.pool).await?;
        Ok(resources
            .into_iter()
            .map(|r| {
                let collection = r
                    .folder_id()
                    .and_then(|id| folders.get(&id).cloned())
                    .unwrap_or_else(|| UNFILED.to_string());
                (r, collection)
            })
            .collect())
    }

    async fn fetch_bookings(&self, range: &DateRange) -> Result<Vec<BookingRow>> {
        store::equipment_bookings(&self.pool, range).await
    }

    fn available(&self, resource: &Resource, usage: i64) -> i64 {
        (resource.capacity() - usage).max(0)
    }
}
