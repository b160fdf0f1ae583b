//! Variant Resource Manager: owns the baseline resource plan.
//!
//! All mutations validate before touching the store, invalidate the
//! project's cached reads on success, and publish a change notice. Baseline
//! edits never touch event snapshots directly; drift is surfaced by the
//! sync engine on the next difference computation.

use crate::cache::{ReadCache, Scope};
use crate::error::{Error, Result};
use crate::model::AddOutcome;
use crate::store::{self, BaselineItem, Change, ChangeFeed, GroupRow, RoleSlot, Table};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct VariantResourceManager {
    pool: store::Pool,
    cache: Arc<ReadCache>,
    feed: ChangeFeed,
}

impl VariantResourceManager {
    pub fn new(pool: store::Pool, cache: Arc<ReadCache>, feed: ChangeFeed) -> Self {
        Self { pool, cache, feed }
    }

    /// Add equipment to the variant baseline. A second add of the same
    /// equipment merges: quantity increases by the requested amount and a
    /// groupless row adopts the supplied group.
    #[instrument(skip_all)]
    pub async fn add_equipment(
        &self,
        project_id: i64,
        variant_id: i64,
        equipment_id: i64,
        group_id: Option<i64>,
        quantity: i64,
        notes: Option<&str>,
    ) -> Result<(BaselineItem, AddOutcome)> {
        if quantity < 1 {
            return Err(Error::validation("quantity must be at least 1"));
        }
        if let Some(gid) = group_id {
            self.require_group(gid, project_id, variant_id).await?;
        }

        let (item, outcome) = store::upsert_baseline_item(
            &self.pool,
            project_id,
            variant_id,
            equipment_id,
            group_id,
            quantity,
            notes,
        )
        .await?;
        info!(project_id, variant_id, equipment_id, ?outcome, "baseline equipment added");
        self.touch_baseline(project_id, Table::ProjectEquipment);
        Ok((item, outcome))
    }

    /// Add a crew role slot to the variant baseline. The preferred crew
    /// member is exclusive per variant: one person cannot be preferred on
    /// two slots of the same plan.
    #[instrument(skip_all)]
    pub async fn add_role(
        &self,
        project_id: i64,
        variant_id: i64,
        role_id: i64,
        daily_rate: Option<f64>,
        hourly_rate: Option<f64>,
        preferred_id: Option<i64>,
    ) -> Result<(RoleSlot, AddOutcome)> {
        if let Some(member) = preferred_id {
            let taken = store::preferred_elsewhere(
                &self.pool,
                project_id,
                variant_id,
                member,
                Some(role_id),
            )
            .await?;
            if taken {
                return Err(Error::validation(
                    "crew member already holds a role slot in this variant",
                ));
            }
        }

        let (slot, outcome) = store::upsert_role_slot(
            &self.pool,
            project_id,
            variant_id,
            role_id,
            daily_rate,
            hourly_rate,
            preferred_id,
        )
        .await?;
        info!(project_id, variant_id, role_id, ?outcome, "baseline role slot added");
        self.touch_baseline(project_id, Table::ProjectRoles);
        Ok((slot, outcome))
    }

    /// Create a named baseline group. Sort order is assigned after the
    /// current maximum.
    #[instrument(skip_all)]
    pub async fn create_group(
        &self,
        project_id: i64,
        variant_id: i64,
        name: &str,
    ) -> Result<GroupRow> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("group name must be non-empty"));
        }
        let group = store::insert_group(&self.pool, project_id, variant_id, trimmed).await?;
        self.touch_baseline(project_id, Table::ProjectEquipmentGroups);
        Ok(group)
    }

    #[instrument(skip_all)]
    pub async fn rename_group(&self, group_id: i64, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("group name must be non-empty"));
        }
        let group = self.get_group(group_id).await?;
        store::rename_group(&self.pool, group_id, trimmed).await?;
        self.touch_baseline(group.project_id, Table::ProjectEquipmentGroups);
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reorder_group(&self, group_id: i64, sort_order: i64) -> Result<()> {
        let group = self.get_group(group_id).await?;
        store::reorder_group(&self.pool, group_id, sort_order).await?;
        self.touch_baseline(group.project_id, Table::ProjectEquipmentGroups);
        Ok(())
    }

    /// Delete a group with an explicit member disposition. `move_to`
    /// reassigns the members (and snapshot rows already pointing at this
    /// group); `None` deletes the members together with the group. Nothing
    /// is ever left referencing the deleted group.
    #[instrument(skip_all)]
    pub async fn delete_group(&self, group_id: i64, move_to: Option<i64>) -> Result<()> {
        let group = self.get_group(group_id).await?;
        if let Some(target) = move_to {
            if target == group_id {
                return Err(Error::validation("cannot move members into the deleted group"));
            }
            let dest = self.get_group(target).await?;
            if dest.project_id != group.project_id || dest.variant_id != group.variant_id {
                return Err(Error::validation(
                    "target group belongs to a different variant",
                ));
            }
        }
        store::delete_group(&self.pool, group_id, move_to).await?;
        info!(group_id, ?move_to, "baseline group deleted");
        self.touch_baseline(group.project_id, Table::ProjectEquipmentGroups);
        Ok(())
    }

    /// Remove a baseline equipment assignment.
    #[instrument(skip_all)]
    pub async fn remove_assignment(&self, id: i64) -> Result<()> {
        let item = store::get_baseline_item(&self.pool, id)
            .await?
            .ok_or(Error::not_found("baseline assignment", id))?;
        store::delete_baseline_item(&self.pool, id).await?;
        self.touch_baseline(item.project_id, Table::ProjectEquipment);
        Ok(())
    }

    /// Set a baseline assignment's quantity. A quantity of zero or less
    /// removes the assignment entirely; the updated row is returned
    /// otherwise.
    #[instrument(skip_all)]
    pub async fn update_quantity(&self, id: i64, quantity: i64) -> Result<Option<BaselineItem>> {
        let item = store::get_baseline_item(&self.pool, id)
            .await?
            .ok_or(Error::not_found("baseline assignment", id))?;
        if quantity <= 0 {
            store::delete_baseline_item(&self.pool, id).await?;
            self.touch_baseline(item.project_id, Table::ProjectEquipment);
            return Ok(None);
        }
        store::update_baseline_quantity(&self.pool, id, quantity).await?;
        self.touch_baseline(item.project_id, Table::ProjectEquipment);
        Ok(Some(BaselineItem { quantity, ..item }))
    }

    /// Remove a crew role slot from the baseline.
    #[instrument(skip_all)]
    pub async fn remove_role_slot(&self, id: i64) -> Result<()> {
        let slot = store::get_role_slot(&self.pool, id)
            .await?
            .ok_or(Error::not_found("role slot", id))?;
        store::delete_role_slot(&self.pool, id).await?;
        self.touch_baseline(slot.project_id, Table::ProjectRoles);
        Ok(())
    }

    pub async fn list_baseline(&self, project_id: i64, variant_id: i64) -> Result<Vec<BaselineItem>> {
        store::list_baseline(&self.pool, project_id, variant_id).await
    }

    pub async fn list_groups(&self, project_id: i64, variant_id: i64) -> Result<Vec<GroupRow>> {
        store::list_groups(&self.pool, project_id, variant_id).await
    }

    pub async fn list_role_slots(&self, project_id: i64, variant_id: i64) -> Result<Vec<RoleSlot>> {
        store::list_role_slots(&self.pool, project_id, variant_id).await
    }

    async fn get_group(&self, group_id: i64) -> Result<GroupRow> {
        store::get_group(&self.pool, group_id)
            .await?
            .ok_or(Error::not_found("group", group_id))
    }

    async fn require_group(&self, group_id: i64, project_id: i64, variant_id: i64) -> Result<()> {
        let group = self.get_group(group_id).await?;
        if group.project_id != project_id || group.variant_id != variant_id {
            return Err(Error::validation("group belongs to a different variant"));
        }
        Ok(())
    }

    fn touch_baseline(&self, project_id: i64, table: Table) {
        self.cache.invalidate(Scope::Project(project_id));
        self.feed.publish(Change {
            table,
            project_id: Some(project_id),
            event_id: None,
        });
    }
}
