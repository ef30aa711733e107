use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::item,
    errors::ServiceError,
};

/// Read access to the active item catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Active items ordered by name.
    async fn list_active_items(&self) -> Result<Vec<item::Model>, ServiceError>;

    async fn find_active_item(&self, item_code: &str) -> Result<Option<item::Model>, ServiceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewItem {
    #[validate(length(min = 1, max = 32, message = "item_code must be 1-32 characters"))]
    pub item_code: String,
    #[validate(length(min = 1, max = 128, message = "item_name must be 1-128 characters"))]
    pub item_name: String,
    #[validate(range(min = 0, message = "lead_time_days must not be negative"))]
    pub lead_time_days: i32,
    pub unit_price: Decimal,
}

/// Catalog backed by the `item_master` table.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Adds an active item. Used for seeding; catalog administration proper
    /// happens elsewhere.
    #[instrument(skip(self, new_item), fields(item_code = %new_item.item_code))]
    pub async fn create_item(&self, new_item: NewItem) -> Result<item::Model, ServiceError> {
        new_item.validate()?;
        if new_item.unit_price < Decimal::ZERO {
            return Err(ServiceError::validation("unit_price must not be negative"));
        }

        let existing = item::Entity::find()
            .filter(
                item::Column::ItemCode
                    .eq(new_item.item_code.as_str())
                    .or(item::Column::ItemName.eq(new_item.item_name.as_str())),
            )
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(existing) = existing {
            warn!(existing = %existing.item_code, "Duplicate catalog item");
            return Err(ServiceError::Conflict(format!(
                "Item with code '{}' or name '{}' already exists",
                new_item.item_code, new_item.item_name
            )));
        }

        let model = item::ActiveModel {
            item_code: Set(new_item.item_code),
            item_name: Set(new_item.item_name),
            lead_time_days: Set(new_item.lead_time_days),
            unit_price: Set(new_item.unit_price),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                return ServiceError::Conflict("Item already exists".to_string());
            }
            error!(error = %e, "Failed to insert catalog item");
            ServiceError::db_error(e)
        })?;

        info!(item_code = %model.item_code, "Catalog item created");
        Ok(model)
    }
}

#[async_trait]
impl CatalogReader for CatalogService {
    async fn list_active_items(&self) -> Result<Vec<item::Model>, ServiceError> {
        item::Entity::find()
            .filter(item::Column::IsActive.eq(true))
            .order_by_asc(item::Column::ItemName)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list catalog items");
                ServiceError::db_error(e)
            })
    }

    async fn find_active_item(&self, item_code: &str) -> Result<Option<item::Model>, ServiceError> {
        item::Entity::find_by_id(item_code.to_string())
            .filter(item::Column::IsActive.eq(true))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
