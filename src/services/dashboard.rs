use sea_orm::{ColumnTrait, EntityTrait, Iterable, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    auth::{Actor, Role},
    db::DbPool,
    entities::{order, receipt, OrderKind, OrderStatus},
    errors::ServiceError,
};

const RECENT_ORDERS: u64 = 10;
const MANAGER_LIST_LIMIT: u64 = 10;
const PRODUCTION_LIST_LIMIT: u64 = 20;
const RECENT_RECEIPTS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDashboard {
    pub customer_name: String,
    pub total_orders: u64,
    pub pending: u64,
    /// `approved` and `in_production`.
    pub in_progress: u64,
    /// `shipped_complete`.
    pub completed: u64,
    pub recent_orders: Vec<order::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerDashboard {
    /// Keyed by status name.
    pub status_counts: BTreeMap<String, u64>,
    pub urgent_open_orders: Vec<order::Model>,
    pub oldest_pending_orders: Vec<order::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturingDashboard {
    pub approved: u64,
    pub in_production: u64,
    pub production_orders: Vec<order::Model>,
    pub my_recent_receipts: Vec<receipt::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Client(ClientDashboard),
    OrderManager(ManagerDashboard),
    Manufacturing(ManufacturingDashboard),
}

/// Read-only summaries for the landing page of each role.
#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn dashboard_for(&self, actor: &Actor) -> Result<Dashboard, ServiceError> {
        match actor.role {
            Role::Client => self.client_dashboard(actor).await.map(Dashboard::Client),
            Role::OrderManager => self.manager_dashboard().await.map(Dashboard::OrderManager),
            Role::Manufacturing => self
                .manufacturing_dashboard(actor)
                .await
                .map(Dashboard::Manufacturing),
        }
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn client_dashboard(&self, actor: &Actor) -> Result<ClientDashboard, ServiceError> {
        let customer = actor
            .customer_scope()?
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Forbidden("Dashboard needs a client actor".into()))?;
        let db = &*self.db_pool;
        let own = || order::Entity::find().filter(order::Column::CustomerName.eq(customer.as_str()));

        let total_orders = own().count(db).await?;
        let pending = own()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;
        let in_progress = own()
            .filter(
                order::Column::Status.is_in([OrderStatus::Approved, OrderStatus::InProduction]),
            )
            .count(db)
            .await?;
        let completed = own()
            .filter(order::Column::Status.eq(OrderStatus::ShippedComplete))
            .count(db)
            .await?;
        let recent_orders = own()
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNo)
            .limit(RECENT_ORDERS)
            .all(db)
            .await?;

        Ok(ClientDashboard {
            customer_name: customer,
            total_orders,
            pending,
            in_progress,
            completed,
            recent_orders,
        })
    }

    #[instrument(skip(self))]
    pub async fn manager_dashboard(&self) -> Result<ManagerDashboard, ServiceError> {
        let db = &*self.db_pool;

        let mut status_counts = BTreeMap::new();
        for status in OrderStatus::iter() {
            let count = order::Entity::find()
                .filter(order::Column::Status.eq(status))
                .count(db)
                .await?;
            status_counts.insert(status.to_string(), count);
        }

        let urgent_open_orders = order::Entity::find()
            .filter(order::Column::OrderKind.eq(OrderKind::Urgent))
            .filter(
                order::Column::Status
                    .is_not_in([OrderStatus::ShippedComplete, OrderStatus::Rejected]),
            )
            .order_by_desc(order::Column::Priority)
            .order_by_asc(order::Column::OrderDate)
            .limit(MANAGER_LIST_LIMIT)
            .all(db)
            .await?;

        let oldest_pending_orders = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .order_by_asc(order::Column::OrderDate)
            .order_by_asc(order::Column::CreatedAt)
            .limit(MANAGER_LIST_LIMIT)
            .all(db)
            .await?;

        Ok(ManagerDashboard {
            status_counts,
            urgent_open_orders,
            oldest_pending_orders,
        })
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn manufacturing_dashboard(
        &self,
        actor: &Actor,
    ) -> Result<ManufacturingDashboard, ServiceError> {
        let db = &*self.db_pool;
        let with_status =
            |status: OrderStatus| order::Entity::find().filter(order::Column::Status.eq(status));

        let approved = with_status(OrderStatus::Approved).count(db).await?;
        let in_production = with_status(OrderStatus::InProduction).count(db).await?;

        let production_orders = order::Entity::find()
            .filter(
                order::Column::Status.is_in([OrderStatus::Approved, OrderStatus::InProduction]),
            )
            .order_by_desc(order::Column::Priority)
            .order_by_asc(order::Column::OrderDate)
            .limit(PRODUCTION_LIST_LIMIT)
            .all(db)
            .await?;

        let my_recent_receipts = receipt::Entity::find()
            .filter(receipt::Column::ReceivedBy.eq(actor.id.as_str()))
            .order_by_desc(receipt::Column::ReceivedDate)
            .order_by_desc(receipt::Column::ReceiptId)
            .limit(RECENT_RECEIPTS)
            .all(db)
            .await?;

        Ok(ManufacturingDashboard {
            approved,
            in_production,
            production_orders,
            my_recent_receipts,
        })
    }
}
