pub mod catalog;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod receiving;
pub mod shipping;

use std::sync::Arc;

use crate::{
    auth::{Actor, Role},
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        catalog::{CatalogReader, CatalogService},
        dashboard::DashboardService,
        order_numbers::OrderNumberSettings,
        orders::OrderService,
        receiving::ReceivingService,
        shipping::ShippingService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub receiving: Arc<ReceivingService>,
    pub shipping: Arc<ShippingService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db_pool.clone()));
        let reader: Arc<dyn CatalogReader> = catalog.clone();
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            reader,
            event_sender.clone(),
            OrderNumberSettings::from(config),
        ));
        let receiving = Arc::new(ReceivingService::new(db_pool.clone(), event_sender.clone()));
        let shipping = Arc::new(ShippingService::new(db_pool.clone(), event_sender));
        let dashboard = Arc::new(DashboardService::new(db_pool));

        Self {
            catalog,
            orders,
            receiving,
            shipping,
            dashboard,
        }
    }
}

/// Refuses a client access to another customer's order. Staff roles pass
/// without a lookup.
pub(crate) async fn ensure_order_access(
    state: &AppState,
    actor: &Actor,
    order_no: &str,
) -> Result<(), ServiceError> {
    if actor.role != Role::Client {
        return Ok(());
    }
    let order = state.services.orders.get_order(order_no).await?;
    actor.ensure_customer_access(order_no, &order.customer_name)
}
