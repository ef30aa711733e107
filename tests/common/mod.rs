#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use battery_scm::{
    auth::{Actor, Role, ACTOR_COMPANY_HEADER, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    config::AppConfig,
    db::{self, DbPool},
    entities::{order, OrderKind},
    events::{Event, EventSender},
    services::{
        catalog::NewItem,
        orders::{CreateOrderRequest, OrderLineInput},
        receiving::ReceiptInput,
        shipping::{ConfirmReceiptRequest, ShippingPlanInput},
    },
    AppState,
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sea_orm::ConnectionTrait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

pub const CUSTOMER: &str = "Acme Cells";
pub const SEPARATOR: &str = "SEP-A";
pub const ANODE: &str = "ANO-F";

/// Application state over a private in-memory SQLite database with a small
/// seeded catalog. Published events are collected for assertions.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    events: Arc<Mutex<Vec<Event>>>,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig::new(
        database_url.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = test_config("sqlite::memory:");
        // One connection keeps the whole test on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        Self::with_config(cfg).await
    }

    /// A SQLite database file under `dir` shared by `connections` pooled
    /// connections, so concurrent transactions really interleave.
    pub async fn on_file(dir: &TempDir, connections: u32, max_attempts: u32) -> Self {
        let path = dir.path().join("scm.db");
        let mut cfg = test_config(&format!("sqlite://{}?mode=rwc", path.display()));
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;
        cfg.order_number_max_attempts = max_attempts;
        Self::with_config(cfg).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        pool.execute_unprepared("PRAGMA journal_mode = WAL")
            .await
            .expect("journal mode");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (tx, mut rx) = mpsc::channel::<Event>(256);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let event_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.lock().await.push(event);
            }
        });

        let state = AppState::new(Arc::new(pool), cfg, Some(Arc::new(EventSender::new(tx))));
        let router = battery_scm::build_router(state.clone());

        let app = Self {
            state,
            router,
            events,
            _event_task: event_task,
        };
        app.seed_catalog().await;
        app
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    async fn seed_catalog(&self) {
        let items = [
            (SEPARATOR, "Separator A", 7, dec!(1000)),
            (ANODE, "Anode Foil", 14, dec!(250.50)),
        ];
        for (code, name, lead, price) in items {
            self.state
                .services
                .catalog
                .create_item(NewItem {
                    item_code: code.to_string(),
                    item_name: name.to_string(),
                    lead_time_days: lead,
                    unit_price: price,
                })
                .await
                .expect("seed catalog item");
        }
    }

    /// Events observed so far. Publishing is asynchronous, so callers
    /// should give the channel a moment first via [`TestApp::settle`].
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        actor: Option<&Actor>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder
                .header(ACTOR_ID_HEADER, actor.id.as_str())
                .header(ACTOR_ROLE_HEADER, actor.role.to_string());
            if let Some(company) = &actor.company {
                builder = builder.header(ACTOR_COMPANY_HEADER, company.as_str());
            }
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    /// Creates a pending order for [`CUSTOMER`] with the given
    /// `(item_code, quantity)` lines.
    pub async fn place_order(&self, lines: &[(&str, i32)]) -> order::Model {
        self.state
            .services
            .orders
            .create_order(&client(), order_request(date(2024, 3, 1), lines))
            .await
            .expect("create order")
    }

    /// Places and approves an order.
    pub async fn approved_order(&self, lines: &[(&str, i32)]) -> order::Model {
        let order = self.place_order(lines).await;
        self.state
            .services
            .orders
            .approve_order(&manager(), &order.order_no, 5)
            .await
            .expect("approve order")
    }

    /// Takes an order all the way to `received_complete`.
    pub async fn received_order(&self, lines: &[(&str, i32)]) -> order::Model {
        let order = self.approved_order(lines).await;
        let items = lines
            .iter()
            .zip(1..)
            .map(|(&(_, qty), seq)| receipt(seq, qty))
            .collect();
        self.state
            .services
            .receiving
            .register_receipts(&manufacturing(), &order.order_no, items)
            .await
            .expect("register receipts");
        self.state
            .services
            .orders
            .get_order(&order.order_no)
            .await
            .expect("reload order")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn client() -> Actor {
    Actor::new("carol", Role::Client).with_company(CUSTOMER)
}

pub fn other_client() -> Actor {
    Actor::new("oscar", Role::Client).with_company("Other Motors")
}

pub fn manager() -> Actor {
    Actor::new("maria", Role::OrderManager)
}

pub fn manufacturing() -> Actor {
    Actor::new("felix", Role::Manufacturing)
}

pub fn order_request(order_date: NaiveDate, lines: &[(&str, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        order_date,
        order_kind: OrderKind::Normal,
        customer_name: CUSTOMER.to_string(),
        lines: lines
            .iter()
            .map(|&(code, quantity)| OrderLineInput {
                item_code: code.to_string(),
                quantity,
                unit_price: None,
                planned_shipping_date: None,
            })
            .collect(),
    }
}

pub fn receipt(line_seq: i32, quantity: i32) -> ReceiptInput {
    ReceiptInput {
        line_seq,
        quantity,
        received_date: date(2024, 3, 10),
        received_by: None,
    }
}

pub fn plan(order_no: &str, line_seq: i32, quantity: i32) -> ShippingPlanInput {
    ShippingPlanInput {
        order_no: order_no.to_string(),
        line_seq,
        quantity,
        planned_shipping_date: date(2024, 3, 20),
    }
}

pub fn confirm(plan_ids: Vec<i32>) -> ConfirmReceiptRequest {
    ConfirmReceiptRequest {
        plan_ids,
        received_on: Some(date(2024, 3, 22)),
    }
}
