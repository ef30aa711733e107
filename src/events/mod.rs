use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::entities::OrderStatus;

/// Domain events published after a lifecycle operation has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    OrderCreated {
        order_no: String,
        customer_name: String,
        line_count: usize,
    },
    OrderApproved {
        order_no: String,
        approved_by: String,
        approved_at: DateTime<Utc>,
    },
    OrderRejected {
        order_no: String,
        rejected_by: String,
    },
    OrderStatusChanged {
        order_no: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    ReceiptsRegistered {
        order_no: String,
        receipt_ids: Vec<i32>,
        total_qty: i64,
    },
    ShippingPlansCreated {
        order_no: String,
        plan_ids: Vec<i32>,
    },
    ShippingPlansInstructed {
        order_no: String,
        plan_ids: Vec<i32>,
    },
    ShipmentConfirmed {
        order_no: String,
        plan_ids: Vec<i32>,
        shipped_qty: i64,
        shipped_on: NaiveDate,
    },
}

impl Event {
    /// Order the event refers to.
    pub fn order_no(&self) -> &str {
        match self {
            Event::OrderCreated { order_no, .. }
            | Event::OrderApproved { order_no, .. }
            | Event::OrderRejected { order_no, .. }
            | Event::OrderStatusChanged { order_no, .. }
            | Event::ReceiptsRegistered { order_no, .. }
            | Event::ShippingPlansCreated { order_no, .. }
            | Event::ShippingPlansInstructed { order_no, .. }
            | Event::ShipmentConfirmed { order_no, .. } => order_no.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes without failing the caller. The state change the event
    /// describes is already committed, so a closed channel is only logged.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Publishes every event through `sender` when one is configured.
pub async fn publish_all(sender: Option<&EventSender>, events: Vec<Event>) {
    if let Some(sender) = sender {
        for event in events {
            sender.publish(event).await;
        }
    }
}

/// Subscribers receive every event in publication order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Counts lifecycle milestones.
pub struct MetricsEventHandler;

#[async_trait]
impl EventHandler for MetricsEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::OrderCreated { .. } => counter!("scm_orders_created_total", 1),
            Event::OrderApproved { .. } => counter!("scm_orders_approved_total", 1),
            Event::ReceiptsRegistered { receipt_ids, .. } => {
                counter!("scm_receipts_registered_total", receipt_ids.len() as u64)
            }
            Event::ShipmentConfirmed { plan_ids, .. } => {
                counter!("scm_shipments_confirmed_total", plan_ids.len() as u64)
            }
            _ => {}
        }
        Ok(())
    }
}

/// Drains the channel and fans each event out to `handlers`.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!(order_no = %event.order_no(), "Received event: {:?}", event);

        let results = join_all(handlers.iter().map(|h| h.handle_event(&event))).await;
        for result in results {
            if let Err(e) = result {
                error!("Event handler failed: event={:?}, error={}", event, e);
            }
        }
    }

    info!("Event channel closed; event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.seen.lock().await.push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_handlers_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let recorder = Arc::new(Recorder::default());
        let handlers: Vec<Arc<dyn EventHandler>> =
            vec![recorder.clone(), Arc::new(MetricsEventHandler)];
        let worker = tokio::spawn(process_events(rx, handlers));

        let sender = EventSender::new(tx);
        let events = vec![
            Event::OrderRejected {
                order_no: "ORD-2024-001".into(),
                rejected_by: "manager".into(),
            },
            Event::ShippingPlansInstructed {
                order_no: "ORD-2024-001".into(),
                plan_ids: vec![1, 2],
            },
        ];
        publish_all(Some(&sender), events.clone()).await;
        drop(sender);
        worker.await.unwrap();

        assert_eq!(*recorder.seen.lock().await, events);
    }

    #[tokio::test]
    async fn publish_on_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSender::new(tx)
            .publish(Event::ShippingPlansInstructed {
                order_no: "ORD-2024-001".into(),
                plan_ids: vec![],
            })
            .await;
    }

    #[test]
    fn every_event_names_its_order() {
        let instructed = Event::ShippingPlansInstructed {
            order_no: "ORD-2024-007".into(),
            plan_ids: vec![3],
        };
        assert_eq!(instructed.order_no(), "ORD-2024-007");
        let json = serde_json::to_value(&instructed).unwrap();
        assert_eq!(json["order_no"], "ORD-2024-007");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(Event::OrderStatusChanged {
            order_no: "ORD-2024-001".into(),
            old_status: OrderStatus::Approved,
            new_status: OrderStatus::InProduction,
        })
        .unwrap();
        assert_eq!(json["type"], "order_status_changed");
        assert_eq!(json["new_status"], "in_production");
    }
}
