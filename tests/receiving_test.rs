mod common;

use assert_matches::assert_matches;
use battery_scm::{
    entities::{receipt, OrderStatus},
    errors::ServiceError,
    ledger,
};
use common::*;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn partial_receipts_keep_the_order_in_production() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 100), (ANODE, 40)]).await;
    let receiving = &app.state.services.receiving;

    let first = receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 100)])
        .await
        .unwrap();
    // Line 1 is complete but line 2 has nothing yet.
    assert_eq!(first.status, OrderStatus::InProduction);

    let second = receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![receipt(2, 25)])
        .await
        .unwrap();
    assert_eq!(second.status, OrderStatus::InProduction);

    let progress = receiving.get_receipt_status(&order.order_no).await.unwrap();
    assert_eq!(progress.ordered, 140);
    assert_eq!(progress.received, 125);
    assert!((progress.progress - 125.0 / 140.0 * 100.0).abs() < 1e-9);

    let last = receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![receipt(2, 15)])
        .await
        .unwrap();
    assert_eq!(last.status, OrderStatus::ReceivedComplete);
}

#[tokio::test]
async fn batch_quantities_for_one_line_are_checked_together() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 100)]).await;
    let receiving = &app.state.services.receiving;

    let result = receiving
        .register_receipts(
            &manufacturing(),
            &order.order_no,
            vec![receipt(1, 60), receipt(1, 60)],
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let rows = receipt::Entity::find()
        .filter(receipt::Column::OrderNo.eq(order.order_no.as_str()))
        .count(app.db())
        .await
        .unwrap();
    assert_eq!(rows, 0);
    let reloaded = app.state.services.orders.get_order(&order.order_no).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Approved);
}

#[tokio::test]
async fn overshoot_is_measured_against_what_was_already_received() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 100)]).await;
    let receiving = &app.state.services.receiving;

    receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 70)])
        .await
        .unwrap();
    assert_matches!(
        receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 31)])
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let detail = receiving
        .get_detailed_receipt_status(&order.order_no)
        .await
        .unwrap();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0].received, 70);
    assert_eq!(detail[0].remaining, 30);
}

#[tokio::test]
async fn receipts_after_completion_are_refused() {
    let app = TestApp::new().await;
    let order = app.received_order(&[(SEPARATOR, 10)]).await;

    assert_matches!(
        app.state
            .services
            .receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 1)])
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
}

#[tokio::test]
async fn receipts_need_an_approved_order() {
    let app = TestApp::new().await;
    let order = app.place_order(&[(SEPARATOR, 10)]).await;

    assert_matches!(
        app.state
            .services
            .receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 1)])
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
}

#[tokio::test]
async fn receipt_input_is_validated() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 10)]).await;
    let receiving = &app.state.services.receiving;

    assert_matches!(
        receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![])
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(1, 0)])
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(9, 1)])
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        receiving
            .register_receipts(&client(), &order.order_no, vec![receipt(1, 1)])
            .await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn explicit_receiver_is_recorded() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 10)]).await;
    let mut item = receipt(1, 4);
    item.received_by = Some("night-shift".into());

    app.state
        .services
        .receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![item])
        .await
        .unwrap();

    let history = app
        .state
        .services
        .receiving
        .get_receipt_history(&order.order_no)
        .await
        .unwrap();
    assert_eq!(history[0].received_by, "night-shift");
}

#[tokio::test]
async fn history_is_newest_first() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 10)]).await;
    let receiving = &app.state.services.receiving;

    let mut early = receipt(1, 2);
    early.received_date = date(2024, 3, 2);
    let mut late = receipt(1, 3);
    late.received_date = date(2024, 3, 9);
    receiving
        .register_receipts(&manufacturing(), &order.order_no, vec![early, late])
        .await
        .unwrap();

    let history = receiving.get_receipt_history(&order.order_no).await.unwrap();
    let dates: Vec<_> = history.iter().map(|r| r.received_date).collect();
    assert_eq!(dates, vec![date(2024, 3, 9), date(2024, 3, 2)]);
}

#[tokio::test]
async fn awaiting_receipt_lists_approved_and_in_production_orders() {
    let app = TestApp::new().await;
    let pending = app.place_order(&[(SEPARATOR, 10)]).await;
    let approved = app.approved_order(&[(SEPARATOR, 10)]).await;
    let in_production = app.approved_order(&[(SEPARATOR, 10)]).await;
    app.state
        .services
        .receiving
        .register_receipts(&manufacturing(), &in_production.order_no, vec![receipt(1, 5)])
        .await
        .unwrap();
    let done = app.received_order(&[(SEPARATOR, 10)]).await;

    let waiting: Vec<String> = app
        .state
        .services
        .receiving
        .orders_awaiting_receipt()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_no)
        .collect();

    assert!(waiting.contains(&approved.order_no));
    assert!(waiting.contains(&in_production.order_no));
    assert!(!waiting.contains(&pending.order_no));
    assert!(!waiting.contains(&done.order_no));
}

#[tokio::test]
async fn status_always_matches_the_receipt_ledger() {
    let app = TestApp::new().await;
    let order = app.approved_order(&[(SEPARATOR, 30), (ANODE, 20)]).await;
    let receiving = &app.state.services.receiving;
    let steps = [(1, 10), (2, 20), (1, 15), (1, 5)];

    for (line_seq, qty) in steps {
        receiving
            .register_receipts(&manufacturing(), &order.order_no, vec![receipt(line_seq, qty)])
            .await
            .unwrap();

        let details = app
            .state
            .services
            .orders
            .get_order_details(&order.order_no)
            .await
            .unwrap();
        let history = receiving.get_receipt_history(&order.order_no).await.unwrap();
        let received = ledger::received_by_line(&history);
        let complete = ledger::all_lines_received(&details.lines, &received);
        assert_eq!(
            complete,
            details.order.status == OrderStatus::ReceivedComplete,
            "status {} disagrees with ledger {:?}",
            details.order.status,
            received
        );

        for line in &details.lines {
            let inventory = app
                .state
                .services
                .shipping
                .get_line_inventory(&order.order_no, line.line_seq)
                .await
                .unwrap();
            assert_eq!(
                inventory.received,
                received.get(&line.line_seq).copied().unwrap_or(0)
            );
        }
    }
}
