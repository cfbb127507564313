mod common;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use sky_takeout::entities::{
    dish::SaleStatus,
    order::{PayMethod, PayStatus, Status},
};
use sky_takeout::error::AppError;
use sky_takeout::services::catalog::ItemRef;
use sky_takeout::services::order::{Actor, OrderAction, OrderQuery, SubmitOrder};
use sky_takeout::services::payment::{PaymentError, PaymentGateway, PaymentVoucher};

use common::{address, money, setup, setup_with_gateway, TestApp};

/// Cart with 2 × 28.00 + 1 × 12.50, submitted.
async fn submitted(app: &TestApp) -> (i32, String) {
    let chicken = app.dish("Kung Pao Chicken", "28.00").await;
    let noodles = app.dish("Noodles", "12.50").await;
    let cart = &app.state.cart;
    cart.add_item(app.user_id, ItemRef::Dish(chicken.id), None).await.unwrap();
    cart.add_item(app.user_id, ItemRef::Dish(chicken.id), None).await.unwrap();
    cart.add_item(app.user_id, ItemRef::Dish(noodles.id), Some("mild")).await.unwrap();

    let submission = app
        .state
        .orders
        .submit(app.user_id, address())
        .await
        .expect("Failed to submit order");
    (submission.id, submission.number)
}

async fn paid(app: &TestApp) -> i32 {
    let (id, number) = submitted(app).await;
    app.state
        .orders
        .request_payment(app.user_id, &number)
        .await
        .expect("Failed to request payment");
    app.state
        .orders
        .confirm_paid(&number, PayMethod::Wechat)
        .await
        .expect("Failed to confirm payment");
    id
}

async fn staff(app: &TestApp, id: i32, action: OrderAction) -> Result<Status, AppError> {
    app.state
        .orders
        .transition(Actor::Staff(app.admin_id), id, action)
        .await
        .map(|order| order.status)
}

async fn status_of(app: &TestApp, id: i32) -> Status {
    app.state
        .orders
        .get(Actor::Staff(app.admin_id), id)
        .await
        .unwrap()
        .order
        .status
}

fn reason(text: &str) -> OrderAction {
    OrderAction::Reject {
        reason: text.to_owned(),
    }
}

#[tokio::test]
async fn submit_copies_cart_and_clears_it() {
    let app = setup().await;
    let (id, number) = submitted(&app).await;

    let view = app
        .state
        .orders
        .get(Actor::Customer(app.user_id), id)
        .await
        .unwrap();
    let detail_sum: Decimal = view
        .details
        .iter()
        .map(|d| d.amount * Decimal::from(d.number))
        .sum();

    assert_eq!(view.order.number, number);
    assert_eq!(view.order.status, Status::PendingPayment);
    assert_eq!(view.order.pay_status, PayStatus::Unpaid);
    assert_eq!(detail_sum, money("68.50"));
    // Delivery fee from the test config
    assert_eq!(view.order.amount, money("74.50"));
    assert_eq!(view.details.len(), 2);
    assert_eq!(view.details[1].dish_flavor.as_deref(), Some("mild"));
    assert!(app.state.cart.list(app.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn details_do_not_follow_catalog_prices() {
    let app = setup().await;
    let (id, _) = submitted(&app).await;
    let chicken = app.state.catalog.list_dishes(None).await.unwrap()[0].clone();

    app.state
        .catalog
        .update_dish(
            app.admin_id,
            chicken.id,
            common::dish_input("Kung Pao Chicken", app.dish_category, "99.00"),
        )
        .await
        .unwrap();

    let view = app
        .state
        .orders
        .get(Actor::Customer(app.user_id), id)
        .await
        .unwrap();
    assert_eq!(view.details[0].amount, money("28.00"));
}

#[tokio::test]
async fn empty_cart_cannot_be_submitted() {
    let app = setup().await;
    assert!(matches!(
        app.state.orders.submit(app.user_id, address()).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn bad_address_is_rejected_before_anything_happens() {
    let app = setup().await;
    let dish = app.dish("Tea", "3.00").await;
    app.state
        .cart
        .add_item(app.user_id, ItemRef::Dish(dish.id), None)
        .await
        .unwrap();

    let input = SubmitOrder {
        phone: "call me".into(),
        ..address()
    };
    assert!(matches!(
        app.state.orders.submit(app.user_id, input).await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(app.state.cart.list(app.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unsellable_lines_block_submission() {
    let app = setup().await;
    let dish = app.dish("Fish", "40.00").await;
    app.state
        .cart
        .add_item(app.user_id, ItemRef::Dish(dish.id), None)
        .await
        .unwrap();
    app.state
        .catalog
        .set_dish_status(app.admin_id, dish.id, SaleStatus::Stopped)
        .await
        .unwrap();

    assert!(matches!(
        app.state.orders.submit(app.user_id, address()).await,
        Err(AppError::ItemNotSellable(name)) if name == "Fish"
    ));
    // Nothing was written and the cart survives
    assert_eq!(app.state.cart.list(app.user_id).await.unwrap().len(), 1);
    let page = app
        .state
        .orders
        .page(Actor::Staff(app.admin_id), OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn full_delivery_path() {
    let app = setup().await;
    let id = paid(&app).await;
    assert_eq!(status_of(&app, id).await, Status::ToBeConfirmed);

    let confirmed = app
        .state
        .orders
        .transition(
            Actor::Staff(app.admin_id),
            id,
            OrderAction::Confirm {
                estimated_delivery_time: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, Status::Confirmed);
    assert!(confirmed.estimated_delivery_time.is_some());

    assert_eq!(
        staff(&app, id, OrderAction::Deliver).await.unwrap(),
        Status::DeliveryInProgress
    );
    let done = app
        .state
        .orders
        .transition(Actor::Staff(app.admin_id), id, OrderAction::Complete)
        .await
        .unwrap();
    assert_eq!(done.status, Status::Completed);
    assert!(done.delivery_time.is_some());
    assert_eq!(done.pay_status, PayStatus::Paid);
    assert_eq!(done.pay_method, Some(PayMethod::Wechat));
    assert!(done.checkout_time.is_some());
}

#[tokio::test]
async fn rejected_order_cannot_be_completed() {
    let app = setup().await;
    let id = paid(&app).await;

    let rejected = app
        .state
        .orders
        .transition(Actor::Staff(app.admin_id), id, reason("out of stock"))
        .await
        .unwrap();
    assert_eq!(rejected.status, Status::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("out of stock"));
    assert_eq!(rejected.pay_status, PayStatus::Refunded);
    assert_eq!(app.gateway.refunds().len(), 1);
    assert_eq!(app.gateway.refunds()[0].1, money("74.50"));

    match staff(&app, id, OrderAction::Complete).await {
        Err(AppError::InvalidStateTransition { from, action }) => {
            assert_eq!(from, "REJECTED");
            assert_eq!(action, "complete");
        }
        other => panic!("expected InvalidStateTransition, got {other:?}"),
    }
    assert_eq!(status_of(&app, id).await, Status::Rejected);
}

#[tokio::test]
async fn transitions_from_wrong_states_change_nothing() {
    let app = setup().await;
    let (id, number) = submitted(&app).await;

    // PENDING_PAYMENT accepts neither confirm, reject, deliver nor complete
    for action in [
        OrderAction::Confirm {
            estimated_delivery_time: None,
        },
        reason("no"),
        OrderAction::Deliver,
        OrderAction::Complete,
    ] {
        assert!(matches!(
            staff(&app, id, action).await,
            Err(AppError::InvalidStateTransition { .. })
        ));
    }
    assert_eq!(status_of(&app, id).await, Status::PendingPayment);

    // Paying twice
    app.state
        .orders
        .confirm_paid(&number, PayMethod::Alipay)
        .await
        .unwrap();
    assert!(matches!(
        app.state.orders.confirm_paid(&number, PayMethod::Alipay).await,
        Err(AppError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        app.state.orders.request_payment(app.user_id, &number).await,
        Err(AppError::InvalidStateTransition { .. })
    ));
    assert_eq!(status_of(&app, id).await, Status::ToBeConfirmed);
}

#[tokio::test]
async fn customer_cancel_window() {
    let app = setup().await;
    let customer = Actor::Customer(app.user_id);
    let cancel = || OrderAction::Cancel { reason: None };

    // Unpaid: cancelled without refund
    let (unpaid, _) = submitted(&app).await;
    let order = app.state.orders.transition(customer, unpaid, cancel()).await.unwrap();
    assert_eq!(order.status, Status::Cancelled);
    assert_eq!(order.pay_status, PayStatus::Unpaid);
    assert!(order.cancel_time.is_some());
    assert!(app.gateway.refunds().is_empty());

    // Paid, waiting for the shop: cancelled with refund
    let waiting = paid(&app).await;
    let order = app.state.orders.transition(customer, waiting, cancel()).await.unwrap();
    assert_eq!(order.pay_status, PayStatus::Refunded);
    assert_eq!(app.gateway.refunds().len(), 1);

    // Confirmed: too late
    let confirmed = paid(&app).await;
    staff(
        &app,
        confirmed,
        OrderAction::Confirm {
            estimated_delivery_time: None,
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        app.state.orders.transition(customer, confirmed, cancel()).await,
        Err(AppError::CancelWindowClosed)
    ));
    staff(&app, confirmed, OrderAction::Deliver).await.unwrap();
    assert!(matches!(
        app.state.orders.transition(customer, confirmed, cancel()).await,
        Err(AppError::CancelWindowClosed)
    ));

    // Already terminal
    assert!(matches!(
        app.state.orders.transition(customer, unpaid, cancel()).await,
        Err(AppError::InvalidStateTransition { .. })
    ));
}

#[tokio::test]
async fn staff_cancel_needs_a_reason_and_refunds() {
    let app = setup().await;
    let id = paid(&app).await;
    staff(
        &app,
        id,
        OrderAction::Confirm {
            estimated_delivery_time: None,
        },
    )
    .await
    .unwrap();

    assert!(matches!(
        staff(&app, id, OrderAction::Cancel { reason: None }).await,
        Err(AppError::Validation(_))
    ));
    let cancelled = app
        .state
        .orders
        .transition(
            Actor::Staff(app.admin_id),
            id,
            OrderAction::Cancel {
                reason: Some("rider unavailable".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, Status::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("rider unavailable"));
    assert_eq!(app.gateway.refunds().len(), 1);
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let app = setup().await;
    let (id, number) = submitted(&app).await;
    let stranger = Actor::Customer(app.admin_id);

    assert!(matches!(
        app.state.orders.get(stranger, id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        app.state
            .orders
            .transition(stranger, id, OrderAction::Cancel { reason: None })
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        app.state.orders.request_payment(app.admin_id, &number).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        app.state.orders.repetition(app.admin_id, id).await,
        Err(AppError::NotFound(_))
    ));
    // Customers cannot drive staff transitions at all
    assert!(matches!(
        app.state
            .orders
            .transition(Actor::Customer(app.user_id), id, OrderAction::Deliver)
            .await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn concurrent_confirms_have_one_winner() {
    let app = setup().await;
    let id = paid(&app).await;
    let orders = app.state.orders.clone();
    let confirm = || OrderAction::Confirm {
        estimated_delivery_time: None,
    };

    let (first, second) = tokio::join!(
        orders.transition(Actor::Staff(app.admin_id), id, confirm()),
        orders.transition(Actor::Staff(app.admin_id), id, confirm()),
    );

    let wins = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(
        loser,
        Err(AppError::InvalidStateTransition { .. })
    ));
    assert_eq!(status_of(&app, id).await, Status::Confirmed);
}

#[tokio::test]
async fn repetition_refills_the_cart() {
    let app = setup().await;
    let (id, _) = submitted(&app).await;

    // The chicken line is already in the cart once
    let chicken = app.state.catalog.list_dishes(None).await.unwrap()[0].clone();
    app.state
        .cart
        .add_item(app.user_id, ItemRef::Dish(chicken.id), None)
        .await
        .unwrap();

    let copied = app.state.orders.repetition(app.user_id, id).await.unwrap();
    assert_eq!(copied, 2);

    let lines = app.state.cart.list(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].dish_id, Some(chicken.id));
    assert_eq!(lines[0].number, 3);
    assert_eq!(lines[1].dish_flavor.as_deref(), Some("mild"));
    assert_eq!(lines[1].number, 1);
}

#[tokio::test]
async fn search_and_statistics() {
    let app = setup().await;
    let waiting = paid(&app).await;
    let (pending, number) = submitted(&app).await;

    let page = app
        .state
        .orders
        .page(
            Actor::Staff(app.admin_id),
            OrderQuery {
                status: Some(Status::ToBeConfirmed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].order.id, waiting);
    assert_eq!(page.records[0].details.len(), 2);

    let page = app
        .state
        .orders
        .page(
            Actor::Staff(app.admin_id),
            OrderQuery {
                number: Some(number),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].order.id, pending);

    let history = app
        .state
        .orders
        .page(Actor::Customer(app.admin_id), OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(history.total, 0);

    let stats = app.state.orders.statistics().await.unwrap();
    assert_eq!(stats.to_be_confirmed, 1);
    assert_eq!(stats.confirmed, 0);
    assert_eq!(stats.delivery_in_progress, 0);
}

/// Provider whose refunds always fail.
struct BrokenRefunds;

#[async_trait]
impl PaymentGateway for BrokenRefunds {
    async fn request_payment(
        &self,
        order_number: &str,
        amount: Decimal,
    ) -> Result<PaymentVoucher, PaymentError> {
        Ok(PaymentVoucher {
            order_number: order_number.to_owned(),
            amount,
            nonce: "n".into(),
            issued_at: "0".into(),
        })
    }

    async fn refund(&self, _: &str, _: Decimal) -> Result<(), PaymentError> {
        Err(PaymentError::Rejected("account closed".into()))
    }
}

/// Provider that never answers.
struct Hanging;

#[async_trait]
impl PaymentGateway for Hanging {
    async fn request_payment(&self, _: &str, _: Decimal) -> Result<PaymentVoucher, PaymentError> {
        std::future::pending().await
    }

    async fn refund(&self, _: &str, _: Decimal) -> Result<(), PaymentError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn failed_refund_rolls_the_transition_back() {
    let app = setup_with_gateway(Arc::new(BrokenRefunds)).await;
    let id = paid(&app).await;

    assert!(matches!(
        staff(&app, id, reason("out of stock")).await,
        Err(AppError::PaymentFailure(PaymentError::Rejected(_)))
    ));
    let view = app
        .state
        .orders
        .get(Actor::Staff(app.admin_id), id)
        .await
        .unwrap();
    assert_eq!(view.order.status, Status::ToBeConfirmed);
    assert_eq!(view.order.pay_status, PayStatus::Paid);
    assert_eq!(view.order.rejection_reason, None);
}

#[tokio::test]
async fn payment_timeout_is_retryable_and_moves_nothing() {
    let app = setup_with_gateway(Arc::new(Hanging)).await;
    let (id, number) = submitted(&app).await;

    let err = app
        .state
        .orders
        .request_payment(app.user_id, &number)
        .await
        .unwrap_err();
    match err {
        AppError::PaymentFailure(cause) => assert!(cause.is_retryable()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(status_of(&app, id).await, Status::PendingPayment);
}
