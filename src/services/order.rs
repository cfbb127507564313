//! Order lifecycle: cart → order conversion and the status state machine.
//!
//! ```text
//! PENDING_PAYMENT --pay--> TO_BE_CONFIRMED --confirm--> CONFIRMED --deliver--> DELIVERY_IN_PROGRESS --complete--> COMPLETED
//!                                 |
//!                                 +--reject--> REJECTED
//! any non-terminal --cancel--> CANCELLED   (customers: PENDING_PAYMENT / TO_BE_CONFIRMED only)
//! ```
//!
//! Every transition is written as `UPDATE orders SET .. WHERE id = ? AND
//! status IN (<allowed sources>)`. When the update touches no row another
//! request got there first and the caller sees `InvalidStateTransition`.

use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{error, info, warn};
use validator::Validate;

use crate::entities::{
    dish::SaleStatus,
    order::{self, PayMethod, PayStatus, Status},
    order_detail,
};
use crate::error::{AppError, AppResult};
use crate::services::cart::{clear_lines, lines_of, merge_line, CartService, LineSnapshot};
use crate::services::catalog::{resolve_item, ItemRef};
use crate::services::payment::{with_timeout, PaymentGateway, PaymentVoucher};

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("phone pattern is valid"));

static ORDER_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Order numbers are the placement time to the millisecond followed by a
/// four digit process-wide sequence.
pub fn next_order_number() -> String {
    let sequence = ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("{}{:04}", Local::now().format("%Y%m%d%H%M%S%3f"), sequence)
}

/// Who is asking. Resolved by the auth middleware and passed explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    Customer(i32),
    Staff(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Pay,
    Confirm,
    Reject,
    CancelByStaff,
    CancelByCustomer,
    Deliver,
    Complete,
}

impl Transition {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pay => "pay",
            Self::Confirm => "confirm",
            Self::Reject => "reject",
            Self::CancelByStaff | Self::CancelByCustomer => "cancel",
            Self::Deliver => "deliver",
            Self::Complete => "complete",
        }
    }

    pub fn allowed_from(self) -> &'static [Status] {
        match self {
            Self::Pay => &[Status::PendingPayment],
            Self::Confirm | Self::Reject => &[Status::ToBeConfirmed],
            Self::CancelByStaff => &Status::NON_TERMINAL,
            Self::CancelByCustomer => &[Status::PendingPayment, Status::ToBeConfirmed],
            Self::Deliver => &[Status::Confirmed],
            Self::Complete => &[Status::DeliveryInProgress],
        }
    }

    pub fn target(self) -> Status {
        match self {
            Self::Pay => Status::ToBeConfirmed,
            Self::Confirm => Status::Confirmed,
            Self::Reject => Status::Rejected,
            Self::CancelByStaff | Self::CancelByCustomer => Status::Cancelled,
            Self::Deliver => Status::DeliveryInProgress,
            Self::Complete => Status::Completed,
        }
    }

    /// Whether the customer gets their money back when this transition hits a
    /// paid order.
    fn refunds(self) -> bool {
        matches!(
            self,
            Self::Reject | Self::CancelByStaff | Self::CancelByCustomer
        )
    }

    pub fn check(self, from: Status) -> AppResult<()> {
        if self.allowed_from().contains(&from) {
            return Ok(());
        }
        if self == Self::CancelByCustomer && !from.is_terminal() {
            return Err(AppError::CancelWindowClosed);
        }
        Err(self.rejected_from(from))
    }

    fn rejected_from(self, from: Status) -> AppError {
        AppError::InvalidStateTransition {
            from: from.to_string(),
            action: self.name(),
        }
    }
}

/// What a caller wants done to an existing order.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderAction {
    Confirm {
        estimated_delivery_time: Option<NaiveDateTime>,
    },
    Reject {
        reason: String,
    },
    Cancel {
        reason: Option<String>,
    },
    Deliver,
    Complete,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SubmitOrder {
    #[validate(length(min = 1, max = 32))]
    pub consignee: String,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    #[validate(length(max = 100))]
    pub remark: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderSubmission {
    pub id: i32,
    pub number: String,
    pub amount: Decimal,
    pub order_time: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub details: Vec<order_detail::Model>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<Status>,
    pub number: Option<String>,
    pub phone: Option<String>,
    pub begin_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PageResult<T> {
    pub total: u64,
    pub records: Vec<T>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct OrderStatistics {
    pub to_be_confirmed: u64,
    pub confirmed: u64,
    pub delivery_in_progress: u64,
}

pub struct OrderService {
    db: Arc<DatabaseConnection>,
    cart: Arc<CartService>,
    gateway: Arc<dyn PaymentGateway>,
    delivery_fee: Decimal,
    delivery_eta: chrono::Duration,
    payment_timeout: Duration,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cart: Arc<CartService>,
        gateway: Arc<dyn PaymentGateway>,
        config: &crate::config::Config,
    ) -> Self {
        Self {
            db,
            cart,
            gateway,
            delivery_fee: config.delivery_fee,
            delivery_eta: config.delivery_eta,
            payment_timeout: config.payment_timeout,
        }
    }

    /// Turns the user's cart into a new order and empties the cart, all in
    /// one transaction.
    pub async fn submit(&self, user_id: i32, input: SubmitOrder) -> AppResult<OrderSubmission> {
        input.validate()?;
        let _guard = self.cart.lock(user_id).await;

        let txn = self.db.begin().await?;
        let lines = lines_of(&txn, user_id).await?;
        if lines.is_empty() {
            return Err(AppError::Validation("cart is empty".into()));
        }

        let mut subtotal = Decimal::ZERO;
        for line in &lines {
            let item = ItemRef::from_ids(line.dish_id, line.setmeal_id)?;
            match resolve_item(&txn, item).await {
                Ok(current) if current.status == SaleStatus::Sellable => {}
                Ok(_) | Err(AppError::NotFound(_)) => {
                    return Err(AppError::ItemNotSellable(line.name.clone()))
                }
                Err(err) => return Err(err),
            }
            subtotal += line.amount * Decimal::from(line.number);
        }

        let now = Local::now().naive_local();
        let order = order::ActiveModel {
            number: Set(next_order_number()),
            status: Set(Status::PendingPayment),
            user_id: Set(user_id),
            pay_status: Set(PayStatus::Unpaid),
            pay_method: Set(None),
            amount: Set(subtotal + self.delivery_fee),
            delivery_fee: Set(self.delivery_fee),
            consignee: Set(input.consignee),
            phone: Set(input.phone),
            address: Set(input.address),
            remark: Set(input.remark),
            order_time: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let details = lines.into_iter().map(|line| order_detail::ActiveModel {
            order_id: Set(order.id),
            dish_id: Set(line.dish_id),
            setmeal_id: Set(line.setmeal_id),
            dish_flavor: Set(line.dish_flavor),
            name: Set(line.name),
            image: Set(line.image),
            amount: Set(line.amount),
            number: Set(line.number),
            ..Default::default()
        });
        order_detail::Entity::insert_many(details).exec(&txn).await?;
        clear_lines(&txn, user_id).await?;
        txn.commit().await?;

        info!(order_id = order.id, number = %order.number, amount = %order.amount, user_id, "order submitted");
        Ok(OrderSubmission {
            id: order.id,
            number: order.number,
            amount: order.amount,
            order_time: order.order_time,
        })
    }

    /// Asks the gateway for a payment voucher. Nothing about the order
    /// changes until the gateway confirms through [`Self::confirm_paid`].
    pub async fn request_payment(
        &self,
        user_id: i32,
        order_number: &str,
    ) -> AppResult<PaymentVoucher> {
        let order = order::Entity::find()
            .filter(order::Column::Number.eq(order_number))
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_number}")))?;
        Transition::Pay.check(order.status)?;

        let voucher = with_timeout(
            self.payment_timeout,
            self.gateway.request_payment(&order.number, order.amount),
        )
        .await
        .inspect_err(|err| warn!(order_number, error = %err, "payment request failed"))?;
        Ok(voucher)
    }

    /// Gateway callback: the order identified by `order_number` has been paid.
    pub async fn confirm_paid(
        &self,
        order_number: &str,
        method: PayMethod,
    ) -> AppResult<order::Model> {
        let order = order::Entity::find()
            .filter(order::Column::Number.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_number}")))?;

        let changes = order::ActiveModel {
            pay_status: Set(PayStatus::Paid),
            pay_method: Set(Some(method)),
            checkout_time: Set(Some(Local::now().naive_local())),
            ..Default::default()
        };
        self.apply(order, Transition::Pay, changes).await
    }

    /// Single entry point for status changes requested by a person.
    pub async fn transition(
        &self,
        actor: Actor,
        order_id: i32,
        action: OrderAction,
    ) -> AppResult<order::Model> {
        let now = Local::now().naive_local();
        let (transition, changes) = match (actor, action) {
            (Actor::Customer(_), OrderAction::Cancel { reason }) => (
                Transition::CancelByCustomer,
                order::ActiveModel {
                    cancel_reason: Set(Some(
                        reason.unwrap_or_else(|| "Cancelled by customer".into()),
                    )),
                    cancel_time: Set(Some(now)),
                    ..Default::default()
                },
            ),
            (Actor::Customer(_), _) => return Err(AppError::Unauthorized),
            (Actor::Staff(_), OrderAction::Confirm { estimated_delivery_time }) => (
                Transition::Confirm,
                order::ActiveModel {
                    estimated_delivery_time: Set(Some(
                        estimated_delivery_time.unwrap_or(now + self.delivery_eta),
                    )),
                    ..Default::default()
                },
            ),
            (Actor::Staff(_), OrderAction::Reject { reason }) => (
                Transition::Reject,
                order::ActiveModel {
                    rejection_reason: Set(Some(required_reason(reason)?)),
                    cancel_time: Set(Some(now)),
                    ..Default::default()
                },
            ),
            (Actor::Staff(_), OrderAction::Cancel { reason }) => (
                Transition::CancelByStaff,
                order::ActiveModel {
                    cancel_reason: Set(Some(required_reason(reason.unwrap_or_default())?)),
                    cancel_time: Set(Some(now)),
                    ..Default::default()
                },
            ),
            (Actor::Staff(_), OrderAction::Deliver) => {
                (Transition::Deliver, <order::ActiveModel as Default>::default())
            }
            (Actor::Staff(_), OrderAction::Complete) => (
                Transition::Complete,
                order::ActiveModel {
                    delivery_time: Set(Some(now)),
                    ..Default::default()
                },
            ),
        };

        let order = self.find_scoped(actor, order_id).await?;
        self.apply(order, transition, changes).await
    }

    /// Writes one transition. `changes` carries the status-dependent columns;
    /// status and pay status are filled in here.
    async fn apply(
        &self,
        order: order::Model,
        transition: Transition,
        mut changes: order::ActiveModel,
    ) -> AppResult<order::Model> {
        transition.check(order.status)?;

        let refund = transition.refunds() && order.pay_status == PayStatus::Paid;
        changes.status = Set(transition.target());
        if refund {
            changes.pay_status = Set(PayStatus::Refunded);
        }

        let txn = self.db.begin().await?;
        let written = order::Entity::update_many()
            .set(changes)
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.is_in(transition.allowed_from().to_vec()))
            .exec(&txn)
            .await?;

        if written.rows_affected == 0 {
            txn.rollback().await?;
            let current = self.find(order.id).await?;
            warn!(order_id = order.id, action = transition.name(), current = %current.status, "lost transition race");
            return Err(transition.rejected_from(current.status));
        }

        // The refund runs while the status write is uncommitted, so a failed
        // refund leaves the order untouched. Other writers wait on the SQLite
        // write lock for up to `payment_timeout` meanwhile.
        if refund {
            with_timeout(
                self.payment_timeout,
                self.gateway.refund(&order.number, order.amount),
            )
            .await
            .inspect_err(|err| warn!(order_id = order.id, error = %err, "refund failed, transition rolled back"))?;
        }
        if let Err(err) = txn.commit().await {
            if refund {
                error!(
                    order_id = order.id,
                    number = %order.number,
                    amount = %order.amount,
                    error = %err,
                    "refund issued but status write lost; refund outstanding"
                );
            }
            return Err(err.into());
        }

        info!(
            order_id = order.id,
            from = %order.status,
            to = %transition.target(),
            refunded = refund,
            "order transition"
        );
        self.find(order.id).await
    }

    /// Copies every line of a past order back into the user's cart. Items are
    /// re-added whatever their current availability.
    pub async fn repetition(&self, user_id: i32, order_id: i32) -> AppResult<usize> {
        let order = self.find_scoped(Actor::Customer(user_id), order_id).await?;
        let details = self.details_of(order.id).await?;

        let _guard = self.cart.lock(user_id).await;
        let txn = self.db.begin().await?;
        for detail in &details {
            let item = ItemRef::from_ids(detail.dish_id, detail.setmeal_id)?;
            let snapshot = LineSnapshot {
                name: detail.name.clone(),
                image: detail.image.clone(),
                amount: detail.amount,
            };
            merge_line(
                &txn,
                user_id,
                item,
                detail.dish_flavor.as_deref(),
                detail.number,
                std::future::ready(Ok(snapshot)),
            )
            .await?;
        }
        txn.commit().await?;

        info!(user_id, order_id, lines = details.len(), "order copied to cart");
        Ok(details.len())
    }

    pub async fn get(&self, actor: Actor, order_id: i32) -> AppResult<OrderView> {
        let order = self.find_scoped(actor, order_id).await?;
        let details = self.details_of(order.id).await?;
        Ok(OrderView { order, details })
    }

    /// Staff search over all orders, or a customer's own history.
    pub async fn page(&self, actor: Actor, query: OrderQuery) -> AppResult<PageResult<OrderView>> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(10).clamp(1, 100);

        let mut condition = Condition::all();
        if let Actor::Customer(user_id) = actor {
            condition = condition.add(order::Column::UserId.eq(user_id));
        }
        if let Some(status) = query.status {
            condition = condition.add(order::Column::Status.eq(status));
        }
        if let Some(number) = query.number.filter(|n| !n.is_empty()) {
            condition = condition.add(order::Column::Number.contains(number));
        }
        if let Some(phone) = query.phone.filter(|p| !p.is_empty()) {
            condition = condition.add(order::Column::Phone.contains(phone));
        }
        if let Some(begin) = query.begin_time {
            condition = condition.add(order::Column::OrderTime.gte(begin));
        }
        if let Some(end) = query.end_time {
            condition = condition.add(order::Column::OrderTime.lte(end));
        }

        let paginator = order::Entity::find()
            .filter(condition)
            .order_by_desc(order::Column::OrderTime)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        let mut details: HashMap<i32, Vec<order_detail::Model>> = HashMap::new();
        for detail in order_detail::Entity::find()
            .filter(order_detail::Column::OrderId.is_in(ids))
            .order_by_asc(order_detail::Column::Id)
            .all(&*self.db)
            .await?
        {
            details.entry(detail.order_id).or_default().push(detail);
        }

        let records = orders
            .into_iter()
            .map(|order| OrderView {
                details: details.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect();
        Ok(PageResult { total, records })
    }

    /// Orders waiting on staff, per status.
    pub async fn statistics(&self) -> AppResult<OrderStatistics> {
        let count = |status: Status| {
            order::Entity::find()
                .filter(order::Column::Status.eq(status))
                .count(&*self.db)
        };
        Ok(OrderStatistics {
            to_be_confirmed: count(Status::ToBeConfirmed).await?,
            confirmed: count(Status::Confirmed).await?,
            delivery_in_progress: count(Status::DeliveryInProgress).await?,
        })
    }

    async fn find(&self, order_id: i32) -> AppResult<order::Model> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))
    }

    /// Customers only ever see their own orders; anything else is reported as
    /// missing.
    async fn find_scoped(&self, actor: Actor, order_id: i32) -> AppResult<order::Model> {
        let order = self.find(order_id).await?;
        match actor {
            Actor::Customer(user_id) if order.user_id != user_id => {
                Err(AppError::not_found(format!("Order {order_id}")))
            }
            _ => Ok(order),
        }
    }

    async fn details_of(&self, order_id: i32) -> AppResult<Vec<order_detail::Model>> {
        Ok(order_detail::Entity::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .order_by_asc(order_detail::Column::Id)
            .all(&*self.db)
            .await?)
    }
}

fn required_reason(reason: String) -> AppResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("a reason is required".into()));
    }
    Ok(reason.to_owned())
}
