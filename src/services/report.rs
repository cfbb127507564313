use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::entities::{
    order::{self, Status},
    order_detail, user,
};
use crate::error::{AppError, AppResult};

const MAX_RANGE_DAYS: usize = 366;

/// Inclusive calendar range, `?begin=2024-01-01&end=2024-01-31`.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DateRange {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
        Self { begin, end }
    }

    /// Every day in the range, oldest first.
    fn days(&self) -> AppResult<Vec<NaiveDate>> {
        if self.begin > self.end {
            return Err(AppError::Validation(format!(
                "begin {} is after end {}",
                self.begin, self.end
            )));
        }
        let days: Vec<NaiveDate> = self
            .begin
            .iter_days()
            .take_while(|day| *day <= self.end)
            .take(MAX_RANGE_DAYS + 1)
            .collect();
        if days.len() > MAX_RANGE_DAYS {
            return Err(AppError::Validation(format!(
                "range is limited to {MAX_RANGE_DAYS} days"
            )));
        }
        Ok(days)
    }

    fn start(&self) -> NaiveDateTime {
        self.begin.and_time(NaiveTime::MIN)
    }

    /// First instant after the range.
    fn stop(&self) -> NaiveDateTime {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TurnoverReport {
    pub dates: Vec<NaiveDate>,
    pub turnover: Vec<Decimal>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserReport {
    pub dates: Vec<NaiveDate>,
    pub total_users: Vec<u64>,
    pub new_users: Vec<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderReport {
    pub dates: Vec<NaiveDate>,
    pub order_counts: Vec<u64>,
    pub valid_order_counts: Vec<u64>,
    pub total_order_count: u64,
    pub valid_order_count: u64,
    pub order_completion_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SalesEntry {
    pub name: String,
    pub number: i64,
}

/// Read-only aggregation over placed orders and registered users. Days are
/// local calendar days of `order_time` / `created_at`.
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn turnover_by_day(&self, range: DateRange) -> AppResult<TurnoverReport> {
        let dates = range.days()?;
        let mut per_day: HashMap<NaiveDate, Decimal> = HashMap::new();
        for order in self.orders_in(range, Some(Status::Completed)).await? {
            *per_day.entry(order.order_time.date()).or_default() += order.amount;
        }

        let turnover = dates
            .iter()
            .map(|day| per_day.get(day).copied().unwrap_or_default())
            .collect();
        Ok(TurnoverReport { dates, turnover })
    }

    pub async fn user_growth(&self, range: DateRange) -> AppResult<UserReport> {
        let dates = range.days()?;
        let before = user::Entity::find()
            .filter(user::Column::CreatedAt.lt(range.start()))
            .count(&*self.db)
            .await?;

        let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
        for created_at in user::Entity::find()
            .select_only()
            .column(user::Column::CreatedAt)
            .filter(user::Column::CreatedAt.gte(range.start()))
            .filter(user::Column::CreatedAt.lt(range.stop()))
            .into_tuple::<NaiveDateTime>()
            .all(&*self.db)
            .await?
        {
            *per_day.entry(created_at.date()).or_default() += 1;
        }

        let new_users: Vec<u64> = dates
            .iter()
            .map(|day| per_day.get(day).copied().unwrap_or(0))
            .collect();
        let total_users = new_users
            .iter()
            .scan(before, |running, added| {
                *running += added;
                Some(*running)
            })
            .collect();
        Ok(UserReport {
            dates,
            total_users,
            new_users,
        })
    }

    pub async fn order_stats(&self, range: DateRange) -> AppResult<OrderReport> {
        let dates = range.days()?;
        let mut per_day: HashMap<NaiveDate, (u64, u64)> = HashMap::new();
        for order in self.orders_in(range, None).await? {
            let counts = per_day.entry(order.order_time.date()).or_default();
            counts.0 += 1;
            if order.status == Status::Completed {
                counts.1 += 1;
            }
        }

        let (order_counts, valid_order_counts): (Vec<u64>, Vec<u64>) = dates
            .iter()
            .map(|day| per_day.get(day).copied().unwrap_or_default())
            .unzip();
        let total_order_count: u64 = order_counts.iter().sum();
        let valid_order_count: u64 = valid_order_counts.iter().sum();

        Ok(OrderReport {
            dates,
            order_counts,
            valid_order_counts,
            total_order_count,
            valid_order_count,
            order_completion_rate: completion_rate(valid_order_count, total_order_count),
        })
    }

    /// Best sellers by quantity among completed orders, at most ten.
    pub async fn top10_sales(&self, range: DateRange) -> AppResult<Vec<SalesEntry>> {
        range.days()?;
        let lines: Vec<(String, i32)> = order_detail::Entity::find()
            .select_only()
            .column(order_detail::Column::Name)
            .column(order_detail::Column::Number)
            .inner_join(order::Entity)
            .filter(order::Column::Status.eq(Status::Completed))
            .filter(order::Column::OrderTime.gte(range.start()))
            .filter(order::Column::OrderTime.lt(range.stop()))
            .into_tuple()
            .all(&*self.db)
            .await?;

        let mut totals: HashMap<String, i64> = HashMap::new();
        for (name, number) in lines {
            *totals.entry(name).or_default() += i64::from(number);
        }
        Ok(rank(totals))
    }

    async fn orders_in(
        &self,
        range: DateRange,
        status: Option<Status>,
    ) -> AppResult<Vec<order::Model>> {
        let mut query = order::Entity::find()
            .filter(order::Column::OrderTime.gte(range.start()))
            .filter(order::Column::OrderTime.lt(range.stop()));
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let orders = query.all(&*self.db).await?;
        debug!(begin = %range.begin, end = %range.end, orders = orders.len(), "report scan");
        Ok(orders)
    }
}

fn completion_rate(valid: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    valid as f64 / total as f64
}

fn rank(totals: HashMap<String, i64>) -> Vec<SalesEntry> {
    let mut ranked: Vec<SalesEntry> = totals
        .into_iter()
        .map(|(name, number)| SalesEntry { name, number })
        .collect();
    ranked.sort_by(|a, b| b.number.cmp(&a.number).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(10);
    ranked
}
