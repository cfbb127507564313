use chrono::Local;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::entities::cart;
use crate::error::{AppError, AppResult};
use crate::services::catalog::{resolve_item, ItemRef};

/// Wire form of a cart mutation.
#[derive(Clone, Debug, Deserialize)]
pub struct CartItemPayload {
    pub dish_id: Option<i32>,
    pub setmeal_id: Option<i32>,
    pub dish_flavor: Option<String>,
}

impl CartItemPayload {
    pub fn item(&self) -> AppResult<ItemRef> {
        ItemRef::from_ids(self.dish_id, self.setmeal_id)
    }
}

/// Name, image and unit price written into a new cart line.
#[derive(Clone, Debug)]
pub struct LineSnapshot {
    pub name: String,
    pub image: String,
    pub amount: Decimal,
}

fn normalize_flavor(flavor: Option<&str>) -> Option<String> {
    flavor
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
}

fn line_filter(user_id: i32, item: ItemRef, flavor: Option<&str>) -> Condition {
    let condition = Condition::all().add(cart::Column::UserId.eq(user_id));
    let condition = match item {
        ItemRef::Dish(id) => condition
            .add(cart::Column::DishId.eq(id))
            .add(cart::Column::SetmealId.is_null()),
        ItemRef::Setmeal(id) => condition
            .add(cart::Column::SetmealId.eq(id))
            .add(cart::Column::DishId.is_null()),
    };
    match flavor {
        Some(flavor) => condition.add(cart::Column::DishFlavor.eq(flavor)),
        None => condition.add(cart::Column::DishFlavor.is_null()),
    }
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    item: ItemRef,
    flavor: Option<&str>,
) -> AppResult<Option<cart::Model>> {
    Ok(cart::Entity::find()
        .filter(line_filter(user_id, item, flavor))
        .one(conn)
        .await?)
}

/// Adds `count` units of an item, merging into the user's existing line for
/// the same item and flavor. `snapshot` is only consulted when a new line has
/// to be created.
pub(crate) async fn merge_line<C, F>(
    conn: &C,
    user_id: i32,
    item: ItemRef,
    flavor: Option<&str>,
    count: i32,
    snapshot: F,
) -> AppResult<cart::Model>
where
    C: ConnectionTrait,
    F: std::future::Future<Output = AppResult<LineSnapshot>>,
{
    if let Some(line) = find_line(conn, user_id, item, flavor).await? {
        let number = line.number + count;
        let mut line: cart::ActiveModel = line.into();
        line.number = Set(number);
        return Ok(line.update(conn).await?);
    }

    let snapshot = snapshot.await?;
    let line = cart::ActiveModel {
        user_id: Set(user_id),
        dish_id: Set(item.dish_id()),
        setmeal_id: Set(item.setmeal_id()),
        dish_flavor: Set(flavor.map(str::to_owned)),
        name: Set(snapshot.name),
        image: Set(snapshot.image),
        amount: Set(snapshot.amount),
        number: Set(count),
        create_time: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(line)
}

pub(crate) async fn lines_of<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> AppResult<Vec<cart::Model>> {
    Ok(cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .order_by_asc(cart::Column::Id)
        .all(conn)
        .await?)
}

pub(crate) async fn clear_lines<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<u64> {
    let result = cart::Entity::delete_many()
        .filter(cart::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Exclusive hold on one user's cart. The user's entry leaves the lock table
/// once the last holder or waiter is gone.
pub struct CartLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<i32, Arc<Mutex<()>>>,
    user_id: i32,
}

impl Drop for CartLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Per-user shopping carts. Every mutation of one user's cart runs under that
/// user's lock.
pub struct CartService {
    db: Arc<DatabaseConnection>,
    locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            locks: DashMap::new(),
        }
    }

    /// Holds the cart of `user_id` until the guard is dropped.
    pub async fn lock(&self, user_id: i32) -> CartLock<'_> {
        let lock = self.locks.entry(user_id).or_default().clone();
        CartLock {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            user_id,
        }
    }

    /// Adds one unit. Sellability is not checked here; submission does that.
    pub async fn add_item(
        &self,
        user_id: i32,
        item: ItemRef,
        flavor: Option<&str>,
    ) -> AppResult<cart::Model> {
        let flavor = normalize_flavor(flavor);
        let _guard = self.lock(user_id).await;

        let txn = self.db.begin().await?;
        let line = merge_line(&txn, user_id, item, flavor.as_deref(), 1, async {
            let current = resolve_item(&txn, item).await?;
            Ok::<_, AppError>(LineSnapshot {
                name: current.name,
                image: current.image,
                amount: current.price,
            })
        })
        .await?;
        txn.commit().await?;

        debug!(user_id, %item, number = line.number, "cart item added");
        Ok(line)
    }

    /// Removes one unit; the line disappears when it reaches zero. Returns the
    /// remaining line, if any. A missing line is not an error.
    pub async fn remove_one_unit(
        &self,
        user_id: i32,
        item: ItemRef,
        flavor: Option<&str>,
    ) -> AppResult<Option<cart::Model>> {
        let flavor = normalize_flavor(flavor);
        let _guard = self.lock(user_id).await;

        let txn = self.db.begin().await?;
        let Some(line) = find_line(&txn, user_id, item, flavor.as_deref()).await? else {
            return Ok(None);
        };

        let remaining = if line.number <= 1 {
            cart::Entity::delete_by_id(line.id).exec(&txn).await?;
            None
        } else {
            let number = line.number - 1;
            let mut line: cart::ActiveModel = line.into();
            line.number = Set(number);
            Some(line.update(&txn).await?)
        };
        txn.commit().await?;

        debug!(user_id, %item, "cart item removed");
        Ok(remaining)
    }

    pub async fn list(&self, user_id: i32) -> AppResult<Vec<cart::Model>> {
        lines_of(&*self.db, user_id).await
    }

    pub async fn clear(&self, user_id: i32) -> AppResult<()> {
        let _guard = self.lock(user_id).await;
        let removed = clear_lines(&*self.db, user_id).await?;
        debug!(user_id, removed, "cart cleared");
        Ok(())
    }
}
