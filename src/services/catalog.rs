//! Catalog availability: which dishes and setmeals can be sold, and the rules
//! tying a setmeal's availability to the dishes it is made of.
//!
//! * A setmeal may only be switched on while every linked dish is sellable.
//! * Stopping a dish stops every setmeal linking it, in the same transaction.
//!   Switching the dish back on leaves those setmeals stopped.
//! * A dish cannot be deleted while on sale or while any setmeal links it.
//! * A setmeal cannot be deleted while on sale.
//!
//! A dish owns its flavor choices; they are written and removed together
//! with the dish.

use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};
use tracing::info;
use validator::Validate;

use crate::entities::{
    category,
    dish::{self, SaleStatus},
    dish_flavor, setmeal, setmeal_dish,
};
use crate::error::{AppError, AppResult};
use crate::services::audit::{stamp, OperationKind};
use crate::services::cache::CatalogCache;
use crate::services::order::PageResult;

/// Reference to something a customer can put in a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    Dish(i32),
    Setmeal(i32),
}

impl ItemRef {
    /// Builds a reference from the loose `dish_id` / `setmeal_id` pair used on
    /// the wire and in storage. Exactly one must be present.
    pub fn from_ids(dish_id: Option<i32>, setmeal_id: Option<i32>) -> AppResult<Self> {
        match (dish_id, setmeal_id) {
            (Some(id), None) => Ok(Self::Dish(id)),
            (None, Some(id)) => Ok(Self::Setmeal(id)),
            _ => Err(AppError::Validation(
                "exactly one of dish_id and setmeal_id must be given".into(),
            )),
        }
    }

    pub fn dish_id(self) -> Option<i32> {
        match self {
            Self::Dish(id) => Some(id),
            Self::Setmeal(_) => None,
        }
    }

    pub fn setmeal_id(self) -> Option<i32> {
        match self {
            Self::Dish(_) => None,
            Self::Setmeal(id) => Some(id),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dish(id) => write!(f, "dish {id}"),
            Self::Setmeal(id) => write!(f, "setmeal {id}"),
        }
    }
}

/// Current catalog view of an item.
#[derive(Clone, Debug)]
pub struct ItemSnapshot {
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub status: SaleStatus,
}

pub async fn resolve_item<C: ConnectionTrait>(conn: &C, item: ItemRef) -> AppResult<ItemSnapshot> {
    match item {
        ItemRef::Dish(id) => {
            let dish = find_dish(conn, id).await?;
            Ok(ItemSnapshot {
                name: dish.name,
                image: dish.image,
                price: dish.price,
                status: dish.status,
            })
        }
        ItemRef::Setmeal(id) => {
            let setmeal = find_setmeal(conn, id).await?;
            Ok(ItemSnapshot {
                name: setmeal.name,
                image: setmeal.image,
                price: setmeal.price,
                status: setmeal.status,
            })
        }
    }
}

pub async fn is_sellable<C: ConnectionTrait>(conn: &C, item: ItemRef) -> AppResult<bool> {
    Ok(resolve_item(conn, item).await?.status == SaleStatus::Sellable)
}

async fn find_dish<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<dish::Model> {
    dish::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Dish {id}")))
}

async fn find_setmeal<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<setmeal::Model> {
    setmeal::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Setmeal {id}")))
}

async fn setmeal_ids_linking<C: ConnectionTrait>(conn: &C, dish_id: i32) -> AppResult<Vec<i32>> {
    Ok(setmeal_dish::Entity::find()
        .select_only()
        .column(setmeal_dish::Column::SetmealId)
        .filter(setmeal_dish::Column::DishId.eq(dish_id))
        .distinct()
        .into_tuple::<i32>()
        .all(conn)
        .await?)
}

pub async fn can_enable_setmeal<C: ConnectionTrait>(conn: &C, setmeal_id: i32) -> AppResult<()> {
    find_setmeal(conn, setmeal_id).await?;

    let dish_ids: Vec<i32> = setmeal_dish::Entity::find()
        .select_only()
        .column(setmeal_dish::Column::DishId)
        .filter(setmeal_dish::Column::SetmealId.eq(setmeal_id))
        .into_tuple::<i32>()
        .all(conn)
        .await?;

    let stopped = dish::Entity::find()
        .filter(dish::Column::Id.is_in(dish_ids))
        .filter(dish::Column::Status.eq(SaleStatus::Stopped))
        .count(conn)
        .await?;

    if stopped > 0 {
        return Err(AppError::IncompleteComposition(setmeal_id));
    }
    Ok(())
}

/// Returns the dish when it may be deleted.
pub async fn can_delete_dish<C: ConnectionTrait>(conn: &C, dish_id: i32) -> AppResult<dish::Model> {
    let dish = find_dish(conn, dish_id).await?;
    if dish.status == SaleStatus::Sellable {
        return Err(AppError::ItemOnSale(format!("Dish {}", dish.name)));
    }

    let links = setmeal_dish::Entity::find()
        .filter(setmeal_dish::Column::DishId.eq(dish_id))
        .count(conn)
        .await?;
    if links > 0 {
        return Err(AppError::ReferencedByCombo(dish_id));
    }
    Ok(dish)
}

pub async fn can_delete_setmeals<C: ConnectionTrait>(conn: &C, ids: &[i32]) -> AppResult<()> {
    for &id in ids {
        let setmeal = find_setmeal(conn, id).await?;
        if setmeal.status == SaleStatus::Sellable {
            return Err(AppError::ItemOnSale(format!("Setmeal {}", setmeal.name)));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    pub kind: category::Kind,
    #[serde(default)]
    pub sort: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DishInput {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    pub category_id: i32,
    pub price: Decimal,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    /// Only honoured on creation; use the status operation afterwards.
    pub status: Option<SaleStatus>,
    /// Replaces the dish's flavor choices on every write.
    #[validate(nested)]
    #[serde(default)]
    pub flavors: Vec<FlavorInput>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct FlavorInput {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(length(min = 1))]
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlavorView {
    pub name: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DishView {
    #[serde(flatten)]
    pub dish: dish::Model,
    pub flavors: Vec<FlavorView>,
}

/// Staff search over the catalog; every filter is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub status: Option<SaleStatus>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl CatalogQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(10).clamp(1, 100)
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct SetmealDishInput {
    pub dish_id: i32,
    #[validate(range(min = 1))]
    pub copies: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SetmealInput {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    pub category_id: i32,
    pub price: Decimal,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1), nested)]
    pub dishes: Vec<SetmealDishInput>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SetmealDishView {
    pub dish_id: i32,
    pub name: String,
    pub image: String,
    pub copies: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SetmealView {
    #[serde(flatten)]
    pub setmeal: setmeal::Model,
    pub dishes: Vec<SetmealDishView>,
}

fn check_price(price: Decimal) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation("price must be positive".into()));
    }
    Ok(())
}

async fn check_category<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    kind: category::Kind,
) -> AppResult<()> {
    let category = category::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category {id}")))?;
    if category.kind != kind {
        return Err(AppError::Validation(format!(
            "category {} does not hold {:?} items",
            category.name, kind
        )));
    }
    Ok(())
}

fn check_flavors(flavors: &[FlavorInput]) -> AppResult<()> {
    let mut names = HashSet::new();
    for flavor in flavors {
        if !names.insert(flavor.name.trim()) {
            return Err(AppError::Validation(format!(
                "flavor {} is listed twice",
                flavor.name
            )));
        }
        if flavor.options.iter().any(|option| option.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "flavor {} has a blank option",
                flavor.name
            )));
        }
    }
    Ok(())
}

async fn replace_flavors<C: ConnectionTrait>(
    conn: &C,
    dish_id: i32,
    flavors: &[FlavorInput],
) -> AppResult<()> {
    dish_flavor::Entity::delete_many()
        .filter(dish_flavor::Column::DishId.eq(dish_id))
        .exec(conn)
        .await?;
    if flavors.is_empty() {
        return Ok(());
    }

    let rows = flavors
        .iter()
        .map(|flavor| {
            let value = serde_json::to_string(&flavor.options)
                .map_err(|err| AppError::Internal(err.to_string()))?;
            Ok::<_, AppError>(dish_flavor::ActiveModel {
                dish_id: Set(dish_id),
                name: Set(flavor.name.trim().to_owned()),
                value: Set(value),
                ..Default::default()
            })
        })
        .collect::<AppResult<Vec<_>>>()?;
    dish_flavor::Entity::insert_many(rows).exec(conn).await?;
    Ok(())
}

/// Flavor choices of every dish in `dish_ids`, keyed by dish.
async fn flavors_of<C: ConnectionTrait>(
    conn: &C,
    dish_ids: Vec<i32>,
) -> AppResult<HashMap<i32, Vec<FlavorView>>> {
    let mut flavors: HashMap<i32, Vec<FlavorView>> = HashMap::new();
    for row in dish_flavor::Entity::find()
        .filter(dish_flavor::Column::DishId.is_in(dish_ids))
        .order_by_asc(dish_flavor::Column::Id)
        .all(conn)
        .await?
    {
        let options: Vec<String> = serde_json::from_str(&row.value).map_err(|err| {
            AppError::Internal(format!("flavor {} of dish {}: {err}", row.id, row.dish_id))
        })?;
        flavors.entry(row.dish_id).or_default().push(FlavorView {
            name: row.name,
            options,
        });
    }
    Ok(flavors)
}

async fn with_flavors<C: ConnectionTrait>(
    conn: &C,
    dishes: Vec<dish::Model>,
) -> AppResult<Vec<DishView>> {
    let mut flavors = flavors_of(conn, dishes.iter().map(|d| d.id).collect()).await?;
    Ok(dishes
        .into_iter()
        .map(|dish| DishView {
            flavors: flavors.remove(&dish.id).unwrap_or_default(),
            dish,
        })
        .collect())
}

pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    cache: Arc<CatalogCache>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, cache: Arc<CatalogCache>) -> Self {
        Self { db, cache }
    }

    pub async fn is_sellable(&self, item: ItemRef) -> AppResult<bool> {
        is_sellable(&*self.db, item).await
    }

    pub async fn can_enable_setmeal(&self, setmeal_id: i32) -> AppResult<()> {
        can_enable_setmeal(&*self.db, setmeal_id).await
    }

    pub async fn can_delete_dish(&self, dish_id: i32) -> AppResult<dish::Model> {
        can_delete_dish(&*self.db, dish_id).await
    }

    pub async fn can_delete_setmeals(&self, ids: &[i32]) -> AppResult<()> {
        can_delete_setmeals(&*self.db, ids).await
    }

    // Categories

    pub async fn create_category(&self, input: NewCategory) -> AppResult<category::Model> {
        input.validate()?;
        let model = category::ActiveModel {
            name: Set(input.name),
            kind: Set(input.kind),
            sort: Set(input.sort),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn list_categories(
        &self,
        kind: Option<category::Kind>,
    ) -> AppResult<Vec<category::Model>> {
        let mut query = category::Entity::find();
        if let Some(kind) = kind {
            query = query.filter(category::Column::Kind.eq(kind));
        }
        Ok(query
            .order_by_asc(category::Column::Sort)
            .order_by_asc(category::Column::Id)
            .all(&*self.db)
            .await?)
    }

    // Dishes

    pub async fn create_dish(&self, operator: i32, input: DishInput) -> AppResult<dish::Model> {
        input.validate()?;
        check_price(input.price)?;
        check_flavors(&input.flavors)?;

        let txn = self.db.begin().await?;
        check_category(&txn, input.category_id, category::Kind::Dish).await?;

        let mut model = dish::ActiveModel {
            name: Set(input.name),
            category_id: Set(input.category_id),
            price: Set(input.price),
            image: Set(input.image),
            description: Set(input.description),
            status: Set(input.status.unwrap_or(SaleStatus::Sellable)),
            ..Default::default()
        };
        stamp(&mut model, OperationKind::Insert, operator);
        let dish = model.insert(&txn).await?;
        replace_flavors(&txn, dish.id, &input.flavors).await?;
        txn.commit().await?;

        self.cache.invalidate_dishes([dish.category_id]);
        info!(dish_id = dish.id, name = %dish.name, "dish created");
        Ok(dish)
    }

    pub async fn update_dish(
        &self,
        operator: i32,
        id: i32,
        input: DishInput,
    ) -> AppResult<dish::Model> {
        input.validate()?;
        check_price(input.price)?;
        check_flavors(&input.flavors)?;

        let txn = self.db.begin().await?;
        let existing = find_dish(&txn, id).await?;
        check_category(&txn, input.category_id, category::Kind::Dish).await?;
        let old_category = existing.category_id;

        let mut model: dish::ActiveModel = existing.into();
        model.name = Set(input.name);
        model.category_id = Set(input.category_id);
        model.price = Set(input.price);
        model.image = Set(input.image);
        model.description = Set(input.description);
        stamp(&mut model, OperationKind::Update, operator);
        let dish = model.update(&txn).await?;
        replace_flavors(&txn, id, &input.flavors).await?;
        txn.commit().await?;

        self.cache.invalidate_dishes([old_category, dish.category_id]);
        Ok(dish)
    }

    pub async fn get_dish(&self, id: i32) -> AppResult<DishView> {
        let dish = find_dish(&*self.db, id).await?;
        let mut views = with_flavors(&*self.db, vec![dish]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::not_found(format!("Dish {id}")))
    }

    /// Switches a dish on or off. Stopping cascades to every setmeal linking
    /// the dish; the ids of those setmeals are returned.
    pub async fn set_dish_status(
        &self,
        operator: i32,
        dish_id: i32,
        status: SaleStatus,
    ) -> AppResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        let dish = find_dish(&txn, dish_id).await?;
        let dish_category = dish.category_id;

        let mut model: dish::ActiveModel = dish.into();
        model.status = Set(status);
        stamp(&mut model, OperationKind::Update, operator);
        model.update(&txn).await?;

        let mut stopped = Vec::new();
        let mut setmeal_categories = BTreeSet::new();
        if status == SaleStatus::Stopped {
            let linked = setmeal_ids_linking(&txn, dish_id).await?;
            if !linked.is_empty() {
                let affected = setmeal::Entity::find()
                    .filter(setmeal::Column::Id.is_in(linked.clone()))
                    .all(&txn)
                    .await?;
                setmeal_categories.extend(affected.iter().map(|s| s.category_id));

                setmeal::Entity::update_many()
                    .col_expr(setmeal::Column::Status, Expr::value(SaleStatus::Stopped))
                    .col_expr(
                        setmeal::Column::UpdateTime,
                        Expr::value(chrono::Local::now().naive_local()),
                    )
                    .col_expr(setmeal::Column::UpdateUser, Expr::value(operator))
                    .filter(setmeal::Column::Id.is_in(linked.clone()))
                    .exec(&txn)
                    .await?;
                stopped = linked;
            }
        }
        txn.commit().await?;

        self.cache.invalidate_dishes([dish_category]);
        self.cache.invalidate_setmeals(setmeal_categories);
        info!(dish_id, ?status, cascaded = ?stopped, "dish status changed");
        Ok(stopped)
    }

    /// Deletes every dish in `ids`, or none of them.
    pub async fn delete_dishes(&self, ids: &[i32]) -> AppResult<()> {
        if ids.is_empty() {
            return Err(AppError::Validation("no dish ids given".into()));
        }

        let txn = self.db.begin().await?;
        let mut categories = BTreeSet::new();
        for &id in ids {
            categories.insert(can_delete_dish(&txn, id).await?.category_id);
        }
        dish_flavor::Entity::delete_many()
            .filter(dish_flavor::Column::DishId.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        dish::Entity::delete_many()
            .filter(dish::Column::Id.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        self.cache.invalidate_dishes(categories);
        info!(?ids, "dishes deleted");
        Ok(())
    }

    /// Staff listing: every dish of the category regardless of status.
    pub async fn list_dishes(&self, category_id: Option<i32>) -> AppResult<Vec<dish::Model>> {
        let mut query = dish::Entity::find();
        if let Some(category_id) = category_id {
            query = query.filter(dish::Column::CategoryId.eq(category_id));
        }
        Ok(query.order_by_asc(dish::Column::Id).all(&*self.db).await?)
    }

    /// Staff search: name fragment, category and status, newest change first.
    pub async fn page_dishes(&self, query: CatalogQuery) -> AppResult<PageResult<dish::Model>> {
        let mut select = dish::Entity::find();
        if let Some(name) = query.name() {
            select = select.filter(dish::Column::Name.contains(name));
        }
        if let Some(category_id) = query.category_id {
            select = select.filter(dish::Column::CategoryId.eq(category_id));
        }
        if let Some(status) = query.status {
            select = select.filter(dish::Column::Status.eq(status));
        }

        let paginator = select
            .order_by_desc(dish::Column::UpdateTime)
            .order_by_desc(dish::Column::Id)
            .paginate(&*self.db, query.page_size());
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(query.page() - 1).await?;
        Ok(PageResult { total, records })
    }

    /// Customer listing: sellable dishes of one category with their flavors,
    /// served from cache.
    pub async fn sellable_dishes(&self, category_id: i32) -> AppResult<Vec<DishView>> {
        if let Some(listing) = self.cache.dishes(category_id) {
            return Ok(listing);
        }
        let generation = self.cache.dish_generation(category_id);
        let dishes = dish::Entity::find()
            .filter(dish::Column::CategoryId.eq(category_id))
            .filter(dish::Column::Status.eq(SaleStatus::Sellable))
            .order_by_asc(dish::Column::Id)
            .all(&*self.db)
            .await?;
        let listing = with_flavors(&*self.db, dishes).await?;
        self.cache.put_dishes(category_id, generation, listing.clone());
        Ok(listing)
    }

    // Setmeals

    async fn insert_links<C: ConnectionTrait>(
        conn: &C,
        setmeal_id: i32,
        dishes: &[SetmealDishInput],
    ) -> AppResult<()> {
        for link in dishes {
            find_dish(conn, link.dish_id).await?;
        }
        let links = dishes.iter().map(|link| setmeal_dish::ActiveModel {
            setmeal_id: Set(setmeal_id),
            dish_id: Set(link.dish_id),
            copies: Set(link.copies),
            ..Default::default()
        });
        setmeal_dish::Entity::insert_many(links).exec(conn).await?;
        Ok(())
    }

    /// New setmeals start stopped; they are switched on explicitly once the
    /// composition is complete.
    pub async fn create_setmeal(&self, operator: i32, input: SetmealInput) -> AppResult<SetmealView> {
        input.validate()?;
        check_price(input.price)?;

        let txn = self.db.begin().await?;
        check_category(&txn, input.category_id, category::Kind::Setmeal).await?;

        let mut model = setmeal::ActiveModel {
            name: Set(input.name),
            category_id: Set(input.category_id),
            price: Set(input.price),
            image: Set(input.image),
            description: Set(input.description),
            status: Set(SaleStatus::Stopped),
            ..Default::default()
        };
        stamp(&mut model, OperationKind::Insert, operator);
        let setmeal = model.insert(&txn).await?;
        Self::insert_links(&txn, setmeal.id, &input.dishes).await?;
        txn.commit().await?;

        info!(setmeal_id = setmeal.id, name = %setmeal.name, "setmeal created");
        self.get_setmeal(setmeal.id).await
    }

    /// Replaces the setmeal's fields and composition. The setmeal is stopped
    /// afterwards, whatever its previous status.
    pub async fn update_setmeal(
        &self,
        operator: i32,
        id: i32,
        input: SetmealInput,
    ) -> AppResult<SetmealView> {
        input.validate()?;
        check_price(input.price)?;

        let txn = self.db.begin().await?;
        let existing = find_setmeal(&txn, id).await?;
        check_category(&txn, input.category_id, category::Kind::Setmeal).await?;
        let old_category = existing.category_id;

        let mut model: setmeal::ActiveModel = existing.into();
        model.name = Set(input.name);
        model.category_id = Set(input.category_id);
        model.price = Set(input.price);
        model.image = Set(input.image);
        model.description = Set(input.description);
        model.status = Set(SaleStatus::Stopped);
        stamp(&mut model, OperationKind::Update, operator);
        let setmeal = model.update(&txn).await?;

        setmeal_dish::Entity::delete_many()
            .filter(setmeal_dish::Column::SetmealId.eq(id))
            .exec(&txn)
            .await?;
        Self::insert_links(&txn, id, &input.dishes).await?;
        txn.commit().await?;

        self.cache
            .invalidate_setmeals([old_category, setmeal.category_id]);
        self.get_setmeal(id).await
    }

    pub async fn get_setmeal(&self, id: i32) -> AppResult<SetmealView> {
        let setmeal = find_setmeal(&*self.db, id).await?;
        let links = setmeal_dish::Entity::find()
            .filter(setmeal_dish::Column::SetmealId.eq(id))
            .find_also_related(dish::Entity)
            .order_by_asc(setmeal_dish::Column::Id)
            .all(&*self.db)
            .await?;

        let dishes = links
            .into_iter()
            .map(|(link, dish)| {
                let (name, image) = dish.map(|d| (d.name, d.image)).unwrap_or_default();
                SetmealDishView {
                    dish_id: link.dish_id,
                    name,
                    image,
                    copies: link.copies,
                }
            })
            .collect();
        Ok(SetmealView { setmeal, dishes })
    }

    pub async fn set_setmeal_status(
        &self,
        operator: i32,
        id: i32,
        status: SaleStatus,
    ) -> AppResult<setmeal::Model> {
        let txn = self.db.begin().await?;
        if status == SaleStatus::Sellable {
            can_enable_setmeal(&txn, id).await?;
        }
        let mut model: setmeal::ActiveModel = find_setmeal(&txn, id).await?.into();
        model.status = Set(status);
        stamp(&mut model, OperationKind::Update, operator);
        let setmeal = model.update(&txn).await?;
        txn.commit().await?;

        self.cache.invalidate_setmeals([setmeal.category_id]);
        info!(setmeal_id = id, ?status, "setmeal status changed");
        Ok(setmeal)
    }

    /// Deletes every setmeal in `ids` together with its links, or nothing.
    pub async fn delete_setmeals(&self, ids: &[i32]) -> AppResult<()> {
        if ids.is_empty() {
            return Err(AppError::Validation("no setmeal ids given".into()));
        }

        let txn = self.db.begin().await?;
        can_delete_setmeals(&txn, ids).await?;
        let categories: BTreeSet<i32> = setmeal::Entity::find()
            .filter(setmeal::Column::Id.is_in(ids.to_vec()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|s| s.category_id)
            .collect();

        setmeal_dish::Entity::delete_many()
            .filter(setmeal_dish::Column::SetmealId.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        setmeal::Entity::delete_many()
            .filter(setmeal::Column::Id.is_in(ids.to_vec()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        self.cache.invalidate_setmeals(categories);
        info!(?ids, "setmeals deleted");
        Ok(())
    }

    pub async fn list_setmeals(&self, category_id: Option<i32>) -> AppResult<Vec<setmeal::Model>> {
        let mut query = setmeal::Entity::find();
        if let Some(category_id) = category_id {
            query = query.filter(setmeal::Column::CategoryId.eq(category_id));
        }
        Ok(query.order_by_asc(setmeal::Column::Id).all(&*self.db).await?)
    }

    pub async fn page_setmeals(&self, query: CatalogQuery) -> AppResult<PageResult<setmeal::Model>> {
        let mut select = setmeal::Entity::find();
        if let Some(name) = query.name() {
            select = select.filter(setmeal::Column::Name.contains(name));
        }
        if let Some(category_id) = query.category_id {
            select = select.filter(setmeal::Column::CategoryId.eq(category_id));
        }
        if let Some(status) = query.status {
            select = select.filter(setmeal::Column::Status.eq(status));
        }

        let paginator = select
            .order_by_desc(setmeal::Column::UpdateTime)
            .order_by_desc(setmeal::Column::Id)
            .paginate(&*self.db, query.page_size());
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(query.page() - 1).await?;
        Ok(PageResult { total, records })
    }

    pub async fn sellable_setmeals(&self, category_id: i32) -> AppResult<Vec<setmeal::Model>> {
        if let Some(listing) = self.cache.setmeals(category_id) {
            return Ok(listing);
        }
        let generation = self.cache.setmeal_generation(category_id);
        let listing = setmeal::Entity::find()
            .filter(setmeal::Column::CategoryId.eq(category_id))
            .filter(setmeal::Column::Status.eq(SaleStatus::Sellable))
            .order_by_asc(setmeal::Column::Id)
            .all(&*self.db)
            .await?;
        self.cache
            .put_setmeals(category_id, generation, listing.clone());
        Ok(listing)
    }
}
