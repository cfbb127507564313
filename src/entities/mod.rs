pub mod cart;
pub mod category;
pub mod dish;
pub mod dish_flavor;
pub mod order;
pub mod order_detail;
pub mod setmeal;
pub mod setmeal_dish;
pub mod user;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Local;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema, Set,
    TransactionTrait,
};
use tracing::info;

/// Creates every table that does not exist yet. Parents come first so the
/// foreign keys resolve.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(dish::Entity),
        schema.create_table_from_entity(dish_flavor::Entity),
        schema.create_table_from_entity(setmeal::Entity),
        schema.create_table_from_entity(setmeal_dish::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_detail::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| err.to_string())
}

/// Seeds one staff and one customer account, skipping names that already exist.
pub async fn primary_setup(db: &DatabaseConnection, password: &str) -> Result<(), DbErr> {
    let password_hash = hash_password(password).map_err(DbErr::Custom)?;
    let now = Local::now().naive_local();

    let txn = db.begin().await?;
    for (username, role) in [("admin", user::Role::Admin), ("user", user::Role::User)] {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&txn)
            .await?;
        if existing.is_some() {
            continue;
        }

        user::Entity::insert(user::ActiveModel {
            username: Set(username.to_owned()),
            password: Set(password_hash.clone()),
            role: Set(role),
            created_at: Set(now),
            ..Default::default()
        })
        .exec(&txn)
        .await?;
        info!(username, role = %role, "seeded account");
    }
    txn.commit().await
}
