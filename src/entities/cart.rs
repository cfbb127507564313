use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::entities::user::Entity as User;

/// One line of a user's shopping cart. Name, image and price are a snapshot
/// taken when the line was first added.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "cart")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub user_id: i32,
    pub dish_id: Option<i32>,
    pub setmeal_id: Option<i32>,
    pub dish_flavor: Option<String>,
    pub name: String,
    pub image: String,
    pub amount: Decimal,
    pub number: i32,
    pub create_time: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "User",
        from = "crate::entities::cart::Column::UserId",
        to = "crate::entities::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<crate::entities::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}
