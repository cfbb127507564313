use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "dish")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(indexed)]
    pub category_id: i32,
    pub price: Decimal,
    pub image: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub status: SaleStatus,
    pub create_time: DateTime,
    pub update_time: DateTime,
    pub create_user: i32,
    pub update_user: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::category::Entity",
        from = "Column::CategoryId",
        to = "crate::entities::category::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(has_many = "crate::entities::setmeal_dish::Entity")]
    SetmealDish,
    #[sea_orm(has_many = "crate::entities::dish_flavor::Entity")]
    DishFlavor,
}

impl Related<crate::entities::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<crate::entities::setmeal_dish::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SetmealDish.def()
    }
}

impl Related<crate::entities::dish_flavor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DishFlavor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Sale status shared by dishes and setmeals.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "sale_status_enum",
    db_type = "String(StringLen::N(16))",
    rs_type = "String"
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    #[sea_orm(string_value = "sellable")]
    Sellable,
    #[sea_orm(string_value = "stopped")]
    Stopped,
}
