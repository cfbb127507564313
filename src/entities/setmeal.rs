use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::entities::dish::SaleStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "setmeal")]
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

impl ActiveModelBehavior for ActiveModel {}
