use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "setmeal_dish")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub setmeal_id: i32,
    #[sea_orm(indexed)]
    pub dish_id: i32,
    pub copies: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::setmeal::Entity",
        from = "Column::SetmealId",
        to = "crate::entities::setmeal::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Setmeal,
    #[sea_orm(
        belongs_to = "crate::entities::dish::Entity",
        from = "Column::DishId",
        to = "crate::entities::dish::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Dish,
}

impl Related<crate::entities::setmeal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Setmeal.def()
    }
}

impl Related<crate::entities::dish::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dish.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
