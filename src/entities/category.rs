use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub kind: Kind,
    #[sea_orm(default_value = 0)]
    pub sort: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "crate::entities::dish::Entity")]
    Dish,
    #[sea_orm(has_many = "crate::entities::setmeal::Entity")]
    Setmeal,
}

impl Related<crate::entities::dish::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dish.def()
    }
}

impl Related<crate::entities::setmeal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Setmeal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Which kind of catalog item a category groups.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "category_kind_enum",
    db_type = "String(StringLen::N(16))",
    rs_type = "String"
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[sea_orm(string_value = "dish")]
    Dish,
    #[sea_orm(string_value = "setmeal")]
    Setmeal,
}
