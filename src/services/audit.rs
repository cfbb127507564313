use chrono::{Local, NaiveDateTime};
use sea_orm::Set;

use crate::entities::{dish, setmeal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
}

/// Audit columns shared by the catalog tables.
pub trait Audited {
    fn set_created(&mut self, at: NaiveDateTime, by: i32);
    fn set_updated(&mut self, at: NaiveDateTime, by: i32);
}

/// Stamps `model` for the given write. Inserts get both create and update
/// columns, updates only the update columns.
pub fn stamp<M: Audited>(model: &mut M, kind: OperationKind, operator: i32) {
    let now = Local::now().naive_local();
    if kind == OperationKind::Insert {
        model.set_created(now, operator);
    }
    model.set_updated(now, operator);
}

macro_rules! impl_audited {
    ($($entity:ident),*) => {
        $(
            impl Audited for $entity::ActiveModel {
                fn set_created(&mut self, at: NaiveDateTime, by: i32) {
                    self.create_time = Set(at);
                    self.create_user = Set(by);
                }

                fn set_updated(&mut self, at: NaiveDateTime, by: i32) {
                    self.update_time = Set(at);
                    self.update_user = Set(by);
                }
            }
        )*
    };
}

impl_audited!(dish, setmeal);
