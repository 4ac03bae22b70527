use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{TaskPriority, TaskStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "task")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTimeWithTimeZone>,

    pub priority: TaskPriority,
    pub status: TaskStatus,

    pub assigned_to: Option<String>,
    pub created_by: String,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
