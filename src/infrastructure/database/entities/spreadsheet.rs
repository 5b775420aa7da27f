//! Registered export destinations

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "spreadsheets")]
pub struct Model {
    /// Registration order
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Google spreadsheet id
    #[sea_orm(unique)]
    pub spreadsheet_id: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
