//! Charging transaction entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Assigned by the engine, not by the database
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub charge_box_id: String,
    pub connector_id: i32,
    pub id_tag: String,

    pub started_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub stopped_at: Option<DateTimeUtc>,

    /// "StopByServer", "SchedulerStop", or the reason the charger reported
    #[sea_orm(nullable)]
    pub stop_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cost_entry::Entity")]
    CostEntries,
    #[sea_orm(has_one = "super::billing_checkpoint::Entity")]
    Checkpoint,
}

impl Related<super::cost_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostEntries.def()
    }
}

impl Related<super::billing_checkpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checkpoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
