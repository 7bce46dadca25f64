//! Connector meter value entity
//!
//! One row per `Energy.Active.Import.Register` reading, independent of
//! transactions. The polling guard reads these per connector.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connector_meter_values")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub charge_box_id: String,
    pub connector_id: i32,
    pub timestamp: DateTimeUtc,

    /// Cumulative register value in Wh
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub energy_wh: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
