//! Running per-transaction telemetry entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_telemetry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub transaction_id: i32,
    pub charge_box_id: String,
    pub connector_id: i32,
    pub id_tag: String,
    pub timestamp: DateTimeUtc,

    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub voltage: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub power_w: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub energy_wh: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub soc: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub offered_power_w: Decimal,

    /// Filled in by the streaming guard after pricing the batch
    #[sea_orm(column_type = "Decimal(Some((20, 6)))", nullable)]
    pub tax_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))", nullable)]
    pub total_amount: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
