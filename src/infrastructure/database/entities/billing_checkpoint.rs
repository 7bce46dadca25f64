//! Billing checkpoint entity: one row per transaction billed by polling

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "billing_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: i32,

    pub last_billed_at: DateTimeUtc,

    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub last_billed_energy_wh: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::charging_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::charging_transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::charging_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
