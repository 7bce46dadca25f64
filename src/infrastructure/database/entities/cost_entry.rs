//! Billed interval entity (append-only)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub transaction_id: i32,

    /// End of the billed interval
    pub timestamp: DateTimeUtc,

    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub energy_kwh: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub total_amount: Decimal,
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
