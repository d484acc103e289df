//! Tariff rate entity. The configuration column holds tagged JSON.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tariff_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub plan_id: String,

    /// Order within the plan
    pub position: i32,

    /// "FLAT" | "TIME_OF_USE" | "BLOCK"
    pub rate_type: String,

    pub description: String,

    /// e.g. `{"type":"FLAT","price_per_kwh":"0.25"}`
    #[sea_orm(column_type = "Text")]
    pub configuration: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tariff_plan::Entity",
        from = "Column::PlanId",
        to = "super::tariff_plan::Column::Id"
    )]
    Plan,
}

impl Related<super::tariff_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
