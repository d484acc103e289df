//! Create meter_readings table keyed by (site_id, read_at)

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MeterReadings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MeterReadings::SiteId).string().not_null())
                    .col(
                        ColumnDef::new(MeterReadings::ReadAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MeterReadings::Kwh).string().not_null())
                    .primary_key(
                        Index::create()
                            .name("pk_meter_readings")
                            .col(MeterReadings::SiteId)
                            .col(MeterReadings::ReadAt),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MeterReadings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum MeterReadings {
    Table,
    SiteId,
    ReadAt,
    Kwh,
}
