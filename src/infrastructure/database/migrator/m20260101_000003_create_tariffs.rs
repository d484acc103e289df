//! Create tariff_plans, tariff_rates and site_tariff_assignments tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TariffPlans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TariffPlans::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(TariffPlans::Code).string().not_null())
                    .col(ColumnDef::new(TariffPlans::Name).string().not_null())
                    .col(ColumnDef::new(TariffPlans::Country).string_len(2).not_null())
                    .col(
                        ColumnDef::new(TariffPlans::BillingPeriod)
                            .string()
                            .not_null()
                            .default("MONTHLY"),
                    )
                    .col(
                        ColumnDef::new(TariffPlans::ValidFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TariffPlans::ValidTo).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(TariffPlans::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TariffPlans::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TariffRates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TariffRates::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(TariffRates::PlanId).string().not_null())
                    .col(ColumnDef::new(TariffRates::Position).integer().not_null())
                    .col(ColumnDef::new(TariffRates::RateType).string().not_null())
                    .col(ColumnDef::new(TariffRates::Description).string().not_null())
                    .col(ColumnDef::new(TariffRates::Configuration).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tariff_rates_plan")
                            .from(TariffRates::Table, TariffRates::PlanId)
                            .to(TariffPlans::Table, TariffPlans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SiteTariffAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SiteTariffAssignments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SiteTariffAssignments::SiteId).string().not_null())
                    .col(ColumnDef::new(SiteTariffAssignments::PlanId).string().not_null())
                    .col(
                        ColumnDef::new(SiteTariffAssignments::EffectiveFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SiteTariffAssignments::EffectiveTo).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SiteTariffAssignments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_site_tariff_assignments_plan")
                            .from(SiteTariffAssignments::Table, SiteTariffAssignments::PlanId)
                            .to(TariffPlans::Table, TariffPlans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_site_tariff_assignments_site")
                    .table(SiteTariffAssignments::Table)
                    .col(SiteTariffAssignments::SiteId)
                    .col(SiteTariffAssignments::EffectiveFrom)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteTariffAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TariffRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TariffPlans::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TariffPlans {
    Table,
    Id,
    Code,
    Name,
    Country,
    BillingPeriod,
    ValidFrom,
    ValidTo,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum TariffRates {
    Table,
    Id,
    PlanId,
    Position,
    RateType,
    Description,
    Configuration,
}

#[derive(Iden)]
pub enum SiteTariffAssignments {
    Table,
    Id,
    SiteId,
    PlanId,
    EffectiveFrom,
    EffectiveTo,
    CreatedAt,
}
