//! Create invoices and invoice_lines tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invoices::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Invoices::CustomerId).string().not_null())
                    .col(
                        ColumnDef::new(Invoices::BillingPeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::BillingPeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::DueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::TotalAmount)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Invoices::Currency).string_len(3).not_null())
                    .col(
                        ColumnDef::new(Invoices::Status)
                            .string()
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Invoices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_customer_period")
                    .table(Invoices::Table)
                    .col(Invoices::CustomerId)
                    .col(Invoices::BillingPeriodStart)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceLines::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InvoiceLines::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(InvoiceLines::InvoiceId).string().not_null())
                    .col(ColumnDef::new(InvoiceLines::LineIndex).integer().not_null())
                    .col(ColumnDef::new(InvoiceLines::Description).string().not_null())
                    .col(ColumnDef::new(InvoiceLines::Quantity).string().not_null())
                    .col(ColumnDef::new(InvoiceLines::UnitPrice).string())
                    .col(ColumnDef::new(InvoiceLines::Amount).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoice_lines_invoice")
                            .from(InvoiceLines::Table, InvoiceLines::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoice_lines_invoice")
                    .table(InvoiceLines::Table)
                    .col(InvoiceLines::InvoiceId)
                    .col(InvoiceLines::LineIndex)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InvoiceLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Invoices {
    Table,
    Id,
    CustomerId,
    BillingPeriodStart,
    BillingPeriodEnd,
    DueDate,
    TotalAmount,
    Currency,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum InvoiceLines {
    Table,
    Id,
    InvoiceId,
    LineIndex,
    Description,
    Quantity,
    UnitPrice,
    Amount,
}
