//! SeaORM implementation of InvoiceRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::{db_err, parse_decimal, parse_uuid, write_err};
use crate::domain::billing::InvoiceRepository;
use crate::domain::{
    Currency, DomainError, DomainResult, Invoice, InvoiceLine, InvoiceStatus,
};
use crate::infrastructure::database::entities::{invoice, invoice_line};

pub struct SeaOrmInvoiceRepository {
    db: DatabaseConnection,
}

impl SeaOrmInvoiceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn line_to_domain(l: invoice_line::Model) -> DomainResult<InvoiceLine> {
    Ok(InvoiceLine {
        id: parse_uuid(&l.id)?,
        invoice_id: parse_uuid(&l.invoice_id)?,
        index: l.line_index,
        description: l.description,
        quantity: parse_decimal(&l.quantity)?,
        unit_price: l.unit_price.as_deref().map(parse_decimal).transpose()?,
        amount: parse_decimal(&l.amount)?,
    })
}

fn invoice_to_domain(i: invoice::Model, lines: Vec<invoice_line::Model>) -> DomainResult<Invoice> {
    let mut lines = lines
        .into_iter()
        .map(line_to_domain)
        .collect::<DomainResult<Vec<_>>>()?;
    lines.sort_by_key(|l| l.index);

    Ok(Invoice {
        id: parse_uuid(&i.id)?,
        customer_id: parse_uuid(&i.customer_id)?,
        billing_period_start: i.billing_period_start,
        billing_period_end: i.billing_period_end,
        due_date: i.due_date,
        total_amount: parse_decimal(&i.total_amount)?,
        currency: Currency::parse(&i.currency)
            .ok_or_else(|| DomainError::Storage(format!("Unknown currency '{}'", i.currency)))?,
        status: InvoiceStatus::parse(&i.status)
            .ok_or_else(|| DomainError::Storage(format!("Unknown invoice status '{}'", i.status)))?,
        lines,
        created_at: i.created_at,
        updated_at: i.updated_at,
    })
}

/// Non-void invoices of the customer intersecting `[start, end)`
async fn count_active_overlapping<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DomainResult<u64> {
    invoice::Entity::find()
        .filter(invoice::Column::CustomerId.eq(customer_id.to_string()))
        .filter(invoice::Column::Status.ne(InvoiceStatus::Void.as_str()))
        .filter(invoice::Column::BillingPeriodStart.lt(end))
        .filter(invoice::Column::BillingPeriodEnd.gt(start))
        .count(conn)
        .await
        .map_err(db_err)
}

#[async_trait]
impl InvoiceRepository for SeaOrmInvoiceRepository {
    async fn exists_active_overlapping(
        &self,
        customer_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<bool> {
        Ok(count_active_overlapping(&self.db, customer_id, start, end).await? > 0)
    }

    async fn create(&self, inv: Invoice) -> DomainResult<Invoice> {
        let txn = self.db.begin().await.map_err(db_err)?;

        if count_active_overlapping(&txn, inv.customer_id, inv.billing_period_start, inv.billing_period_end)
            .await?
            > 0
        {
            return Err(DomainError::Conflict(format!(
                "Active invoice already exists for customer {} overlapping {}",
                inv.customer_id,
                inv.period()
            )));
        }

        invoice::ActiveModel {
            id: Set(inv.id.to_string()),
            customer_id: Set(inv.customer_id.to_string()),
            billing_period_start: Set(inv.billing_period_start),
            billing_period_end: Set(inv.billing_period_end),
            due_date: Set(inv.due_date),
            total_amount: Set(inv.total_amount.to_string()),
            currency: Set(inv.currency.as_str().to_string()),
            status: Set(inv.status.as_str().to_string()),
            created_at: Set(inv.created_at),
            updated_at: Set(inv.updated_at),
        }
        .insert(&txn)
        .await
        .map_err(|e| write_err(e, "Invoice"))?;

        if !inv.lines.is_empty() {
            let lines = inv.lines.iter().map(|l| invoice_line::ActiveModel {
                id: Set(l.id.to_string()),
                invoice_id: Set(inv.id.to_string()),
                line_index: Set(l.index),
                description: Set(l.description.clone()),
                quantity: Set(l.quantity.to_string()),
                unit_price: Set(l.unit_price.map(|p| p.to_string())),
                amount: Set(l.amount.to_string()),
            });
            invoice_line::Entity::insert_many(lines)
                .exec(&txn)
                .await
                .map_err(|e| write_err(e, "Invoice line"))?;
        }

        txn.commit().await.map_err(db_err)?;
        debug!(invoice_id = %inv.id, lines = inv.lines.len(), "Invoice persisted");
        Ok(inv)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Invoice>> {
        let Some(model) = invoice::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let lines = invoice_line::Entity::find()
            .filter(invoice_line::Column::InvoiceId.eq(model.id.clone()))
            .order_by_asc(invoice_line::Column::LineIndex)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        invoice_to_domain(model, lines).map(Some)
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> DomainResult<Vec<Invoice>> {
        let rows = invoice::Entity::find()
            .filter(invoice::Column::CustomerId.eq(customer_id.to_string()))
            .order_by_asc(invoice::Column::BillingPeriodStart)
            .find_with_related(invoice_line::Entity)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut invoices = rows
            .into_iter()
            .map(|(model, lines)| invoice_to_domain(model, lines))
            .collect::<DomainResult<Vec<_>>>()?;
        invoices.sort_by_key(|i| (i.billing_period_start, i.created_at));
        Ok(invoices)
    }

    async fn update_status(&self, id: Uuid, from: InvoiceStatus, to: InvoiceStatus) -> DomainResult<()> {
        let result = invoice::Entity::update_many()
            .col_expr(invoice::Column::Status, Expr::value(to.as_str()))
            .col_expr(invoice::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(invoice::Column::Id.eq(id.to_string()))
            .filter(invoice::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 1 {
            return Ok(());
        }

        let exists = invoice::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if exists {
            Err(status_changed(id, from))
        } else {
            Err(DomainError::not_found("Invoice", "id", id.to_string()))
        }
    }
}

fn status_changed(id: Uuid, from: InvoiceStatus) -> DomainError {
    DomainError::Conflict(format!("Invoice {} is no longer {}", id, from))
}
