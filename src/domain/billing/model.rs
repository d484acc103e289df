//! Invoice domain entity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::period::BillingPeriod;
use crate::domain::customer::Currency;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Issued => "ISSUED",
            Self::Paid => "PAID",
            Self::Void => "VOID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "ISSUED" => Some(Self::Issued),
            "PAID" => Some(Self::Paid),
            "VOID" => Some(Self::Void),
            _ => None,
        }
    }

    /// Every status except VOID blocks another invoice over the same period
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Void)
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Issued)
                | (Self::Draft, Self::Void)
                | (Self::Issued, Self::Paid)
                | (Self::Issued, Self::Void)
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line of an invoice. Site header lines carry zero quantity and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub index: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
}

/// Persisted billing artifact. Lines and total never change once saved;
/// only `status` moves.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub status: InvoiceStatus,
    /// Ordered by `index`
    pub lines: Vec<InvoiceLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Empty DRAFT invoice
    pub fn draft(
        customer_id: Uuid,
        period: BillingPeriod,
        due_date: DateTime<Utc>,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            billing_period_start: period.start,
            billing_period_end: period.end,
            due_date,
            total_amount: Decimal::ZERO,
            currency,
            status: InvoiceStatus::Draft,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn period(&self) -> BillingPeriod {
        BillingPeriod {
            start: self.billing_period_start,
            end: self.billing_period_end,
        }
    }

    /// Append a line at the next index and add its amount to the total
    pub fn push_line(
        &mut self,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Option<Decimal>,
        amount: Decimal,
    ) {
        let index = self.lines.len() as i32;
        self.lines.push(InvoiceLine {
            id: Uuid::new_v4(),
            invoice_id: self.id,
            index,
            description: description.into(),
            quantity,
            unit_price,
            amount,
        });
        self.total_amount += amount;
    }

    pub fn push_header(&mut self, description: impl Into<String>) {
        self.push_line(description, Decimal::ZERO, None, Decimal::ZERO);
    }
}
