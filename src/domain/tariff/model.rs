//! Tariff plan, rate and site assignment entities

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::Country;
use crate::domain::{DomainError, DomainResult};

/// Pricing rule kind of a tariff rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    /// Single price per kWh
    Flat,
    /// Peak / off-peak price by local wall-clock time
    TimeOfUse,
    /// Tiered thresholds (no strategy yet)
    Block,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::TimeOfUse => "TIME_OF_USE",
            Self::Block => "BLOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FLAT" => Some(Self::Flat),
            "TIME_OF_USE" => Some(Self::TimeOfUse),
            "BLOCK" => Some(Self::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tier of a block rate. `up_to_kwh = None` is the open last tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTier {
    pub up_to_kwh: Option<Decimal>,
    pub price_per_kwh: Decimal,
}

/// Rate configuration, persisted as JSON with a `type` discriminator:
///
/// ```json
/// {"type": "FLAT", "price_per_kwh": "0.25"}
/// {"type": "TIME_OF_USE", "peak_price": "0.40", "off_peak_price": "0.15",
///  "peak_start": "22:00:00", "peak_end": "06:00:00"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateConfiguration {
    Flat {
        price_per_kwh: Decimal,
    },
    TimeOfUse {
        peak_price: Decimal,
        off_peak_price: Decimal,
        peak_start: NaiveTime,
        peak_end: NaiveTime,
    },
    Block {
        tiers: Vec<BlockTier>,
    },
}

impl RateConfiguration {
    /// The rate type this configuration shape belongs to
    pub fn rate_type(&self) -> RateType {
        match self {
            Self::Flat { .. } => RateType::Flat,
            Self::TimeOfUse { .. } => RateType::TimeOfUse,
            Self::Block { .. } => RateType::Block,
        }
    }

    pub fn encode(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|e| {
            DomainError::Configuration(format!("Cannot encode rate configuration: {}", e))
        })
    }

    pub fn decode(json: &str) -> DomainResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            DomainError::Configuration(format!("Cannot decode rate configuration: {}", e))
        })
    }

    /// Prices must be non-negative; block thresholds must ascend and only
    /// the last tier may be open.
    pub fn validate(&self) -> DomainResult<()> {
        let negative = |price: &Decimal| price.is_sign_negative() && !price.is_zero();
        match self {
            Self::Flat { price_per_kwh } => {
                if negative(price_per_kwh) {
                    return Err(DomainError::Configuration(
                        "Flat price must not be negative".to_string(),
                    ));
                }
            }
            Self::TimeOfUse {
                peak_price,
                off_peak_price,
                peak_start,
                peak_end,
            } => {
                if negative(peak_price) || negative(off_peak_price) {
                    return Err(DomainError::Configuration(
                        "Time-of-use prices must not be negative".to_string(),
                    ));
                }
                if peak_start == peak_end {
                    return Err(DomainError::Configuration(
                        "Time-of-use peak window is empty".to_string(),
                    ));
                }
            }
            Self::Block { tiers } => {
                if tiers.is_empty() {
                    return Err(DomainError::Configuration(
                        "Block rate needs at least one tier".to_string(),
                    ));
                }
                let mut previous: Option<Decimal> = None;
                for (i, tier) in tiers.iter().enumerate() {
                    if negative(&tier.price_per_kwh) {
                        return Err(DomainError::Configuration(format!(
                            "Block tier {} price must not be negative",
                            i
                        )));
                    }
                    match tier.up_to_kwh {
                        None if i + 1 != tiers.len() => {
                            return Err(DomainError::Configuration(
                                "Only the last block tier may be open-ended".to_string(),
                            ));
                        }
                        Some(limit) if previous.is_some_and(|p| limit <= p) => {
                            return Err(DomainError::Configuration(
                                "Block tier thresholds must ascend".to_string(),
                            ));
                        }
                        _ => {}
                    }
                    previous = tier.up_to_kwh;
                }
            }
        }
        Ok(())
    }
}

/// Billing cadence of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillingCadence {
    #[default]
    Monthly,
}

impl BillingCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MONTHLY" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// One pricing rule within a plan
#[derive(Debug, Clone)]
pub struct TariffRate {
    pub id: Uuid,
    pub plan_id: Uuid,
    /// Order within the plan; line items follow it
    pub position: i32,
    pub rate_type: RateType,
    /// Invoice line label, e.g. "Usage Charge"
    pub description: String,
    pub configuration: RateConfiguration,
}

impl TariffRate {
    /// Whether `rate_type` agrees with the configuration payload
    pub fn is_consistent(&self) -> bool {
        self.rate_type == self.configuration.rate_type()
    }
}

/// A named, dated bundle of rates
#[derive(Debug, Clone)]
pub struct TariffPlan {
    pub id: Uuid,
    /// e.g. "SG-RES-FLAT-2026"
    pub code: String,
    pub name: String,
    pub country: Country,
    pub billing_period: BillingCadence,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Ordered by `position`
    pub rates: Vec<TariffRate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binds a site to a plan for `[effective_from, effective_to)`;
/// open-ended when `effective_to` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTariffAssignment {
    pub id: Uuid,
    pub site_id: Uuid,
    pub plan_id: Uuid,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SiteTariffAssignment {
    pub fn new(
        site_id: Uuid,
        plan_id: Uuid,
        effective_from: DateTime<Utc>,
        effective_to: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            plan_id,
            effective_from,
            effective_to,
            created_at: Utc::now(),
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.effective_to.is_none()
    }

    /// Whether the assignment intersects `[start, end)`
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        let starts_before_end = end.map_or(true, |end| self.effective_from < end);
        let ends_after_start = self.effective_to.map_or(true, |to| to > start);
        starts_before_end && ends_after_start
    }
}
