//! Customer and site domain entities

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice currency (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    SGD,
    AUD,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SGD => "SGD",
            Self::AUD => "AUD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SGD" => Some(Self::SGD),
            "AUD" => Some(Self::AUD),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Market a customer or site belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    SG,
    AU,
}

impl Country {
    pub fn currency(&self) -> Currency {
        match self {
            Self::SG => Currency::SGD,
            Self::AU => Currency::AUD,
        }
    }

    /// Timezone assumed for a new site when none is given
    pub fn default_timezone(&self) -> Tz {
        match self {
            Self::SG => chrono_tz::Asia::Singapore,
            Self::AU => chrono_tz::Australia::Sydney,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SG => "SG",
            Self::AU => "AU",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SG" => Some(Self::SG),
            "AU" => Some(Self::AU),
            _ => None,
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billed party
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub country: Country,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>, country: Country) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            country,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Metered supply point owned by a customer
#[derive(Debug, Clone)]
pub struct Site {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Meter identifier, e.g. an NMI
    pub identifier: String,
    pub country: Country,
    pub region: String,
    pub address: Option<String>,
    /// Local timezone used for time-of-use classification and invoice labels
    pub timezone: Tz,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(
        customer_id: Uuid,
        identifier: impl Into<String>,
        country: Country,
        region: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            identifier: identifier.into(),
            country,
            region: region.into(),
            address: None,
            timezone: country.default_timezone(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Label of the zero-amount header line preceding the site's charges
    pub fn header_label(&self) -> String {
        format!("Site: {} ({})", self.identifier, self.region)
    }

    pub fn pricing_context(&self) -> SitePricingContext {
        SitePricingContext {
            id: self.id,
            timezone: self.timezone,
        }
    }
}

/// The only site attributes the pricing engine needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitePricingContext {
    pub id: Uuid,
    pub timezone: Tz,
}
