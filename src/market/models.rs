use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A physical fish market whose prices are tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harbour {
    pub id: String,
    pub name: String,
    pub state: String,
    /// Epoch milliseconds of the last rate write for this harbour.
    pub last_updated_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    pub name_en: String,
    pub name_local: String,
    pub image_url: String,
}

/// How the submitting admin obtained a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationLevel {
    Verified,
    #[serde(rename = "Phone Call", alias = "PhoneCall")]
    PhoneCall,
    Unconfirmed,
}

impl VerificationLevel {
    /// Trust weight on a 1–10 scale.
    pub fn weight(self) -> u32 {
        match self {
            Self::Verified => 10,
            Self::PhoneCall => 5,
            Self::Unconfirmed => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::PhoneCall => "Phone Call",
            Self::Unconfirmed => "Unconfirmed",
        }
    }
}

impl FromStr for VerificationLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "verified" => Ok(Self::Verified),
            "phonecall" => Ok(Self::PhoneCall),
            "unconfirmed" => Ok(Self::Unconfirmed),
            _ => Err(ValidationError::UnknownVerificationLevel(s.to_string())),
        }
    }
}

impl std::fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price observation for a species at a harbour on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: String,
    pub harbour_id: String,
    pub species_id: String,
    pub price_per_kg: Decimal,
    pub date: NaiveDate,
    pub source_admin_id: String,
    pub verification_level: VerificationLevel,
    pub lots_checked: u32,
    pub rate_confidence_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    Up,
    Down,
    Same,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Same => write!(f, "SAME"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChangeResult {
    pub status: ChangeStatus,
    /// Non-negative, rounded to two decimals.
    pub percent_diff: Decimal,
    pub description: String,
}

/// Per-species view of a harbour, rebuilt on every read.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRateSummary {
    pub species: Species,
    pub latest_rate: Option<Rate>,
    pub previous_rate: Option<Rate>,
    pub change: RateChangeResult,
    /// Most recent rates, newest first.
    pub history: Vec<Rate>,
}

impl DailyRateSummary {
    pub fn latest_price(&self) -> Option<Decimal> {
        self.latest_rate.as_ref().map(|r| r.price_per_kg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleSummary {
    pub trend: String,
    pub action: String,
    pub outlook: String,
}

impl OracleSummary {
    /// Paragraph form used when showing the summary as one block of text.
    pub fn to_text(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.trend, self.action, self.outlook)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub phone_number: String,
    pub harbour_id_subscribed: String,
    pub opt_in_date: String,
}
