//! Immutable values flowing through a scrape run
//!
//! `ScrapeTarget` -> `RenderedPage` -> `RestaurantRecord` -> `ScrapeResult`.
//! Nothing here is mutated after construction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Config;
use crate::error::ErrorKind;

/// One restaurant page to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    /// Position in the submitted list; results are keyed by it
    pub id: usize,
    pub url: String,
    /// Restaurant slug taken from the URL path
    pub slug: String,
    /// Per-target override of `Config::timeout_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ScrapeTarget {
    pub fn timeout(&self, config: &Config) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(config.timeout_secs))
    }
}

/// Page handle returned by the fetcher once content has settled
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub requested_url: String,
    pub final_url: String,
    /// Full document HTML after the last scroll
    pub html: String,
    /// Menu container HTML captured after each scroll, in capture order
    pub menu_snapshots: Vec<String>,
    /// Menu-shaped object found in the page's JavaScript state
    pub page_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hours {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
}

impl Hours {
    pub fn is_empty(&self) -> bool {
        self.pickup.is_none() && self.delivery.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub fee: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    /// Parsed price; `None` when the text carries no number ("Market Price")
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Source-site item identifier (`Item123` container id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Items in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub name: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantRecord {
    pub name: String,
    pub url: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub price_range: Option<String>,
    pub cuisines: Vec<String>,
    pub hours: Hours,
    pub structured_address: StructuredAddress,
    pub delivery: DeliveryInfo,
    pub reviews: Vec<Review>,
    /// Categories in display order
    pub menu: Vec<MenuCategory>,
    pub scraped_at: DateTime<Utc>,
}

impl RestaurantRecord {
    pub fn item_count(&self) -> usize {
        self.menu.iter().map(|c| c.items.len()).sum()
    }
}

/// Optional restaurant fields tracked for partial-extraction diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Address,
    Phone,
    Rating,
    ReviewCount,
    PriceRange,
    Cuisines,
    Hours,
    Menu,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        record: RestaurantRecord,
        /// Optional fields that no strategy could fill
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        missing: Vec<Field>,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

/// Terminal outcome for exactly one submitted target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub target: ScrapeTarget,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
}

impl ScrapeResult {
    pub fn failure(target: ScrapeTarget, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            target,
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
            elapsed_ms: 0,
        }
    }

    pub fn record(&self) -> Option<&RestaurantRecord> {
        match &self.outcome {
            Outcome::Success { record, .. } => Some(record),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(&self.outcome, Outcome::Success { missing, .. } if !missing.is_empty())
    }
}
