//! Typed row sets for the eight nightly extracts and helpers to load them from local
//! files. Field names are the canonical ones the calling layer has already resolved.

pub mod loader;
mod rows;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::warn;

pub use loader::{load_dataset_file, load_local_datasets, load_payload_file, FeedLoadError};
pub use rows::{
    LeasingRow, PricingRow, RecentLeaseRow, TradeOutRow, UnitDetailRow, UnitMixRow, UnitRow,
    WeeklySummaryRow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DatasetKind {
    Leasing,
    WeeklySummary,
    TradeOut,
    UnitDetails,
    Units,
    UnitMix,
    Pricing,
    RecentLeases,
}

impl DatasetKind {
    pub const ALL: [Self; 8] = [
        Self::Leasing,
        Self::WeeklySummary,
        Self::TradeOut,
        Self::UnitDetails,
        Self::Units,
        Self::UnitMix,
        Self::Pricing,
        Self::RecentLeases,
    ];

    /// Key used for the dataset in sync payloads and on the command line.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Leasing => "leasing",
            Self::WeeklySummary => "MMRData",
            Self::TradeOut => "unitbyunittradeout",
            Self::UnitDetails => "portfolioUnitDetails",
            Self::Units => "units",
            Self::UnitMix => "unitmix",
            Self::Pricing => "pricing",
            Self::RecentLeases => "recentrents",
        }
    }

    /// Environment variable holding a default file path for the dataset.
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Leasing => "KPI_DATASET_LEASING",
            Self::WeeklySummary => "KPI_DATASET_MMR",
            Self::TradeOut => "KPI_DATASET_TRADEOUT",
            Self::UnitDetails => "KPI_DATASET_PUD",
            Self::Units => "KPI_DATASET_UNITS",
            Self::UnitMix => "KPI_DATASET_UNITMIX",
            Self::Pricing => "KPI_DATASET_PRICING",
            Self::RecentLeases => "KPI_DATASET_RECENTRENTS",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(key))
    }

    pub fn known_keys() -> String {
        Self::ALL.map(Self::key).join(", ")
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The eight row sets of one nightly run. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedSet {
    #[serde(rename = "leasing")]
    pub leasing: Vec<LeasingRow>,
    #[serde(rename = "MMRData")]
    pub weekly_summary: Vec<WeeklySummaryRow>,
    #[serde(rename = "unitbyunittradeout")]
    pub trade_out: Vec<TradeOutRow>,
    #[serde(rename = "portfolioUnitDetails")]
    pub unit_details: Vec<UnitDetailRow>,
    #[serde(rename = "units")]
    pub units: Vec<UnitRow>,
    #[serde(rename = "unitmix")]
    pub unit_mix: Vec<UnitMixRow>,
    #[serde(rename = "pricing")]
    pub pricing: Vec<PricingRow>,
    #[serde(rename = "recentrents")]
    pub recent_leases: Vec<RecentLeaseRow>,
}

impl FeedSet {
    /// Builds a feed set from a sync payload object (`{"leasing": [...], ...}`). Unknown
    /// dataset keys and malformed rows are skipped with a warning.
    pub fn from_payload(payload: Value) -> Result<Self, FeedLoadError> {
        let Value::Object(datasets) = payload else {
            return Err(FeedLoadError::InvalidPayload);
        };

        let mut feeds = Self::default();
        for (key, rows) in datasets {
            let Some(kind) = DatasetKind::from_key(&key) else {
                warn!(dataset = %key, "skipping unknown dataset key");
                continue;
            };
            feeds.append_rows(kind, loader::rows_from_json(rows));
        }

        Ok(feeds)
    }

    /// Decodes and appends rows for one dataset, returning how many were accepted.
    pub fn append_rows(&mut self, kind: DatasetKind, rows: Vec<Value>) -> usize {
        match kind {
            DatasetKind::Leasing => extend_decoded(&mut self.leasing, kind, rows),
            DatasetKind::WeeklySummary => extend_decoded(&mut self.weekly_summary, kind, rows),
            DatasetKind::TradeOut => extend_decoded(&mut self.trade_out, kind, rows),
            DatasetKind::UnitDetails => extend_decoded(&mut self.unit_details, kind, rows),
            DatasetKind::Units => extend_decoded(&mut self.units, kind, rows),
            DatasetKind::UnitMix => extend_decoded(&mut self.unit_mix, kind, rows),
            DatasetKind::Pricing => extend_decoded(&mut self.pricing, kind, rows),
            DatasetKind::RecentLeases => extend_decoded(&mut self.recent_leases, kind, rows),
        }
    }

    pub fn row_count(&self, kind: DatasetKind) -> usize {
        match kind {
            DatasetKind::Leasing => self.leasing.len(),
            DatasetKind::WeeklySummary => self.weekly_summary.len(),
            DatasetKind::TradeOut => self.trade_out.len(),
            DatasetKind::UnitDetails => self.unit_details.len(),
            DatasetKind::Units => self.units.len(),
            DatasetKind::UnitMix => self.unit_mix.len(),
            DatasetKind::Pricing => self.pricing.len(),
            DatasetKind::RecentLeases => self.recent_leases.len(),
        }
    }

    pub fn total_rows(&self) -> usize {
        DatasetKind::ALL
            .into_iter()
            .map(|kind| self.row_count(kind))
            .sum()
    }

    /// Datasets holding at least one row, in canonical order.
    pub fn present(&self) -> Vec<DatasetKind> {
        DatasetKind::ALL
            .into_iter()
            .filter(|kind| self.row_count(*kind) > 0)
            .collect()
    }

    /// Appends every row of `other`.
    pub fn merge(&mut self, other: FeedSet) {
        self.leasing.extend(other.leasing);
        self.weekly_summary.extend(other.weekly_summary);
        self.trade_out.extend(other.trade_out);
        self.unit_details.extend(other.unit_details);
        self.units.extend(other.units);
        self.unit_mix.extend(other.unit_mix);
        self.pricing.extend(other.pricing);
        self.recent_leases.extend(other.recent_leases);
    }

    /// Drops every dataset except `kind`.
    pub fn retain_only(self, kind: DatasetKind) -> Self {
        let mut kept = Self::default();
        match kind {
            DatasetKind::Leasing => kept.leasing = self.leasing,
            DatasetKind::WeeklySummary => kept.weekly_summary = self.weekly_summary,
            DatasetKind::TradeOut => kept.trade_out = self.trade_out,
            DatasetKind::UnitDetails => kept.unit_details = self.unit_details,
            DatasetKind::Units => kept.units = self.units,
            DatasetKind::UnitMix => kept.unit_mix = self.unit_mix,
            DatasetKind::Pricing => kept.pricing = self.pricing,
            DatasetKind::RecentLeases => kept.recent_leases = self.recent_leases,
        }
        kept
    }
}

fn extend_decoded<T: DeserializeOwned>(
    target: &mut Vec<T>,
    kind: DatasetKind,
    rows: Vec<Value>,
) -> usize {
    let before = target.len();
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<T>(row) {
            Ok(decoded) => target.push(decoded),
            Err(err) => warn!(
                dataset = kind.key(),
                row = index,
                error = %err,
                "skipping malformed feed row"
            ),
        }
    }
    target.len() - before
}
