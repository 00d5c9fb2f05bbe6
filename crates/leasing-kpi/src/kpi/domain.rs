use super::normalizer::{normalize_unit_token, parse_date, parse_number};
use super::property::{PropertyKey, PropertyRegistry};
use super::status::ParsedStatus;
use crate::feeds::UnitDetailRow;
use chrono::NaiveDate;
use serde::Serialize;

/// A unit-detail row after normalization: dates and amounts parsed, the status text
/// reduced to a [`ParsedStatus`], and the property resolved to its registry key.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub property: PropertyKey,
    pub unit_label: Option<String>,
    pub floor_plan: Option<String>,
    pub status_text: Option<String>,
    pub status: ParsedStatus,
    pub lease_type: Option<String>,
    pub notice_date: Option<NaiveDate>,
    pub move_in_date: Option<NaiveDate>,
    pub move_out_date: Option<NaiveDate>,
    pub lease_start: Option<NaiveDate>,
    pub lease_end: Option<NaiveDate>,
    pub application_signed: Option<NaiveDate>,
    pub lease_signed: Option<NaiveDate>,
    pub application_date: Option<NaiveDate>,
    pub rent: Option<f64>,
    pub effective_rent: Option<f64>,
    /// Later of the row's `report_date` and `as_of_date`.
    pub report_date: Option<NaiveDate>,
}

impl UnitRecord {
    /// Returns `None` for rows that do not name a property.
    pub fn from_row(row: &UnitDetailRow, registry: &mut PropertyRegistry) -> Option<Self> {
        let property = registry.register(row.property.as_deref()?)?;
        let date = |value: &Option<String>| value.as_deref().and_then(parse_date);
        let amount = |value: &Option<String>| value.as_deref().and_then(parse_number);

        let report_date = match (date(&row.report_date), date(&row.as_of_date)) {
            (Some(report), Some(as_of)) => Some(report.max(as_of)),
            (report, as_of) => report.or(as_of),
        };

        Some(Self {
            property,
            unit_label: row
                .unit_number
                .clone()
                .or_else(|| row.unit_designation.clone()),
            floor_plan: row.floor_plan.clone(),
            status: ParsedStatus::from_optional(row.lease_status.as_deref()),
            status_text: row.lease_status.clone(),
            lease_type: row.lease_type.clone(),
            notice_date: date(&row.notice_date),
            move_in_date: date(&row.move_in_date),
            move_out_date: date(&row.move_out_date),
            lease_start: date(&row.lease_start),
            lease_end: date(&row.lease_end),
            application_signed: date(&row.application_signed),
            lease_signed: date(&row.lease_signed),
            application_date: date(&row.application_date),
            rent: amount(&row.rent),
            effective_rent: amount(&row.effective_rent),
            report_date,
        })
    }

    /// `FLOORPLAN|UNIT` with both parts normalized, or `None` when the row carries no
    /// unit number or designation.
    pub fn identity(&self) -> Option<String> {
        let unit = self
            .unit_label
            .as_deref()
            .map(normalize_unit_token)
            .filter(|token| !token.is_empty())?;
        let plan = self
            .floor_plan
            .as_deref()
            .map(normalize_unit_token)
            .unwrap_or_default();
        Some(format!("{plan}|{unit}"))
    }

    /// Monthly rent used for averaging: lease rent, else effective rent; non-positive
    /// amounts count as missing.
    pub fn monthly_rent(&self) -> Option<f64> {
        self.rent
            .filter(|rent| *rent > 0.0)
            .or_else(|| self.effective_rent.filter(|rent| *rent > 0.0))
    }

    /// True when the lease starts after `reference`. A missing lease start is never in the
    /// future.
    pub fn lease_starts_after(&self, reference: Option<NaiveDate>) -> bool {
        match (self.lease_start, reference) {
            (Some(start), Some(reference)) => start > reference,
            _ => false,
        }
    }
}

/// Identity of a physical unit inside one property snapshot. Rows without a unit number
/// are never merged; each keeps its own ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKey {
    Identified(String),
    Unidentified(usize),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    /// Minimal record for the fixture property "Oak Park".
    pub(crate) fn record(unit: Option<&str>, status: &str, report: NaiveDate) -> UnitRecord {
        UnitRecord {
            property: PropertyKey::parse("Oak Park").expect("property"),
            unit_label: unit.map(str::to_string),
            floor_plan: Some("A1".to_string()),
            status_text: Some(status.to_string()),
            status: ParsedStatus::parse(status),
            lease_type: None,
            notice_date: None,
            move_in_date: None,
            move_out_date: None,
            lease_start: None,
            lease_end: None,
            application_signed: None,
            lease_signed: None,
            application_date: None,
            rent: None,
            effective_rent: None,
            report_date: Some(report),
        }
    }
}
