use super::domain::UnitRecord;
use super::normalizer::{fold_text, parse_count, parse_date};
use crate::feeds::LeasingRow;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocitySource {
    LeasingFeed,
    UnitDetail,
    Unavailable,
}

impl VelocitySource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LeasingFeed => "Leasing feed",
            Self::UnitDetail => "Unit detail",
            Self::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseKind {
    New,
    Renewal,
}

/// Signed leases in the trailing 7 and 28 days. The new/renewal split is `None` when
/// the source cannot tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseVelocity {
    pub source: VelocitySource,
    pub source_label: String,
    pub as_of: Option<NaiveDate>,
    pub leases_7d: Option<u32>,
    pub leases_28d: Option<u32>,
    pub new_leases_7d: Option<u32>,
    pub new_leases_28d: Option<u32>,
    pub renewals_7d: Option<u32>,
    pub renewals_28d: Option<u32>,
}

impl LeaseVelocity {
    pub fn unavailable() -> Self {
        Self::empty(VelocitySource::Unavailable, None)
    }

    fn empty(source: VelocitySource, as_of: Option<NaiveDate>) -> Self {
        Self {
            source,
            source_label: source.label().to_string(),
            as_of,
            leases_7d: None,
            leases_28d: None,
            new_leases_7d: None,
            new_leases_28d: None,
            renewals_7d: None,
            renewals_28d: None,
        }
    }
}

/// Reads the property's latest leasing-feed row. Returns `None` when there is no row
/// or the latest one has no readable count.
pub fn feed_velocity(rows: &[&LeasingRow]) -> Option<LeaseVelocity> {
    let dated = |row: &LeasingRow| row.report_date.as_deref().and_then(parse_date);
    let latest = rows
        .iter()
        .copied()
        .enumerate()
        .max_by_key(|(index, row)| (dated(*row), *index))
        .map(|(_, row)| row)?;

    let count = |value: &Option<String>| value.as_deref().and_then(parse_count);
    let velocity = LeaseVelocity {
        leases_7d: count(&latest.leases_7d),
        leases_28d: count(&latest.leases_28d),
        new_leases_7d: count(&latest.new_leases_7d),
        new_leases_28d: count(&latest.new_leases_28d),
        renewals_7d: count(&latest.renewals_7d),
        renewals_28d: count(&latest.renewals_28d),
        ..LeaseVelocity::empty(VelocitySource::LeasingFeed, dated(latest))
    };

    let readable = [
        velocity.leases_7d,
        velocity.leases_28d,
        velocity.new_leases_7d,
        velocity.new_leases_28d,
        velocity.renewals_7d,
        velocity.renewals_28d,
    ]
    .iter()
    .any(Option::is_some);

    readable.then_some(velocity)
}

fn signed_date(record: &UnitRecord) -> Option<NaiveDate> {
    record
        .application_signed
        .or(record.lease_signed)
        .or(record.application_date)
}

fn lease_kind(record: &UnitRecord) -> LeaseKind {
    let lease_type = record.lease_type.as_deref().map(fold_text).unwrap_or_default();
    if lease_type.contains("renew") {
        LeaseKind::Renewal
    } else if lease_type.contains("new") {
        LeaseKind::New
    } else if record.status.renewal {
        LeaseKind::Renewal
    } else {
        LeaseKind::New
    }
}

/// One event per (unit, signed date) across every snapshot of the property. Rows
/// without a unit identifier or a signed date are skipped.
pub fn lease_events(records: &[UnitRecord]) -> BTreeMap<(String, NaiveDate), LeaseKind> {
    let mut events = BTreeMap::new();
    for record in records {
        let (Some(identity), Some(signed)) = (record.identity(), signed_date(record)) else {
            continue;
        };
        events
            .entry((identity, signed))
            .or_insert_with(|| lease_kind(record));
    }
    events
}

/// Counts lease events signed in `[reference - 7, reference]` and
/// `[reference - 28, reference]`.
pub fn detail_velocity(records: &[UnitRecord], reference: NaiveDate) -> LeaseVelocity {
    let window_start = |days: u64| reference.checked_sub_days(Days::new(days));
    let (start_7d, start_28d) = (window_start(7), window_start(28));

    let mut totals = [[0u32; 2]; 2];
    for ((_, signed), kind) in lease_events(records) {
        if signed > reference {
            continue;
        }
        let slot = match kind {
            LeaseKind::New => 0,
            LeaseKind::Renewal => 1,
        };
        if start_7d.is_some_and(|start| signed >= start) {
            totals[0][slot] += 1;
        }
        if start_28d.is_some_and(|start| signed >= start) {
            totals[1][slot] += 1;
        }
    }

    let [[new_7d, renewal_7d], [new_28d, renewal_28d]] = totals;
    LeaseVelocity {
        leases_7d: Some(new_7d + renewal_7d),
        leases_28d: Some(new_28d + renewal_28d),
        new_leases_7d: Some(new_7d),
        new_leases_28d: Some(new_28d),
        renewals_7d: Some(renewal_7d),
        renewals_28d: Some(renewal_28d),
        ..LeaseVelocity::empty(VelocitySource::UnitDetail, Some(reference))
    }
}

/// Leasing-feed figures when a usable row exists, else counts derived from unit detail,
/// else unavailable.
pub fn resolve_velocity(
    feed_rows: &[&LeasingRow],
    records: &[UnitRecord],
    reference: NaiveDate,
) -> LeaseVelocity {
    if let Some(velocity) = feed_velocity(feed_rows) {
        return velocity;
    }
    if records.is_empty() {
        return LeaseVelocity::unavailable();
    }
    detail_velocity(records, reference)
}
