use super::domain::{UnitKey, UnitRecord};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// One row per physical unit, chosen from the rows at the property's latest report date.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalUnit {
    pub key: UnitKey,
    pub record: UnitRecord,
}

/// Deduplicated view of a property at its latest report date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitSnapshot {
    pub report_date: Option<NaiveDate>,
    pub units: Vec<CanonicalUnit>,
    /// Units that had an applicant row on the report date, whichever row won.
    pub applicant_keys: BTreeSet<UnitKey>,
}

impl UnitSnapshot {
    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    pub fn has_applicant(&self, key: &UnitKey) -> bool {
        self.applicant_keys.contains(key)
    }
}

pub fn latest_report_date(rows: &[UnitRecord]) -> Option<NaiveDate> {
    rows.iter().filter_map(|row| row.report_date).max()
}

/// Collapses one property's rows to a single row per unit.
///
/// Only rows at the latest report date take part (all rows when none is dated). Among
/// rows sharing a unit key the lowest status priority wins, then the newest report date,
/// then the first row seen. Rows without a unit identifier are each kept as their own
/// unit so they are never undercounted.
pub fn deduplicate(rows: &[UnitRecord]) -> UnitSnapshot {
    let report_date = latest_report_date(rows);
    let current = rows
        .iter()
        .filter(|row| report_date.is_none() || row.report_date == report_date);

    let mut winners: BTreeMap<UnitKey, &UnitRecord> = BTreeMap::new();
    let mut applicant_keys = BTreeSet::new();
    let mut unidentified = 0usize;

    for row in current {
        let key = match row.identity() {
            Some(identity) => UnitKey::Identified(identity),
            None => {
                unidentified += 1;
                UnitKey::Unidentified(unidentified - 1)
            }
        };

        if row.status.applicant && matches!(key, UnitKey::Identified(_)) {
            applicant_keys.insert(key.clone());
        }

        winners
            .entry(key)
            .and_modify(|current| {
                if outranks(row, current) {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    let units = winners
        .into_iter()
        .map(|(key, record)| CanonicalUnit {
            key,
            record: record.clone(),
        })
        .collect();

    UnitSnapshot {
        report_date,
        units,
        applicant_keys,
    }
}

fn outranks(candidate: &UnitRecord, current: &UnitRecord) -> bool {
    let candidate_priority = candidate.status.dedup_priority();
    let current_priority = current.status.dedup_priority();
    if candidate_priority != current_priority {
        return candidate_priority < current_priority;
    }
    candidate.report_date > current.report_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::fixtures::{day, record};

    #[test]
    fn keeps_only_latest_report_date() {
        let rows = vec![
            record(Some("101"), "Vacant", day(2025, 9, 23)),
            record(Some("101"), "Occupied", day(2025, 9, 24)),
            record(Some("102"), "Occupied", day(2025, 9, 23)),
        ];
        let snapshot = deduplicate(&rows);

        assert_eq!(snapshot.report_date, Some(day(2025, 9, 24)));
        assert_eq!(snapshot.total_units(), 1);
        assert_eq!(snapshot.units[0].record.status_text.as_deref(), Some("Occupied"));
    }

    #[test]
    fn picks_winner_by_status_priority() {
        let report = day(2025, 9, 24);
        let rows = vec![
            record(Some("101"), "Applicant", report),
            record(Some("101"), "Vacant", report),
            record(Some("101"), "Vacant-Leased", report),
            record(Some("102"), "Model", report),
            record(Some("102"), "Pending", report),
        ];
        let snapshot = deduplicate(&rows);

        let statuses: Vec<_> = snapshot
            .units
            .iter()
            .map(|unit| unit.record.status_text.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(statuses, vec!["Vacant-Leased", "Pending"]);
        assert!(snapshot
            .has_applicant(&UnitKey::Identified("A1|101".to_string())));
        assert!(!snapshot
            .has_applicant(&UnitKey::Identified("A1|102".to_string())));
    }

    #[test]
    fn rows_without_identifiers_are_never_merged() {
        let report = day(2025, 9, 24);
        let rows = vec![
            record(None, "Occupied", report),
            record(None, "Occupied", report),
            record(Some("  "), "Vacant", report),
            record(Some("101"), "Occupied", report),
        ];
        let snapshot = deduplicate(&rows);
        assert_eq!(snapshot.total_units(), 4);
    }

    #[test]
    fn undated_rows_are_all_considered() {
        let mut first = record(Some("101"), "Occupied", day(2025, 9, 24));
        first.report_date = None;
        let mut second = record(Some("102"), "Vacant", day(2025, 9, 24));
        second.report_date = None;

        let snapshot = deduplicate(&[first, second]);
        assert_eq!(snapshot.report_date, None);
        assert_eq!(snapshot.total_units(), 2);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let report = day(2025, 9, 24);
        let rows = vec![
            record(Some("101"), "Applicant", report),
            record(Some("101"), "Occupied", report),
            record(None, "Vacant", report),
            record(Some("102"), "Vacant", report),
            record(None, "Model", report),
            record(Some("103"), "Down", day(2025, 9, 20)),
        ];
        let once = deduplicate(&rows);
        let replay: Vec<UnitRecord> = once.units.iter().map(|unit| unit.record.clone()).collect();
        let twice = deduplicate(&replay);

        assert_eq!(once.units, twice.units);
        assert_eq!(once.report_date, twice.report_date);
    }
}
