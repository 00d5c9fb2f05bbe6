use super::classify::UnitClassification;
use super::dedup::CanonicalUnit;
use super::normalizer::normalize_unit_token;
use serde::Serialize;
use std::collections::BTreeMap;

/// `part / total` in percentage points rounded to two decimals; `None` when there is
/// nothing to divide by.
pub fn percent(part: f64, total: f64) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    Some(round2(part / total * 100.0))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationCountEntry {
    pub classification: UnitClassification,
    pub classification_label: String,
    pub units: u32,
}

/// Units per classification. Every unit lands in exactly one bucket.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClassificationCounts {
    counts: BTreeMap<UnitClassification, u32>,
}

impl ClassificationCounts {
    pub fn tally<'a>(classes: impl IntoIterator<Item = &'a UnitClassification>) -> Self {
        let mut counts = BTreeMap::new();
        for class in classes {
            *counts.entry(*class).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn get(&self, class: UnitClassification) -> u32 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn occupied(&self) -> u32 {
        self.sum_where(UnitClassification::is_occupied)
    }

    pub fn leased(&self) -> u32 {
        self.sum_where(UnitClassification::is_leased)
    }

    fn sum_where(&self, keep: fn(UnitClassification) -> bool) -> u32 {
        self.counts
            .iter()
            .filter(|(class, _)| keep(**class))
            .map(|(_, units)| units)
            .sum()
    }

    pub fn entries(&self) -> Vec<ClassificationCountEntry> {
        UnitClassification::ALL
            .into_iter()
            .map(|classification| ClassificationCountEntry {
                classification,
                classification_label: classification.label().to_string(),
                units: self.get(classification),
            })
            .collect()
    }
}

impl Serialize for ClassificationCounts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancySummary {
    pub total_units: u32,
    pub occupied_units: u32,
    pub leased_units: u32,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
}

impl OccupancySummary {
    pub fn new(total_units: u32, occupied_units: u32, leased_units: u32) -> Self {
        Self {
            total_units,
            occupied_units,
            leased_units,
            occupancy_pct: percent(f64::from(occupied_units), f64::from(total_units)),
            leased_pct: percent(f64::from(leased_units), f64::from(total_units)),
        }
    }

    pub fn from_counts(counts: &ClassificationCounts) -> Self {
        Self::new(counts.total(), counts.occupied(), counts.leased())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorPlanBreakdown {
    pub floor_plan: String,
    pub total_units: u32,
    pub occupied_units: u32,
    pub leased_units: u32,
    pub vacant_units: u32,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
}

/// Per-floor-plan occupancy, ordered by normalized plan name. Units without a plan are
/// grouped under `UNKNOWN`.
pub fn floor_plan_breakdown(
    classified: &[(&CanonicalUnit, UnitClassification)],
) -> Vec<FloorPlanBreakdown> {
    let mut plans: BTreeMap<String, Vec<UnitClassification>> = BTreeMap::new();
    for (unit, class) in classified {
        let plan = unit
            .record
            .floor_plan
            .as_deref()
            .map(normalize_unit_token)
            .filter(|plan| !plan.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        plans.entry(plan).or_default().push(*class);
    }

    plans
        .into_iter()
        .map(|(floor_plan, classes)| {
            let counts = ClassificationCounts::tally(&classes);
            let summary = OccupancySummary::from_counts(&counts);
            FloorPlanBreakdown {
                floor_plan,
                total_units: summary.total_units,
                occupied_units: summary.occupied_units,
                leased_units: summary.leased_units,
                vacant_units: summary.total_units - summary.occupied_units,
                occupancy_pct: summary.occupancy_pct,
                leased_pct: summary.leased_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::fixtures::{day, record};
    use crate::kpi::domain::UnitKey;

    #[test]
    fn percent_is_none_without_units() {
        assert_eq!(percent(3.0, 0.0), None);
        assert_eq!(percent(2.0, 3.0), Some(66.67));
    }

    #[test]
    fn counts_partition_units() {
        let classes = [
            UnitClassification::Occupied,
            UnitClassification::Occupied,
            UnitClassification::OccupiedNoticeNotPreleased,
            UnitClassification::VacantLeased,
            UnitClassification::Model,
        ];
        let counts = ClassificationCounts::tally(&classes);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.occupied(), 3);
        assert_eq!(counts.leased(), 3);

        let summary = OccupancySummary::from_counts(&counts);
        assert_eq!(summary.occupancy_pct, Some(60.0));

        let entries = counts.entries();
        assert_eq!(entries.len(), UnitClassification::ALL.len());
        assert_eq!(entries.iter().map(|entry| entry.units).sum::<u32>(), 5);
    }

    #[test]
    fn empty_summary_has_null_percentages() {
        let summary = OccupancySummary::new(0, 0, 0);
        assert!(summary.occupancy_pct.is_none());
        assert!(summary.leased_pct.is_none());
    }

    #[test]
    fn breakdown_groups_by_floor_plan() {
        let report = day(2025, 9, 24);
        let mut studio = record(Some("201"), "Vacant", report);
        studio.floor_plan = Some("s-1".to_string());
        let units = [
            CanonicalUnit {
                key: UnitKey::Identified("A1|101".into()),
                record: record(Some("101"), "Occupied", report),
            },
            CanonicalUnit {
                key: UnitKey::Identified("S1|201".into()),
                record: studio,
            },
        ];
        let classified = vec![
            (&units[0], UnitClassification::Occupied),
            (&units[1], UnitClassification::VacantPlain),
        ];

        let breakdown = floor_plan_breakdown(&classified);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].floor_plan, "A1");
        assert_eq!(breakdown[0].occupancy_pct, Some(100.0));
        assert_eq!(breakdown[1].floor_plan, "S1");
        assert_eq!(breakdown[1].vacant_units, 1);
    }
}
