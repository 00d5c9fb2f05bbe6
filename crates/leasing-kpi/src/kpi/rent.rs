use super::classify::UnitClassification;
use super::dedup::CanonicalUnit;
use super::normalizer::normalize_unit_token;
use super::occupancy::round2;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Collapses a marketing floor-plan name to its bed/bath type.
///
/// Explicit bed/bath patterns ("1x1", "2BR2BA", "1 Bed 1 Bath") are read directly.
/// Otherwise the letter prefix convention applies: S/E studio, A one bedroom, B two,
/// C three, D four.
pub fn base_plan_type(floor_plan: Option<&str>) -> String {
    let plan = floor_plan.map(normalize_unit_token).unwrap_or_default();
    if plan.is_empty() {
        return "UNKNOWN".to_string();
    }

    if let Some((beds, baths)) = bed_bath_digits(&plan) {
        return format!("{beds}B{baths}B");
    }

    if plan.starts_with("STUDIO") || plan.starts_with("EFF") {
        return "STUDIO".to_string();
    }

    let mut chars = plan.chars();
    if let (Some(prefix), Some(next)) = (chars.next(), chars.next()) {
        if next.is_ascii_digit() {
            let mapped = match prefix {
                'S' | 'E' => Some("STUDIO"),
                'A' => Some("1B1B"),
                'B' => Some("2B2B"),
                'C' => Some("3B2B"),
                'D' => Some("4B2B"),
                _ => None,
            };
            if let Some(mapped) = mapped {
                return mapped.to_string();
            }
        }
    }

    plan
}

fn bed_bath_digits(plan: &str) -> Option<(char, char)> {
    const SEPARATORS: [&str; 7] = ["X", "B", "BR", "BD", "BED", "BEDS", "BEDROOM"];

    let mut chars = plan.chars();
    let beds = chars.next().filter(char::is_ascii_digit)?;
    let rest = chars.as_str();
    let split = rest.find(|c: char| c.is_ascii_digit())?;
    let (separator, tail) = rest.split_at(split);
    if !SEPARATORS.contains(&separator) {
        return None;
    }

    let baths = tail.chars().next()?;
    Some((beds, baths))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanTypeRent {
    pub plan_type: String,
    pub physical_units: u32,
    pub rent_samples: u32,
    pub average_rent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightedRent {
    pub weighted_average_rent: Option<f64>,
    pub by_plan_type: Vec<PlanTypeRent>,
}

fn eligible_for_rent(
    unit: &CanonicalUnit,
    class: UnitClassification,
    report_date: Option<NaiveDate>,
) -> bool {
    match class {
        UnitClassification::Occupied | UnitClassification::OccupiedNoticePreleased => true,
        UnitClassification::VacantLeased => !unit.record.lease_starts_after(report_date),
        _ => false,
    }
}

/// Unit-count weighted average of per-plan-type mean rents.
///
/// Each plan type's mean over its leased units with a positive rent is weighted by the
/// number of physical units of that type in the snapshot. Plan types with no rent
/// samples drop out of both numerator and denominator.
pub fn weighted_rent(
    classified: &[(&CanonicalUnit, UnitClassification)],
    report_date: Option<NaiveDate>,
) -> WeightedRent {
    #[derive(Default)]
    struct Group {
        physical: u32,
        rents: Vec<f64>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for (unit, class) in classified {
        let group = groups
            .entry(base_plan_type(unit.record.floor_plan.as_deref()))
            .or_default();
        group.physical += 1;

        if eligible_for_rent(unit, *class, report_date) {
            if let Some(rent) = unit.record.monthly_rent() {
                group.rents.push(rent);
            }
        }
    }

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let by_plan_type = groups
        .into_iter()
        .map(|(plan_type, group)| {
            let average = (!group.rents.is_empty())
                .then(|| group.rents.iter().sum::<f64>() / group.rents.len() as f64);
            if let Some(average) = average {
                numerator += average * f64::from(group.physical);
                denominator += f64::from(group.physical);
            }
            PlanTypeRent {
                plan_type,
                physical_units: group.physical,
                rent_samples: group.rents.len() as u32,
                average_rent: average.map(round2),
            }
        })
        .collect();

    WeightedRent {
        weighted_average_rent: (denominator > 0.0).then(|| round2(numerator / denominator)),
        by_plan_type,
    }
}
