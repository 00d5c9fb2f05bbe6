use super::availability::{compute_availability, AvailabilityBreakdown};
use super::classify::classify_snapshot;
use super::dedup::deduplicate;
use super::index::{FeedIndex, PropertyRows};
use super::lookahead::{project_occupancy, LookaheadConfig, LookaheadProjection};
use super::normalizer::{parse_count, parse_date, parse_number, parse_percent};
use super::occupancy::{
    floor_plan_breakdown, percent, round2, ClassificationCounts, FloorPlanBreakdown,
    OccupancySummary,
};
use super::property::{PropertyKey, PropertyMap};
use super::rent::{weighted_rent, PlanTypeRent};
use super::velocity::{resolve_velocity, LeaseVelocity};
use crate::feeds::{FeedSet, UnitMixRow, WeeklySummaryRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_RECENT_LEASE_LIMIT: usize = 10;

/// Inputs that are fixed for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiOptions {
    /// Start of the lookahead window.
    pub today: NaiveDate,
    /// Reference date for velocity windows; defaults to `today`.
    pub as_of: Option<NaiveDate>,
    pub lookahead: LookaheadConfig,
    pub recent_lease_limit: usize,
}

impl KpiOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            as_of: None,
            lookahead: LookaheadConfig::default(),
            recent_lease_limit: DEFAULT_RECENT_LEASE_LIMIT,
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.as_of.unwrap_or(self.today)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancySource {
    UnitDetail,
    UnitMix,
    WeeklySummary,
    Unavailable,
}

impl OccupancySource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::UnitDetail => "Unit detail",
            Self::UnitMix => "Unit mix",
            Self::WeeklySummary => "Weekly summary",
            Self::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyKpiRecord {
    pub property: String,
    pub canonical_key: String,
    pub status: Option<String>,
    pub occupancy_source: OccupancySource,
    pub occupancy_source_label: String,
    pub report_date: Option<NaiveDate>,
    pub total_units: u32,
    pub occupied_units: u32,
    pub leased_units: u32,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
    /// Only derivable from unit detail.
    pub available_units: Option<u32>,
    pub budgeted_occupancy_pct: Option<f64>,
    pub budgeted_occupied_units: Option<u32>,
    pub budgeted_leased_pct: Option<f64>,
    /// Occupancy minus budgeted occupancy, in percentage points.
    pub delta_to_budget: Option<f64>,
    pub weighted_average_rent: Option<f64>,
    pub velocity: LeaseVelocity,
    pub lookahead: Option<LookaheadProjection>,
    pub availability: Option<AvailabilityBreakdown>,
    pub classification_counts: Option<ClassificationCounts>,
    pub rent_by_plan_type: Vec<PlanTypeRent>,
    pub floor_plans: Vec<FloorPlanBreakdown>,
    pub overridden: bool,
}

impl PropertyKpiRecord {
    fn refresh_delta(&mut self) {
        self.delta_to_budget = match (self.occupancy_pct, self.budgeted_occupancy_pct) {
            (Some(actual), Some(budget)) => Some(round2(actual - budget)),
            _ => None,
        };
    }
}

/// Unit-weighted rollup across properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioTotals {
    pub property_count: usize,
    pub total_units: u32,
    pub occupied_units: u32,
    pub leased_units: u32,
    pub available_units: u32,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
    pub budgeted_occupancy_pct: Option<f64>,
    pub delta_to_budget: Option<f64>,
    pub weighted_average_rent: Option<f64>,
    pub leases_7d: u32,
    pub leases_28d: u32,
}

impl PortfolioTotals {
    /// Percentages are unit-weighted over the properties that report them; a property
    /// with no occupancy or leased figure stays out of that average.
    pub fn from_properties<'r>(records: impl IntoIterator<Item = &'r PropertyKpiRecord>) -> Self {
        let mut totals = Self::default();
        let mut occupancy = WeightedPct::default();
        let mut leased = WeightedPct::default();
        let mut budget = WeightedPct::default();
        let mut rent = WeightedPct::default();

        for record in records {
            totals.property_count += 1;
            totals.total_units += record.total_units;
            totals.available_units += record.available_units.unwrap_or(0);
            totals.leases_7d += record.velocity.leases_7d.unwrap_or(0);
            totals.leases_28d += record.velocity.leases_28d.unwrap_or(0);
            if record.occupancy_pct.is_some() {
                totals.occupied_units += record.occupied_units;
            }
            if record.leased_pct.is_some() {
                totals.leased_units += record.leased_units;
            }

            let units = f64::from(record.total_units);
            occupancy.add(record.occupancy_pct, units);
            leased.add(record.leased_pct, units);
            budget.add(record.budgeted_occupancy_pct, units);
            rent.add(record.weighted_average_rent, units);
        }

        totals.occupancy_pct = occupancy.average();
        totals.leased_pct = leased.average();
        totals.budgeted_occupancy_pct = budget.average();
        totals.delta_to_budget = match (totals.occupancy_pct, totals.budgeted_occupancy_pct) {
            (Some(actual), Some(budget)) => Some(round2(actual - budget)),
            _ => None,
        };
        totals.weighted_average_rent = rent.average();
        totals
    }
}

#[derive(Default)]
struct WeightedPct {
    weighted: f64,
    units: f64,
}

impl WeightedPct {
    fn add(&mut self, value: Option<f64>, units: f64) {
        if let Some(value) = value {
            self.weighted += value * units;
            self.units += units;
        }
    }

    fn average(&self) -> Option<f64> {
        (self.units > 0.0).then(|| round2(self.weighted / self.units))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioKpiRecord {
    pub as_of: NaiveDate,
    pub properties: PropertyMap<PropertyKpiRecord>,
    pub totals: PortfolioTotals,
}

impl PortfolioKpiRecord {
    pub fn from_properties(as_of: NaiveDate, properties: PropertyMap<PropertyKpiRecord>) -> Self {
        let totals = PortfolioTotals::from_properties(properties.values());
        Self {
            as_of,
            properties,
            totals,
        }
    }

    pub fn get(&self, property: &str) -> Option<&PropertyKpiRecord> {
        self.properties.get(property)
    }

    /// Drops the named properties and re-derives the totals.
    pub fn without(mut self, dropped: &[String]) -> Self {
        for name in dropped {
            self.properties.remove(name);
        }
        Self::from_properties(self.as_of, self.properties)
    }
}

/// Replacement figures for one property. Unset fields keep the computed value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KpiOverride {
    pub total_units: Option<u32>,
    pub occupied_units: Option<u32>,
    pub leased_units: Option<u32>,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
    pub budgeted_occupancy_pct: Option<f64>,
    pub budgeted_occupied_units: Option<u32>,
    pub budgeted_leased_pct: Option<f64>,
}

/// Applies per-property overrides and re-derives the portfolio totals. Overrides for
/// properties missing from `kpis` are ignored.
pub fn apply_overrides(
    kpis: PortfolioKpiRecord,
    overrides: &PropertyMap<KpiOverride>,
) -> PortfolioKpiRecord {
    let PortfolioKpiRecord {
        as_of,
        mut properties,
        ..
    } = kpis;

    for (key, patch) in overrides.iter() {
        let Some(record) = properties.get_mut(&key.canonical) else {
            debug!(property = %key.display, "override has no matching property");
            continue;
        };

        if let Some(total) = patch.total_units {
            record.total_units = total;
        }
        let total = f64::from(record.total_units);
        if let Some(occupied) = patch.occupied_units {
            record.occupied_units = occupied;
        }
        if patch.total_units.is_some() || patch.occupied_units.is_some() {
            record.occupancy_pct = percent(f64::from(record.occupied_units), total);
        }
        if let Some(leased) = patch.leased_units {
            record.leased_units = leased;
        }
        if patch.total_units.is_some() || patch.leased_units.is_some() {
            record.leased_pct = percent(f64::from(record.leased_units), total);
        }

        if let Some(pct) = patch.occupancy_pct {
            record.occupancy_pct = Some(pct);
            if patch.occupied_units.is_none() {
                record.occupied_units = units_from_pct(record.total_units, pct);
            }
        }
        if let Some(pct) = patch.leased_pct {
            record.leased_pct = Some(pct);
            if patch.leased_units.is_none() {
                record.leased_units = units_from_pct(record.total_units, pct);
            }
        }
        if patch.budgeted_occupancy_pct.is_some() {
            record.budgeted_occupancy_pct = patch.budgeted_occupancy_pct;
        }
        if patch.budgeted_occupied_units.is_some() {
            record.budgeted_occupied_units = patch.budgeted_occupied_units;
        }
        if patch.budgeted_leased_pct.is_some() {
            record.budgeted_leased_pct = patch.budgeted_leased_pct;
        }
        record.refresh_delta();
        record.overridden = true;
    }

    PortfolioKpiRecord::from_properties(as_of, properties)
}

fn units_from_pct(total: u32, pct: f64) -> u32 {
    (f64::from(total) * pct / 100.0).round().clamp(0.0, f64::from(total)) as u32
}

/// Computes every property's KPIs from one run's feeds.
///
/// `status_overrides` wins over the weekly summary's property status.
pub fn compute_kpis(
    feeds: &FeedSet,
    options: &KpiOptions,
    status_overrides: &PropertyMap<String>,
) -> PortfolioKpiRecord {
    let index = FeedIndex::build(feeds);
    compute_from_index(&index, options, status_overrides)
}

pub(crate) fn compute_from_index(
    index: &FeedIndex<'_>,
    options: &KpiOptions,
    status_overrides: &PropertyMap<String>,
) -> PortfolioKpiRecord {
    let properties: PropertyMap<PropertyKpiRecord> = index
        .kpi_properties()
        .map(|(key, rows)| {
            let record = compute_property(key, rows, options, status_overrides);
            debug!(
                property = %key.display,
                source = record.occupancy_source.label(),
                total_units = record.total_units,
                occupied_units = record.occupied_units,
                "computed property kpis"
            );
            (key.clone(), record)
        })
        .collect();

    let kpis = PortfolioKpiRecord::from_properties(options.reference_date(), properties);
    info!(
        properties = kpis.totals.property_count,
        total_units = kpis.totals.total_units,
        occupied_units = kpis.totals.occupied_units,
        "computed portfolio kpis"
    );
    kpis
}

fn latest_by_date<'r, T>(
    rows: &[&'r T],
    date: impl Fn(&T) -> Option<&String>,
) -> (Option<NaiveDate>, Vec<&'r T>) {
    let dated = |row: &T| date(row).and_then(|value| parse_date(value));
    let latest = rows.iter().filter_map(|row| dated(row)).max();
    let selected = rows
        .iter()
        .copied()
        .filter(|row| latest.is_none() || dated(row) == latest)
        .collect();
    (latest, selected)
}

struct Occupancy {
    source: OccupancySource,
    report_date: Option<NaiveDate>,
    summary: OccupancySummary,
}

fn unit_mix_occupancy(rows: &[&UnitMixRow]) -> Option<Occupancy> {
    let (report_date, latest) = latest_by_date(rows, |row| row.report_date.as_ref());

    // Each percentage is averaged only over the plans that report it.
    let mut total = 0u32;
    let mut occupied = ShareSum::default();
    let mut leased = ShareSum::default();
    for row in latest {
        let units = row.total_units.as_deref().and_then(parse_count).unwrap_or(0);
        total += units;
        occupied.add(units, &row.occupancy_pct);
        leased.add(units, &row.leased_pct);
    }

    if total == 0 {
        return None;
    }
    let mut summary = OccupancySummary::new(total, occupied.units(total), leased.units(total));
    summary.occupancy_pct = occupied.pct();
    summary.leased_pct = leased.pct();
    Some(Occupancy {
        source: OccupancySource::UnitMix,
        report_date,
        summary,
    })
}

#[derive(Default)]
struct ShareSum {
    units: f64,
    reporting_units: u32,
}

impl ShareSum {
    fn add(&mut self, units: u32, pct: &Option<String>) {
        if let Some(pct) = pct.as_deref().and_then(parse_percent) {
            self.units += f64::from(units) * pct / 100.0;
            self.reporting_units += units;
        }
    }

    fn units(&self, total: u32) -> u32 {
        self.units.round().clamp(0.0, f64::from(total)) as u32
    }

    fn pct(&self) -> Option<f64> {
        percent(self.units, f64::from(self.reporting_units))
    }
}

fn weekly_occupancy(row: &WeeklySummaryRow, report_date: Option<NaiveDate>) -> Option<Occupancy> {
    let total = row.total_units.as_deref().and_then(parse_count)?;
    let from_pct = |pct: &Option<String>| {
        pct.as_deref()
            .and_then(parse_percent)
            .map(|pct| units_from_pct(total, pct))
    };
    let occupied = row
        .occupied_units
        .as_deref()
        .and_then(parse_count)
        .map(|units| units.min(total))
        .or_else(|| from_pct(&row.occupancy_pct));
    let leased = from_pct(&row.leased_pct);

    let mut summary = OccupancySummary::new(total, occupied.unwrap_or(0), leased.unwrap_or(0));
    if occupied.is_none() {
        summary.occupancy_pct = None;
    }
    if leased.is_none() {
        summary.leased_pct = None;
    }
    Some(Occupancy {
        source: OccupancySource::WeeklySummary,
        report_date,
        summary,
    })
}

fn compute_property(
    key: &PropertyKey,
    rows: &PropertyRows<'_>,
    options: &KpiOptions,
    status_overrides: &PropertyMap<String>,
) -> PropertyKpiRecord {
    let (weekly_date, weekly_latest) =
        latest_by_date(&rows.weekly_summary, |row| row.report_date.as_ref());
    let weekly = weekly_latest.last().copied();

    let snapshot = deduplicate(&rows.unit_records);
    let classified = classify_snapshot(&snapshot);

    let mut detail = None;
    if !classified.is_empty() {
        let counts = ClassificationCounts::tally(classified.iter().map(|(_, class)| class));
        let summary = OccupancySummary::from_counts(&counts);
        let availability = compute_availability(&snapshot);
        let rent = weighted_rent(&classified, snapshot.report_date);
        let lookahead = project_occupancy(
            &classified,
            &rows.unit_records,
            options.today,
            &options.lookahead,
        );
        detail = Some((counts, summary, availability, rent, lookahead));
    }

    let occupancy = match &detail {
        Some((_, summary, ..)) => Occupancy {
            source: OccupancySource::UnitDetail,
            report_date: snapshot.report_date,
            summary: summary.clone(),
        },
        None => unit_mix_occupancy(&rows.unit_mix)
            .or_else(|| weekly.and_then(|row| weekly_occupancy(row, weekly_date)))
            .unwrap_or(Occupancy {
                source: OccupancySource::Unavailable,
                report_date: None,
                summary: OccupancySummary::new(0, 0, 0),
            }),
    };

    let budget_pct = |pct: &Option<String>| pct.as_deref().and_then(parse_percent);
    let status = status_overrides
        .get(&key.canonical)
        .cloned()
        .or_else(|| weekly.and_then(|row| row.status.clone()));

    let velocity = resolve_velocity(&rows.leasing, &rows.unit_records, options.reference_date());

    let weekly_rent = weekly
        .and_then(|row| row.average_leased_rent.as_deref())
        .and_then(parse_number)
        .filter(|rent| *rent > 0.0);

    let mut record = PropertyKpiRecord {
        property: key.display.clone(),
        canonical_key: key.canonical.clone(),
        status,
        occupancy_source: occupancy.source,
        occupancy_source_label: occupancy.source.label().to_string(),
        report_date: occupancy.report_date,
        total_units: occupancy.summary.total_units,
        occupied_units: occupancy.summary.occupied_units,
        leased_units: occupancy.summary.leased_units,
        occupancy_pct: occupancy.summary.occupancy_pct,
        leased_pct: occupancy.summary.leased_pct,
        available_units: None,
        budgeted_occupancy_pct: weekly.and_then(|row| budget_pct(&row.budgeted_occupancy_pct)),
        budgeted_occupied_units: weekly
            .and_then(|row| row.budgeted_occupied_units.as_deref())
            .and_then(parse_count),
        budgeted_leased_pct: weekly.and_then(|row| budget_pct(&row.budgeted_leased_pct)),
        delta_to_budget: None,
        weighted_average_rent: weekly_rent.map(round2),
        velocity,
        lookahead: None,
        availability: None,
        classification_counts: None,
        rent_by_plan_type: Vec::new(),
        floor_plans: Vec::new(),
        overridden: false,
    };

    if let Some((counts, _, availability, rent, lookahead)) = detail {
        record.available_units = Some(availability.available_units);
        record.availability = Some(availability);
        record.classification_counts = Some(counts);
        if rent.weighted_average_rent.is_some() {
            record.weighted_average_rent = rent.weighted_average_rent;
        }
        record.rent_by_plan_type = rent.by_plan_type;
        record.lookahead = Some(lookahead);
        record.floor_plans = floor_plan_breakdown(&classified);
    }

    record.refresh_delta();
    record
}
