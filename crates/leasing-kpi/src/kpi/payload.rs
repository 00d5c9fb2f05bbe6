use super::aggregate::{
    apply_overrides, compute_from_index, KpiOptions, KpiOverride, PortfolioKpiRecord,
    PropertyKpiRecord,
};
use super::index::{FeedIndex, PropertyRows};
use super::normalizer::{
    fold_text, normalize_unit_token, parse_count, parse_date, parse_number, parse_percent,
};
use super::occupancy::round2;
use super::property::{PropertyKey, PropertyMap};
use crate::feeds::{FeedSet, LeasingRow, TradeOutRow};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Latest leasing-feed figures for a property. Placeholder rows are filled from the
/// KPI record for properties the leasing feed does not cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeasingSummary {
    pub property: String,
    pub report_date: Option<NaiveDate>,
    pub total_units: Option<u32>,
    pub leases_7d: Option<u32>,
    pub leases_28d: Option<u32>,
    pub new_leases_7d: Option<u32>,
    pub new_leases_28d: Option<u32>,
    pub renewals_7d: Option<u32>,
    pub renewals_28d: Option<u32>,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
    pub placeholder: bool,
}

impl LeasingSummary {
    fn from_row(key: &PropertyKey, row: &LeasingRow) -> Self {
        let count = |value: &Option<String>| value.as_deref().and_then(parse_count);
        let pct = |value: &Option<String>| value.as_deref().and_then(parse_percent);
        Self {
            property: key.display.clone(),
            report_date: row.report_date.as_deref().and_then(parse_date),
            total_units: count(&row.total_units),
            leases_7d: count(&row.leases_7d),
            leases_28d: count(&row.leases_28d),
            new_leases_7d: count(&row.new_leases_7d),
            new_leases_28d: count(&row.new_leases_28d),
            renewals_7d: count(&row.renewals_7d),
            renewals_28d: count(&row.renewals_28d),
            occupancy_pct: pct(&row.occupancy_pct),
            leased_pct: pct(&row.leased_pct),
            placeholder: false,
        }
    }

    fn placeholder(record: &PropertyKpiRecord) -> Self {
        let velocity = &record.velocity;
        Self {
            property: record.property.clone(),
            report_date: record.report_date,
            total_units: Some(record.total_units),
            leases_7d: velocity.leases_7d,
            leases_28d: velocity.leases_28d,
            new_leases_7d: velocity.new_leases_7d,
            new_leases_28d: velocity.new_leases_28d,
            renewals_7d: velocity.renewals_7d,
            renewals_28d: velocity.renewals_28d,
            occupancy_pct: record.occupancy_pct,
            leased_pct: record.leased_pct,
            placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingPoint {
    pub date: Option<NaiveDate>,
    pub floor_plan: Option<String>,
    pub asking_rent: Option<f64>,
    pub effective_rent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitMixPlan {
    pub floor_plan: String,
    pub units: u32,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub average_square_feet: Option<f64>,
    pub average_market_rent: Option<f64>,
    pub occupancy_pct: Option<f64>,
    pub leased_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutSummary {
    pub lease_count: u32,
    pub average_prior_rent: Option<f64>,
    pub average_new_rent: Option<f64>,
    pub average_change: Option<f64>,
    pub average_change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentLease {
    pub unit: Option<String>,
    pub floor_plan: Option<String>,
    pub signed_date: Option<NaiveDate>,
    pub lease_start: Option<NaiveDate>,
    pub rent: Option<f64>,
    pub lease_type: Option<String>,
}

/// Everything the dashboard renders for one run. Every per-property map is published
/// under both the canonical and the display property name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub as_of: NaiveDate,
    pub portfolio: PortfolioKpiRecord,
    pub leasing: PropertyMap<LeasingSummary>,
    pub pricing: PropertyMap<Vec<PricingPoint>>,
    pub unit_mix: PropertyMap<Vec<UnitMixPlan>>,
    pub trade_out: PropertyMap<TradeOutSummary>,
    pub recent_leases: PropertyMap<Vec<RecentLease>>,
    /// Display names of properties dropped as dead.
    pub suppressed: Vec<String>,
}

pub struct DashboardPayloadBuilder<'a> {
    feeds: &'a FeedSet,
    options: KpiOptions,
    status_overrides: PropertyMap<String>,
    kpi_overrides: PropertyMap<KpiOverride>,
}

impl<'a> DashboardPayloadBuilder<'a> {
    pub fn new(feeds: &'a FeedSet, options: KpiOptions) -> Self {
        Self {
            feeds,
            options,
            status_overrides: PropertyMap::new(),
            kpi_overrides: PropertyMap::new(),
        }
    }

    pub fn with_status_overrides(mut self, overrides: PropertyMap<String>) -> Self {
        self.status_overrides = overrides;
        self
    }

    pub fn with_kpi_overrides(mut self, overrides: PropertyMap<KpiOverride>) -> Self {
        self.kpi_overrides = overrides;
        self
    }

    pub fn build(self) -> DashboardPayload {
        let index = FeedIndex::build(self.feeds);
        let mut portfolio = compute_from_index(&index, &self.options, &self.status_overrides);
        if !self.kpi_overrides.is_empty() {
            portfolio = apply_overrides(portfolio, &self.kpi_overrides);
        }

        let mut leasing = leasing_index(&index);
        for (key, record) in portfolio.properties.iter() {
            if !leasing.contains(&key.canonical) {
                debug!(property = %key.display, "adding placeholder leasing row");
                leasing.insert(key.clone(), LeasingSummary::placeholder(record));
            }
        }

        let mut pricing = build_map(&index, pricing_points);
        let mut unit_mix = build_map(&index, unit_mix_plans);
        let mut trade_out = build_map(&index, |rows| trade_out_summary(&rows.trade_out));
        let mut recent_leases = build_map(&index, |rows| {
            let leases = recent_lease_list(rows, self.options.recent_lease_limit);
            (!leases.is_empty()).then_some(leases)
        });

        let suppressed = dead_properties(&portfolio, self.feeds);
        if !suppressed.is_empty() {
            info!(
                count = suppressed.len(),
                properties = ?suppressed,
                "suppressing dead properties"
            );
            for name in &suppressed {
                leasing.remove(name);
                pricing.remove(name);
                unit_mix.remove(name);
                trade_out.remove(name);
                recent_leases.remove(name);
            }
            portfolio = portfolio.without(&suppressed);
        }

        DashboardPayload {
            as_of: portfolio.as_of,
            portfolio,
            leasing,
            pricing,
            unit_mix,
            trade_out,
            recent_leases,
            suppressed,
        }
    }
}

fn build_map<'a, V>(
    index: &FeedIndex<'a>,
    mut build: impl FnMut(&PropertyRows<'a>) -> Option<V>,
) -> PropertyMap<V> {
    index
        .iter()
        .filter_map(|(key, rows)| build(rows).map(|value| (key.clone(), value)))
        .collect()
}

fn leasing_index(index: &FeedIndex<'_>) -> PropertyMap<LeasingSummary> {
    index
        .iter()
        .filter_map(|(key, rows)| {
            let latest = rows
                .leasing
                .iter()
                .copied()
                .enumerate()
                .max_by_key(|(position, row)| {
                    (row.report_date.as_deref().and_then(parse_date), *position)
                })
                .map(|(_, row)| row)?;
            Some((key.clone(), LeasingSummary::from_row(key, latest)))
        })
        .collect()
}

/// A property marked dead stays visible only while the leasing feed still reports it on
/// the feed's latest date (or at all, when the feed carries no dates).
fn dead_properties(portfolio: &PortfolioKpiRecord, feeds: &FeedSet) -> Vec<String> {
    let feed_latest = feeds
        .leasing
        .iter()
        .filter_map(|row| row.report_date.as_deref().and_then(parse_date))
        .max();

    let has_live_row = |key: &PropertyKey| {
        feeds.leasing.iter().any(|row| {
            let same_property = row
                .property
                .as_deref()
                .and_then(PropertyKey::parse)
                .is_some_and(|parsed| parsed.canonical == key.canonical);
            same_property
                && (feed_latest.is_none()
                    || row.report_date.as_deref().and_then(parse_date) == feed_latest)
        })
    };

    portfolio
        .properties
        .iter()
        .filter(|(_, record)| {
            record
                .status
                .as_deref()
                .is_some_and(|status| fold_text(status).contains("dead"))
        })
        .filter(|(key, _)| !has_live_row(key))
        .map(|(key, _)| key.display.clone())
        .collect()
}

fn pricing_points(rows: &PropertyRows<'_>) -> Option<Vec<PricingPoint>> {
    if rows.pricing.is_empty() {
        return None;
    }
    let amount = |value: &Option<String>| value.as_deref().and_then(parse_number);
    let mut points: Vec<PricingPoint> = rows
        .pricing
        .iter()
        .map(|row| PricingPoint {
            date: row.date.as_deref().and_then(parse_date),
            floor_plan: row.floor_plan.clone(),
            asking_rent: amount(&row.asking_rent),
            effective_rent: amount(&row.effective_rent),
        })
        .collect();
    points.sort_by(|a, b| (a.date, &a.floor_plan).cmp(&(b.date, &b.floor_plan)));
    Some(points)
}

#[derive(Default)]
struct PlanAccumulator {
    name: Option<String>,
    units: u32,
    bedrooms: Vec<f64>,
    bathrooms: Vec<f64>,
    square_feet: Vec<f64>,
    market_rent: Vec<f64>,
    feed_units: u32,
    occupancy_pct: Option<f64>,
    leased_pct: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// Groups plans by normalized name; the first spelling seen is displayed.
fn plan_entry<'m>(
    plans: &'m mut BTreeMap<String, PlanAccumulator>,
    name: Option<&String>,
) -> Option<&'m mut PlanAccumulator> {
    let name = name?;
    let token = normalize_unit_token(name);
    if token.is_empty() {
        return None;
    }
    let entry = plans.entry(token).or_default();
    entry.name.get_or_insert_with(|| name.clone());
    Some(entry)
}

fn unit_mix_plans(rows: &PropertyRows<'_>) -> Option<Vec<UnitMixPlan>> {
    if rows.units.is_empty() && rows.unit_mix.is_empty() {
        return None;
    }

    let mut plans: BTreeMap<String, PlanAccumulator> = BTreeMap::new();

    for row in &rows.units {
        let Some(entry) = plan_entry(&mut plans, row.floor_plan.as_ref()) else {
            continue;
        };
        entry.units += 1;
        let number = |value: &Option<String>| value.as_deref().and_then(parse_number);
        entry.bedrooms.extend(number(&row.bedrooms));
        entry.bathrooms.extend(number(&row.bathrooms));
        entry.square_feet.extend(number(&row.square_feet).filter(|sqft| *sqft > 0.0));
        entry.market_rent.extend(number(&row.market_rent).filter(|rent| *rent > 0.0));
    }

    let latest_mix_date = rows
        .unit_mix
        .iter()
        .filter_map(|row| row.report_date.as_deref().and_then(parse_date))
        .max();
    for row in &rows.unit_mix {
        let date = row.report_date.as_deref().and_then(parse_date);
        if latest_mix_date.is_some() && date != latest_mix_date {
            continue;
        }
        let Some(entry) = plan_entry(&mut plans, row.floor_plan.as_ref()) else {
            continue;
        };
        entry.feed_units = row.total_units.as_deref().and_then(parse_count).unwrap_or(0);
        entry.occupancy_pct = row.occupancy_pct.as_deref().and_then(parse_percent);
        entry.leased_pct = row.leased_pct.as_deref().and_then(parse_percent);
    }

    Some(
        plans
            .into_values()
            .map(|acc| UnitMixPlan {
                floor_plan: acc.name.unwrap_or_default(),
                units: if acc.units > 0 { acc.units } else { acc.feed_units },
                bedrooms: mean(&acc.bedrooms),
                bathrooms: mean(&acc.bathrooms),
                average_square_feet: mean(&acc.square_feet),
                average_market_rent: mean(&acc.market_rent),
                occupancy_pct: acc.occupancy_pct,
                leased_pct: acc.leased_pct,
            })
            .collect(),
    )
}

/// Rent change across leases with both a positive prior and a positive new rent.
fn trade_out_summary(rows: &[&TradeOutRow]) -> Option<TradeOutSummary> {
    if rows.is_empty() {
        return None;
    }

    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            let prior = row.prior_rent.as_deref().and_then(parse_number)?;
            let new = row.new_rent.as_deref().and_then(parse_number)?;
            (prior > 0.0 && new > 0.0).then_some((prior, new))
        })
        .collect();

    let priors: Vec<f64> = pairs.iter().map(|(prior, _)| *prior).collect();
    let news: Vec<f64> = pairs.iter().map(|(_, new)| *new).collect();
    let changes: Vec<f64> = pairs.iter().map(|(prior, new)| new - prior).collect();
    let change_pcts: Vec<f64> = pairs
        .iter()
        .map(|(prior, new)| (new - prior) / prior * 100.0)
        .collect();

    Some(TradeOutSummary {
        lease_count: pairs.len() as u32,
        average_prior_rent: mean(&priors),
        average_new_rent: mean(&news),
        average_change: mean(&changes),
        average_change_pct: mean(&change_pcts),
    })
}

fn recent_lease_list(rows: &PropertyRows<'_>, limit: usize) -> Vec<RecentLease> {
    let mut leases: Vec<RecentLease> = rows
        .recent_leases
        .iter()
        .map(|row| RecentLease {
            unit: row.unit.clone(),
            floor_plan: row.floor_plan.clone(),
            signed_date: row.signed_date.as_deref().and_then(parse_date),
            lease_start: row.lease_start.as_deref().and_then(parse_date),
            rent: row.rent.as_deref().and_then(parse_number),
            lease_type: row.lease_type.clone(),
        })
        .collect();
    leases.sort_by(|a, b| (b.signed_date, b.lease_start).cmp(&(a.signed_date, a.lease_start)));
    leases.truncate(limit);
    leases
}

/// Builds the payload with no overrides.
pub fn build_dashboard_payload(feeds: &FeedSet, options: KpiOptions) -> DashboardPayload {
    DashboardPayloadBuilder::new(feeds, options).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::DatasetKind;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn feeds() -> FeedSet {
        let mut feeds = FeedSet::default();
        feeds.append_rows(
            DatasetKind::WeeklySummary,
            vec![
                json!({"property": "Oak Park", "total_units": 10, "occupied_units": 9, "status": "Stabilized"}),
                json!({"property": "Old Mill", "total_units": 40, "occupied_units": 0, "status": "DEAD - sold"}),
                json!({"property": "Harbor", "total_units": 20, "occupied_units": 15, "status": "Dead"}),
            ],
        );
        feeds.append_rows(
            DatasetKind::Leasing,
            vec![
                json!({"property": "Harbor", "report_date": "2025-09-24", "leases_7d": 1}),
                json!({"property": "Old Mill", "report_date": "2025-09-01", "leases_7d": 0}),
            ],
        );
        feeds.append_rows(
            DatasetKind::Pricing,
            vec![
                json!({"property": "Oak Park", "floor_plan": "B1", "date": "2025-09-02", "asking_rent": "$1,500"}),
                json!({"property": "Oak Park", "floor_plan": "A1", "date": "2025-09-02", "asking_rent": "$1,200"}),
                json!({"property": "Oak Park", "floor_plan": "A1", "date": "2025-09-01", "asking_rent": 1190}),
                json!({"property": "Old Mill", "floor_plan": "A1", "date": "2025-09-01", "asking_rent": 900}),
            ],
        );
        feeds.append_rows(
            DatasetKind::TradeOut,
            vec![
                json!({"property": "Oak Park", "prior_rent": 1000, "new_rent": 1100}),
                json!({"property": "Oak Park", "prior_rent": 1200, "new_rent": 1140}),
                json!({"property": "Oak Park", "prior_rent": 0, "new_rent": 1300}),
            ],
        );
        feeds.append_rows(
            DatasetKind::Units,
            vec![
                json!({"property": "Oak Park", "unit": "101", "floor_plan": "A1", "bedrooms": 1, "square_feet": 700, "market_rent": 1200}),
                json!({"property": "Oak Park", "unit": "102", "floor_plan": "a-1", "bedrooms": 1, "square_feet": 720, "market_rent": 1250}),
            ],
        );
        feeds.append_rows(
            DatasetKind::UnitMix,
            vec![json!({"property": "Oak Park", "floor_plan": "A1", "occupancy_pct": 0.5})],
        );
        feeds.append_rows(
            DatasetKind::RecentLeases,
            (1..=12)
                .map(|n| json!({"property": "Oak Park", "unit": format!("1{n:02}"), "signed_date": format!("2025-09-{n:02}")}))
                .collect(),
        );
        feeds
    }

    #[test]
    fn dead_properties_without_live_leasing_rows_are_suppressed() {
        let payload = build_dashboard_payload(&feeds(), KpiOptions::new(day(2025, 9, 24)));

        assert_eq!(payload.suppressed, vec!["Old Mill".to_string()]);
        assert!(payload.portfolio.get("Old Mill").is_none());
        assert!(payload.pricing.get("Old Mill").is_none());
        assert!(payload.leasing.get("OLD MILL").is_none());
        assert!(payload.portfolio.get("Harbor").is_some());
        assert_eq!(payload.portfolio.totals.total_units, 30);
    }

    #[test]
    fn placeholder_leasing_rows_fill_gaps() {
        let payload = build_dashboard_payload(&feeds(), KpiOptions::new(day(2025, 9, 24)));

        let oak = payload.leasing.get("oak park").expect("placeholder");
        assert!(oak.placeholder);
        assert_eq!(oak.total_units, Some(10));
        assert_eq!(oak.occupancy_pct, Some(90.0));

        let harbor = payload.leasing.get("Harbor").expect("native row");
        assert!(!harbor.placeholder);
        assert_eq!(harbor.leases_7d, Some(1));
    }

    #[test]
    fn auxiliary_indices_are_shaped_for_display() {
        let payload = build_dashboard_payload(&feeds(), KpiOptions::new(day(2025, 9, 24)));

        let pricing = payload.pricing.get("Oak Park").expect("pricing");
        let order: Vec<_> = pricing
            .iter()
            .map(|point| (point.date, point.floor_plan.clone(), point.asking_rent))
            .collect();
        assert_eq!(
            order,
            vec![
                (Some(day(2025, 9, 1)), Some("A1".to_string()), Some(1190.0)),
                (Some(day(2025, 9, 2)), Some("A1".to_string()), Some(1200.0)),
                (Some(day(2025, 9, 2)), Some("B1".to_string()), Some(1500.0)),
            ]
        );

        let trade = payload.trade_out.get("Oak Park").expect("trade out");
        assert_eq!(trade.lease_count, 2);
        assert_eq!(trade.average_change, Some(20.0));
        assert_eq!(trade.average_change_pct, Some(2.5));

        let mix = payload.unit_mix.get("Oak Park").expect("unit mix");
        assert_eq!(mix.len(), 1);
        assert_eq!(mix[0].units, 2);
        assert_eq!(mix[0].average_square_feet, Some(710.0));
        assert_eq!(mix[0].occupancy_pct, Some(50.0));

        let recents = payload.recent_leases.get("Oak Park").expect("recent leases");
        assert_eq!(recents.len(), 10);
        assert_eq!(recents[0].signed_date, Some(day(2025, 9, 12)));
    }

    #[test]
    fn kpi_overrides_flow_into_payload() {
        let overrides: PropertyMap<KpiOverride> =
            serde_json::from_value(json!({"OAK PARK": {"occupied_units": 10}})).expect("overrides");
        let payload = DashboardPayloadBuilder::new(&feeds(), KpiOptions::new(day(2025, 9, 24)))
            .with_kpi_overrides(overrides)
            .build();

        let oak = payload.portfolio.get("Oak Park").expect("oak park");
        assert!(oak.overridden);
        assert_eq!(oak.occupancy_pct, Some(100.0));
    }

    #[test]
    fn status_overrides_can_revive_or_kill_properties() {
        let mut statuses = PropertyMap::new();
        statuses.insert(PropertyKey::parse("Old Mill").expect("key"), "Active".to_string());
        statuses.insert(PropertyKey::parse("Oak Park").expect("key"), "dead".to_string());

        let payload = DashboardPayloadBuilder::new(&feeds(), KpiOptions::new(day(2025, 9, 24)))
            .with_status_overrides(statuses)
            .build();
        assert_eq!(payload.suppressed, vec!["Oak Park".to_string()]);
        assert!(payload.portfolio.get("Old Mill").is_some());
    }
}
