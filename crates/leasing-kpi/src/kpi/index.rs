use super::domain::UnitRecord;
use super::property::{PropertyKey, PropertyMap, PropertyRegistry};
use crate::feeds::{
    FeedSet, LeasingRow, PricingRow, RecentLeaseRow, TradeOutRow, UnitMixRow, UnitRow,
    WeeklySummaryRow,
};

/// Every row of one run that belongs to a single property.
#[derive(Debug, Default)]
pub struct PropertyRows<'a> {
    pub unit_records: Vec<UnitRecord>,
    pub unit_mix: Vec<&'a UnitMixRow>,
    pub weekly_summary: Vec<&'a WeeklySummaryRow>,
    pub leasing: Vec<&'a LeasingRow>,
    pub units: Vec<&'a UnitRow>,
    pub pricing: Vec<&'a PricingRow>,
    pub trade_out: Vec<&'a TradeOutRow>,
    pub recent_leases: Vec<&'a RecentLeaseRow>,
}

/// Feed rows grouped by canonical property. Properties are registered unit detail
/// first, then unit mix, weekly summary, leasing, units, pricing, trade-out and recent
/// leases, so the display spelling comes from the most granular feed that names it.
#[derive(Debug, Default)]
pub struct FeedIndex<'a> {
    registry: PropertyRegistry,
    properties: PropertyMap<PropertyRows<'a>>,
}

impl<'a> FeedIndex<'a> {
    pub fn build(feeds: &'a FeedSet) -> Self {
        let mut index = Self::default();

        for row in &feeds.unit_details {
            if let Some(record) = UnitRecord::from_row(row, &mut index.registry) {
                let key = record.property.clone();
                index.rows_mut(&key).unit_records.push(record);
            }
        }

        index.group(&feeds.unit_mix, |row| row.property.as_deref(), |rows| &mut rows.unit_mix);
        index.group(
            &feeds.weekly_summary,
            |row| row.property.as_deref(),
            |rows| &mut rows.weekly_summary,
        );
        index.group(&feeds.leasing, |row| row.property.as_deref(), |rows| &mut rows.leasing);
        index.group(&feeds.units, |row| row.property.as_deref(), |rows| &mut rows.units);
        index.group(&feeds.pricing, |row| row.property.as_deref(), |rows| &mut rows.pricing);
        index.group(&feeds.trade_out, |row| row.property.as_deref(), |rows| &mut rows.trade_out);
        index.group(
            &feeds.recent_leases,
            |row| row.property.as_deref(),
            |rows| &mut rows.recent_leases,
        );

        index
    }

    fn rows_mut(&mut self, key: &PropertyKey) -> &mut PropertyRows<'a> {
        self.properties.get_or_insert_with(key, PropertyRows::default)
    }

    fn group<T>(
        &mut self,
        rows: &'a [T],
        property: impl Fn(&T) -> Option<&str>,
        slot: impl for<'r> Fn(&'r mut PropertyRows<'a>) -> &'r mut Vec<&'a T>,
    ) {
        for row in rows {
            let Some(key) = property(row).and_then(|name| self.registry.register(name)) else {
                continue;
            };
            slot(self.rows_mut(&key)).push(row);
        }
    }

    pub fn get(&self, property: &str) -> Option<&PropertyRows<'a>> {
        self.properties.get(property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyRows<'a>)> {
        self.properties.iter()
    }


    /// Properties that carry occupancy data: unit detail, unit mix or weekly summary.
    pub fn kpi_properties(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyRows<'a>)> {
        self.iter().filter(|(_, rows)| {
            !rows.unit_records.is_empty()
                || !rows.unit_mix.is_empty()
                || !rows.weekly_summary.is_empty()
        })
    }
}
