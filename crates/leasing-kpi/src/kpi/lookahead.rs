use super::classify::UnitClassification;
use super::dedup::CanonicalUnit;
use super::domain::{UnitKey, UnitRecord};
use super::occupancy::percent;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookaheadHorizon {
    Weeks(u32),
    TargetDate(NaiveDate),
}

/// Which date marks a move-in when a row carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoveInOrder {
    #[default]
    LeaseStartFirst,
    MoveInFirst,
}

/// Which date marks a departure when a row carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepartureOrder {
    #[default]
    NoticeFirst,
    MoveOutFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookaheadConfig {
    pub horizon: LookaheadHorizon,
    pub move_in_order: MoveInOrder,
    pub departure_order: DepartureOrder,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            horizon: LookaheadHorizon::Weeks(4),
            move_in_order: MoveInOrder::default(),
            departure_order: DepartureOrder::default(),
        }
    }
}

impl LookaheadConfig {
    /// Last day of the projection window. A target date before `today` collapses the
    /// window to `today` alone.
    pub fn window_end(&self, today: NaiveDate) -> NaiveDate {
        let end = match self.horizon {
            LookaheadHorizon::Weeks(weeks) => today
                .checked_add_days(Days::new(u64::from(weeks) * 7))
                .unwrap_or(NaiveDate::MAX),
            LookaheadHorizon::TargetDate(target) => target,
        };
        end.max(today)
    }

    fn move_in_date(&self, record: &UnitRecord) -> Option<NaiveDate> {
        match self.move_in_order {
            MoveInOrder::LeaseStartFirst => record.lease_start.or(record.move_in_date),
            MoveInOrder::MoveInFirst => record.move_in_date.or(record.lease_start),
        }
    }

    fn departure_date(&self, record: &UnitRecord) -> Option<NaiveDate> {
        match self.departure_order {
            DepartureOrder::NoticeFirst => record.notice_date.or(record.move_out_date),
            DepartureOrder::MoveOutFirst => record.move_out_date.or(record.notice_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookaheadProjection {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub current_occupied: u32,
    pub total_units: u32,
    pub move_ins: u32,
    pub new_lease_move_ins: u32,
    pub departures: u32,
    pub washed_units: u32,
    pub projected_occupied: u32,
    pub projected_occupancy_pct: Option<f64>,
}

/// Projects occupancy to the end of the lookahead window.
///
/// `current` is the classified snapshot; `history` holds every unit-detail row of the
/// property across report dates. Units with both a move-in and a departure in the
/// window turn over and are left out of both counts.
pub fn project_occupancy(
    current: &[(&CanonicalUnit, UnitClassification)],
    history: &[UnitRecord],
    today: NaiveDate,
    config: &LookaheadConfig,
) -> LookaheadProjection {
    let window_end = config.window_end(today);
    let in_window = |date: NaiveDate| date >= today && date <= window_end;

    let total_units = current.len() as u32;
    let current_occupied = current.iter().filter(|(_, class)| class.is_occupied()).count() as u32;
    let occupied_now: BTreeMap<&UnitKey, bool> = current
        .iter()
        .map(|(unit, class)| (&unit.key, class.is_occupied()))
        .collect();

    let mut newest_first: Vec<&UnitRecord> = history.iter().collect();
    newest_first.sort_by(|a, b| b.report_date.cmp(&a.report_date));

    // History rows per identified unit, newest first, and the earliest in-window move-in.
    let mut by_identity: BTreeMap<String, Vec<&UnitRecord>> = BTreeMap::new();
    let mut move_ins: BTreeMap<UnitKey, NaiveDate> = BTreeMap::new();
    for record in newest_first {
        let Some(identity) = record.identity() else {
            continue;
        };
        if let Some(date) = config.move_in_date(record).filter(|date| in_window(*date)) {
            move_ins
                .entry(UnitKey::Identified(identity.clone()))
                .and_modify(|earliest| *earliest = (*earliest).min(date))
                .or_insert(date);
        }
        by_identity.entry(identity).or_default().push(record);
    }
    let rows_of = |key: &UnitKey| history_of(&by_identity, key);

    // Latest known status: the snapshot when the unit is in it, else its newest history row.
    let was_occupied = |key: &UnitKey| -> bool {
        match occupied_now.get(key) {
            Some(occupied) => *occupied,
            None => rows_of(key)
                .first()
                .is_some_and(|record| record.status.kind.is_occupied()),
        }
    };

    let mut departures: BTreeSet<&UnitKey> = BTreeSet::new();
    for (unit, class) in current {
        if !class.is_occupied() {
            continue;
        }
        let resolved = config.departure_date(&unit.record).or_else(|| {
            rows_of(&unit.key)
                .iter()
                .find_map(|record| config.departure_date(record))
        });
        if resolved.is_some_and(in_window) {
            departures.insert(&unit.key);
        }
    }

    let washed: BTreeSet<&UnitKey> = departures
        .iter()
        .copied()
        .filter(|key| move_ins.contains_key(*key))
        .collect();

    let counted_move_ins: Vec<&UnitKey> = move_ins
        .keys()
        .filter(|key| !washed.contains(key))
        .collect();
    let new_lease_move_ins = counted_move_ins
        .iter()
        .filter(|key| !was_occupied(key))
        .count() as u32;
    let unwashed_departures = departures.len() as u32 - washed.len() as u32;

    let projected = i64::from(current_occupied) + i64::from(new_lease_move_ins)
        - i64::from(unwashed_departures);
    let projected_occupied = projected.clamp(0, i64::from(total_units)) as u32;

    LookaheadProjection {
        window_start: today,
        window_end,
        current_occupied,
        total_units,
        move_ins: counted_move_ins.len() as u32,
        new_lease_move_ins,
        departures: unwashed_departures,
        washed_units: washed.len() as u32,
        projected_occupied,
        projected_occupancy_pct: percent(f64::from(projected_occupied), f64::from(total_units)),
    }
}

fn history_of<'m, 'r>(
    by_identity: &'m BTreeMap<String, Vec<&'r UnitRecord>>,
    key: &UnitKey,
) -> &'m [&'r UnitRecord] {
    match key {
        UnitKey::Identified(id) => by_identity.get(id).map(Vec::as_slice).unwrap_or_default(),
        UnitKey::Unidentified(_) => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::fixtures::{day, record};

    fn canonical(record: UnitRecord) -> CanonicalUnit {
        CanonicalUnit {
            key: UnitKey::Identified(record.identity().expect("identified")),
            record,
        }
    }

    #[test]
    fn window_end_respects_horizon() {
        let today = day(2025, 9, 24);
        assert_eq!(LookaheadConfig::default().window_end(today), day(2025, 10, 22));

        let past = LookaheadConfig {
            horizon: LookaheadHorizon::TargetDate(day(2025, 9, 1)),
            ..LookaheadConfig::default()
        };
        assert_eq!(past.window_end(today), today);
    }

    #[test]
    fn counts_new_lease_move_ins_and_departures() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let mut leaving = record(Some("101"), "Occupied NTV", today);
        leaving.notice_date = Some(day(2025, 10, 1));
        let mut arriving = record(Some("102"), "Vacant-Leased", today);
        arriving.lease_start = Some(day(2025, 10, 5));
        let staying = record(Some("103"), "Occupied", today);

        let units = [canonical(leaving), canonical(arriving), canonical(staying)];
        let classified = vec![
            (&units[0], UnitClassification::OccupiedNoticeNotPreleased),
            (&units[1], UnitClassification::VacantLeased),
            (&units[2], UnitClassification::Occupied),
        ];
        let history: Vec<UnitRecord> = units.iter().map(|unit| unit.record.clone()).collect();

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.current_occupied, 2);
        assert_eq!(projection.new_lease_move_ins, 1);
        assert_eq!(projection.departures, 1);
        assert_eq!(projection.projected_occupied, 2);
    }

    #[test]
    fn turnover_in_window_is_washed() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let mut turning = record(Some("101"), "Occupied NTVL", today);
        turning.move_out_date = Some(day(2025, 10, 1));
        turning.lease_start = Some(day(2025, 10, 8));

        let units = [canonical(turning)];
        let classified = vec![(&units[0], UnitClassification::OccupiedNoticePreleased)];
        let history = vec![units[0].record.clone()];

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.washed_units, 1);
        assert_eq!(projection.departures, 0);
        assert_eq!(projection.move_ins, 0);
        assert_eq!(projection.projected_occupied, projection.current_occupied);
    }

    #[test]
    fn departures_found_in_history_when_snapshot_lacks_dates() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let current = record(Some("101"), "Occupied", today);
        let mut earlier = record(Some("101"), "Occupied NTV", day(2025, 9, 20));
        earlier.move_out_date = Some(day(2025, 10, 10));

        let units = [canonical(current)];
        let classified = vec![(&units[0], UnitClassification::Occupied)];
        let history = vec![earlier, units[0].record.clone()];

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.departures, 1);
        assert_eq!(projection.projected_occupied, 0);
    }

    #[test]
    fn projection_is_clamped_to_total_units() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let mut arriving = record(Some("101"), "Vacant-Leased", today);
        arriving.move_in_date = Some(day(2025, 9, 30));
        let units = [canonical(arriving)];
        let classified = vec![(&units[0], UnitClassification::VacantLeased)];

        let mut stray = record(Some("999"), "Vacant", day(2025, 9, 1));
        stray.lease_start = Some(day(2025, 9, 26));
        let history = vec![units[0].record.clone(), stray];

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.new_lease_move_ins, 2);
        assert_eq!(projection.projected_occupied, 1);
        assert_eq!(projection.projected_occupancy_pct, Some(100.0));
    }

    #[test]
    fn move_in_order_selects_candidate_date() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let mut row = record(Some("101"), "Vacant-Leased", today);
        row.lease_start = Some(day(2025, 12, 1));
        row.move_in_date = Some(day(2025, 10, 1));
        let units = [canonical(row)];
        let classified = vec![(&units[0], UnitClassification::VacantLeased)];
        let history = vec![units[0].record.clone()];

        let lease_first = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(lease_first.move_ins, 0);

        let move_in_first = LookaheadConfig {
            move_in_order: MoveInOrder::MoveInFirst,
            ..LookaheadConfig::default()
        };
        let projection = project_occupancy(&classified, &history, today, &move_in_first);
        assert_eq!(projection.move_ins, 1);
    }

    #[test]
    fn units_missing_from_snapshot_use_their_newest_history_row() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let staying = record(Some("101"), "Occupied", today);
        let units = [canonical(staying)];
        let classified = vec![(&units[0], UnitClassification::Occupied)];

        let older = record(Some("102"), "Vacant", day(2025, 9, 1));
        let mut newer = record(Some("102"), "Occupied", day(2025, 9, 20));
        newer.lease_start = Some(day(2025, 10, 1));
        let history = vec![older, units[0].record.clone(), newer];

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.move_ins, 1);
        assert_eq!(projection.new_lease_move_ins, 0);
        assert_eq!(projection.projected_occupied, 1);
    }

    #[test]
    fn long_daily_history_resolves_departures_per_unit() {
        let today = day(2025, 9, 24);
        let defaults = LookaheadConfig::default();
        let units: Vec<CanonicalUnit> = (0..300)
            .map(|n| canonical(record(Some(format!("{n}").as_str()), "Occupied", today)))
            .collect();
        let classified: Vec<_> = units
            .iter()
            .map(|unit| (unit, UnitClassification::Occupied))
            .collect();

        let mut history: Vec<UnitRecord> = Vec::new();
        for offset in 1..=90u64 {
            let report = today - Days::new(offset);
            for n in 0..300 {
                let mut row = record(Some(format!("{n}").as_str()), "Occupied", report);
                if n < 10 && offset == 1 {
                    row.move_out_date = Some(day(2025, 10, 3));
                }
                history.push(row);
            }
        }
        history.extend(units.iter().map(|unit| unit.record.clone()));

        let projection = project_occupancy(&classified, &history, today, &defaults);
        assert_eq!(projection.departures, 10);
        assert_eq!(projection.projected_occupied, 290);
    }
}
