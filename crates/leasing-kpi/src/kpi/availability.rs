use super::dedup::{CanonicalUnit, UnitSnapshot};
use super::status::{NoticeMarker, StatusKind};
use chrono::NaiveDate;
use serde::Serialize;

/// Exposure counts behind `available_units`.
///
/// These predicates read the status text and dates only. They deliberately ignore the
/// applicant and same-day notice rules the occupancy classifier applies, so a unit can
/// be occupied for occupancy and on notice here at the same time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvailabilityBreakdown {
    pub total_vacant: u32,
    pub vacant_leased: u32,
    pub occupied_on_notice: u32,
    pub occupied_on_notice_preleased: u32,
    pub model_admin: u32,
    pub down: u32,
    pub net_exposure: i64,
    pub available_units: u32,
}

pub fn is_vacant(unit: &CanonicalUnit) -> bool {
    !unit.record.status.kind.is_occupied()
}

pub fn is_vacant_leased(unit: &CanonicalUnit) -> bool {
    let status = unit.record.status;
    is_vacant(unit) && !status.kind.is_non_revenue() && status.leased
}

pub fn is_occupied_on_notice(unit: &CanonicalUnit) -> bool {
    let record = &unit.record;
    record.status.kind == StatusKind::Occupied
        && (record.status.notice != NoticeMarker::None || record.notice_date.is_some())
}

pub fn is_occupied_on_notice_preleased(
    unit: &CanonicalUnit,
    report_date: Option<NaiveDate>,
) -> bool {
    let record = &unit.record;
    is_occupied_on_notice(unit)
        && (record.status.notice == NoticeMarker::NoticeLeased
            || record.status.leased
            || record.lease_starts_after(report_date))
}

fn is_model_admin(unit: &CanonicalUnit) -> bool {
    matches!(
        unit.record.status.kind,
        StatusKind::Model | StatusKind::Admin | StatusKind::Corporate | StatusKind::Free
    )
}

fn is_down(unit: &CanonicalUnit) -> bool {
    unit.record.status.kind == StatusKind::Down
}

/// `max(0, (vacant - vacant leased) + (on notice - on notice preleased) - model/admin - down)`.
pub fn compute_availability(snapshot: &UnitSnapshot) -> AvailabilityBreakdown {
    let units = &snapshot.units;
    let count = |keep: &dyn Fn(&CanonicalUnit) -> bool| -> u32 {
        units.iter().filter(|unit| keep(unit)).count() as u32
    };

    let total_vacant = count(&is_vacant);
    let vacant_leased = count(&is_vacant_leased);
    let occupied_on_notice = count(&is_occupied_on_notice);
    let occupied_on_notice_preleased =
        count(&|unit| is_occupied_on_notice_preleased(unit, snapshot.report_date));
    let model_admin = count(&is_model_admin);
    let down = count(&is_down);

    let net_exposure = (i64::from(total_vacant) - i64::from(vacant_leased))
        + (i64::from(occupied_on_notice) - i64::from(occupied_on_notice_preleased));
    let available = net_exposure - i64::from(model_admin) - i64::from(down);

    AvailabilityBreakdown {
        total_vacant,
        vacant_leased,
        occupied_on_notice,
        occupied_on_notice_preleased,
        model_admin,
        down,
        net_exposure,
        available_units: u32::try_from(available.max(0)).unwrap_or(u32::MAX),
    }
}
