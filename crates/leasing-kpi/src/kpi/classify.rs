use super::dedup::{CanonicalUnit, UnitSnapshot};
use super::status::{NoticeMarker, StatusKind};
use chrono::Days;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClassification {
    Occupied,
    OccupiedNoticeNotPreleased,
    OccupiedNoticePreleased,
    VacantPlain,
    VacantLeased,
    Model,
    Admin,
    Down,
    Excluded,
}

impl UnitClassification {
    pub const ALL: [Self; 9] = [
        Self::Occupied,
        Self::OccupiedNoticeNotPreleased,
        Self::OccupiedNoticePreleased,
        Self::VacantPlain,
        Self::VacantLeased,
        Self::Model,
        Self::Admin,
        Self::Down,
        Self::Excluded,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Occupied => "Occupied",
            Self::OccupiedNoticeNotPreleased => "Occupied - Notice (Not Preleased)",
            Self::OccupiedNoticePreleased => "Occupied - Notice (Preleased)",
            Self::VacantPlain => "Vacant",
            Self::VacantLeased => "Vacant - Leased",
            Self::Model => "Model",
            Self::Admin => "Admin",
            Self::Down => "Down",
            Self::Excluded => "Excluded",
        }
    }

    pub const fn is_occupied(self) -> bool {
        matches!(
            self,
            Self::Occupied | Self::OccupiedNoticeNotPreleased | Self::OccupiedNoticePreleased
        )
    }

    pub const fn is_leased(self) -> bool {
        matches!(
            self,
            Self::Occupied | Self::OccupiedNoticePreleased | Self::VacantLeased
        )
    }
}

/// Classifies one deduplicated unit of `snapshot` as of the snapshot's report date.
///
/// An otherwise occupied unit is treated as vacant when the notice was recorded on the
/// report date and the unit also had an applicant row, or when the notice was recorded
/// on the report date or the day before with no move-out date. The NTV marker does not
/// keep a same-day notice occupied.
pub fn classify_unit(unit: &CanonicalUnit, snapshot: &UnitSnapshot) -> UnitClassification {
    let report_date = snapshot.report_date;
    let record = &unit.record;
    let status = record.status;

    let vacant = || {
        if status.leased {
            UnitClassification::VacantLeased
        } else {
            UnitClassification::VacantPlain
        }
    };

    match status.kind {
        StatusKind::Down => return UnitClassification::Down,
        StatusKind::Model => return UnitClassification::Model,
        StatusKind::Admin | StatusKind::Corporate => return UnitClassification::Admin,
        StatusKind::Free => return UnitClassification::Excluded,
        StatusKind::PendingRenewal => return UnitClassification::Occupied,
        StatusKind::Occupied => {}
        StatusKind::Empty
        | StatusKind::Vacant
        | StatusKind::Applicant
        | StatusKind::Pending
        | StatusKind::Other => return vacant(),
    }

    if let (Some(report), Some(notice)) = (report_date, record.notice_date) {
        let same_day = notice == report;
        let day_before = report.checked_sub_days(Days::new(1)) == Some(notice);
        let no_move_out = record.move_out_date.is_none();

        if same_day && snapshot.has_applicant(&unit.key) {
            return vacant();
        }
        if no_move_out && (same_day || day_before) {
            return vacant();
        }
    }

    match status.notice {
        NoticeMarker::None => UnitClassification::Occupied,
        NoticeMarker::NoticeLeased => UnitClassification::OccupiedNoticePreleased,
        NoticeMarker::Notice if record.lease_starts_after(report_date) => {
            UnitClassification::OccupiedNoticePreleased
        }
        NoticeMarker::Notice => UnitClassification::OccupiedNoticeNotPreleased,
    }
}

/// Classifies every unit of a snapshot, in snapshot order.
pub fn classify_snapshot(snapshot: &UnitSnapshot) -> Vec<(&CanonicalUnit, UnitClassification)> {
    snapshot
        .units
        .iter()
        .map(|unit| {
            let class = classify_unit(unit, snapshot);
            (unit, class)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::dedup::deduplicate;
    use crate::kpi::domain::fixtures::{day, record};
    use crate::kpi::domain::{UnitKey, UnitRecord};

    fn classify_alone(record: UnitRecord) -> UnitClassification {
        let snapshot = UnitSnapshot {
            report_date: record.report_date,
            ..UnitSnapshot::default()
        };
        let unit = CanonicalUnit {
            key: UnitKey::Identified("A1|101".to_string()),
            record,
        };
        classify_unit(&unit, &snapshot)
    }

    #[test]
    fn maps_non_revenue_statuses() {
        let report = day(2025, 9, 24);
        assert_eq!(classify_alone(record(Some("1"), "Down", report)), UnitClassification::Down);
        assert_eq!(classify_alone(record(Some("1"), "Model", report)), UnitClassification::Model);
        assert_eq!(
            classify_alone(record(Some("1"), "Corporate", report)),
            UnitClassification::Admin
        );
        assert_eq!(
            classify_alone(record(Some("1"), "Free Unit", report)),
            UnitClassification::Excluded
        );
        assert!(!UnitClassification::Model.is_leased());
    }

    #[test]
    fn vacant_leased_and_plain() {
        let report = day(2025, 9, 24);
        assert_eq!(
            classify_alone(record(Some("1"), "Vacant-Leased", report)),
            UnitClassification::VacantLeased
        );
        assert_eq!(
            classify_alone(record(Some("1"), "Vacant", report)),
            UnitClassification::VacantPlain
        );
        assert_eq!(classify_alone(record(Some("1"), "", report)), UnitClassification::VacantPlain);
    }

    #[test]
    fn pending_renewal_is_always_occupied() {
        let report = day(2025, 9, 24);
        let mut row = record(Some("1"), "Pending Renewal", report);
        row.notice_date = Some(report);
        assert_eq!(classify_alone(row), UnitClassification::Occupied);
    }

    #[test]
    fn notice_given_today_without_move_out_flips_to_vacant() {
        let report = day(2025, 9, 24);
        let mut row = record(Some("1"), "Occupied", report);
        row.notice_date = Some(report);
        assert_eq!(classify_alone(row.clone()), UnitClassification::VacantPlain);

        row.move_out_date = Some(day(2025, 10, 31));
        assert_eq!(classify_alone(row), UnitClassification::Occupied);
    }

    #[test]
    fn notice_given_yesterday_without_move_out_flips_to_vacant() {
        let report = day(2025, 9, 24);
        let mut row = record(Some("1"), "Occupied NTV", report);
        row.notice_date = Some(day(2025, 9, 23));
        assert_eq!(classify_alone(row), UnitClassification::VacantPlain);
    }

    #[test]
    fn same_day_notice_flips_to_vacant_even_with_ntv_marker() {
        let report = day(2025, 9, 24);
        let mut row = record(Some("1"), "Occupied NTV", report);
        row.notice_date = Some(report);
        assert_eq!(classify_alone(row.clone()), UnitClassification::VacantPlain);

        row.move_out_date = Some(day(2025, 10, 31));
        assert_eq!(classify_alone(row), UnitClassification::OccupiedNoticeNotPreleased);
    }

    #[test]
    fn applicant_row_on_notice_day_flips_to_vacant() {
        let report = day(2025, 9, 24);
        let mut occupied = record(Some("101"), "Occupied NTV", report);
        occupied.notice_date = Some(report);
        occupied.move_out_date = Some(day(2025, 10, 20));
        let applicant = record(Some("101"), "Applicant", report);

        let snapshot = deduplicate(&[occupied, applicant]);
        let classes = classify_snapshot(&snapshot);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].1, UnitClassification::VacantPlain);
    }

    #[test]
    fn notice_split_by_prelease() {
        let report = day(2025, 9, 24);
        let mut ntv = record(Some("1"), "Occupied NTV", report);
        ntv.notice_date = Some(day(2025, 9, 1));
        assert_eq!(classify_alone(ntv.clone()), UnitClassification::OccupiedNoticeNotPreleased);

        ntv.lease_start = Some(day(2025, 10, 15));
        assert_eq!(classify_alone(ntv), UnitClassification::OccupiedNoticePreleased);

        let ntvl = record(Some("1"), "Occupied NTVL", report);
        assert_eq!(classify_alone(ntvl), UnitClassification::OccupiedNoticePreleased);
        assert!(!UnitClassification::OccupiedNoticeNotPreleased.is_leased());
        assert!(UnitClassification::OccupiedNoticeNotPreleased.is_occupied());
    }
}
