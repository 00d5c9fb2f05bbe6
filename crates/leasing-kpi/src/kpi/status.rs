use super::normalizer::fold_text;
use serde::Serialize;

/// What a free-text lease status says about the unit, decided once per row.
///
/// The checks run in a fixed order: the non-revenue and vacant markers win over
/// everything else, then "pending renewal", then "occupied". A status such as
/// "Vacant - Model" is therefore a model unit, and "Occupied (vacant soon)" is vacant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Empty,
    Down,
    Model,
    Admin,
    Corporate,
    Free,
    Vacant,
    PendingRenewal,
    Occupied,
    Applicant,
    Pending,
    Other,
}

impl StatusKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "No Status",
            Self::Down => "Down",
            Self::Model => "Model",
            Self::Admin => "Admin",
            Self::Corporate => "Corporate",
            Self::Free => "Free",
            Self::Vacant => "Vacant",
            Self::PendingRenewal => "Pending Renewal",
            Self::Occupied => "Occupied",
            Self::Applicant => "Applicant",
            Self::Pending => "Pending",
            Self::Other => "Other",
        }
    }

    pub const fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied | Self::PendingRenewal)
    }

    /// Units that never count as leasable inventory.
    pub const fn is_non_revenue(self) -> bool {
        matches!(
            self,
            Self::Down | Self::Model | Self::Admin | Self::Corporate | Self::Free
        )
    }
}

/// Notice-to-vacate marker carried by an occupied status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeMarker {
    None,
    /// "NTV": on notice, not yet re-leased.
    Notice,
    /// "NTVL": on notice and already re-leased.
    NoticeLeased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ParsedStatus {
    pub kind: StatusKind,
    pub notice: NoticeMarker,
    /// The text mentions "leased" (e.g. "Vacant-Leased", "Notice Leased").
    pub leased: bool,
    /// The text mentions "applicant".
    pub applicant: bool,
    /// The text mentions "renewal" anywhere.
    pub renewal: bool,
}

impl ParsedStatus {
    pub fn parse(raw: &str) -> Self {
        let text = fold_text(raw);
        let kind = classify_kind(&text);

        let notice = if text.contains("ntvl") {
            NoticeMarker::NoticeLeased
        } else if text.contains("ntv") {
            NoticeMarker::Notice
        } else {
            NoticeMarker::None
        };

        Self {
            kind,
            notice,
            leased: text.contains("leased"),
            applicant: text.contains("applicant"),
            renewal: text.contains("renewal"),
        }
    }

    pub fn from_optional(raw: Option<&str>) -> Self {
        Self::parse(raw.unwrap_or_default())
    }

    /// Status priority used to pick one row per unit when duplicates exist; lower wins.
    pub const fn dedup_priority(&self) -> u8 {
        match self.kind {
            StatusKind::Occupied | StatusKind::PendingRenewal => 1,
            StatusKind::Vacant | StatusKind::Other if self.leased => 2,
            StatusKind::Vacant => 3,
            StatusKind::Pending => 4,
            StatusKind::Model => 5,
            _ => 6,
        }
    }
}

fn classify_kind(text: &str) -> StatusKind {
    const ORDERED: &[(&str, StatusKind)] = &[
        ("down", StatusKind::Down),
        ("model", StatusKind::Model),
        ("admin", StatusKind::Admin),
        ("corporate", StatusKind::Corporate),
        ("free", StatusKind::Free),
        ("vacant", StatusKind::Vacant),
        ("pending renewal", StatusKind::PendingRenewal),
        ("occupied", StatusKind::Occupied),
        ("applicant", StatusKind::Applicant),
        ("pending", StatusKind::Pending),
    ];

    if text.is_empty() {
        return StatusKind::Empty;
    }

    ORDERED
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, kind)| *kind)
        .unwrap_or(StatusKind::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_statuses() {
        assert_eq!(ParsedStatus::parse("Occupied").kind, StatusKind::Occupied);
        assert_eq!(ParsedStatus::parse("  ").kind, StatusKind::Empty);
        assert_eq!(ParsedStatus::parse("Vacant-Leased").kind, StatusKind::Vacant);
        assert!(ParsedStatus::parse("Vacant-Leased").leased);
        assert_eq!(
            ParsedStatus::parse("Pending Renewal").kind,
            StatusKind::PendingRenewal
        );
        assert_eq!(ParsedStatus::parse("Applicant").kind, StatusKind::Applicant);
        assert_eq!(ParsedStatus::parse("Pending").kind, StatusKind::Pending);
        assert_eq!(ParsedStatus::parse("Notice").kind, StatusKind::Other);
    }

    #[test]
    fn non_revenue_markers_win_over_occupied() {
        assert_eq!(ParsedStatus::parse("Occupied - Model").kind, StatusKind::Model);
        assert_eq!(ParsedStatus::parse("Down Unit").kind, StatusKind::Down);
        assert_eq!(
            ParsedStatus::parse("Vacant pending renewal").kind,
            StatusKind::Vacant
        );
        assert_eq!(ParsedStatus::parse("Occupied - Corporate").kind, StatusKind::Corporate);
    }

    #[test]
    fn notice_markers_distinguish_ntv_from_ntvl() {
        assert_eq!(ParsedStatus::parse("Occupied NTV").notice, NoticeMarker::Notice);
        assert_eq!(
            ParsedStatus::parse("Occupied-NTVL").notice,
            NoticeMarker::NoticeLeased
        );
        assert_eq!(ParsedStatus::parse("Occupied").notice, NoticeMarker::None);
    }

    #[test]
    fn dedup_priority_orders_occupied_first_and_applicant_last() {
        let ordered = [
            "Occupied",
            "Vacant-Leased",
            "Vacant",
            "Pending",
            "Model",
            "Applicant",
        ]
        .map(|status| ParsedStatus::parse(status).dedup_priority());
        assert_eq!(ordered, [1, 2, 3, 4, 5, 6]);
        assert_eq!(ParsedStatus::parse("Down").dedup_priority(), 6);
    }
}
