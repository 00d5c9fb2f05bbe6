//! Occupancy and leasing KPI engine.
//!
//! Unit-detail rows are normalized into [`UnitRecord`]s, collapsed to one row per unit
//! at each property's latest report date, classified, and measured. The aggregator
//! merges those measurements with the unit-mix and weekly-summary feeds, and the
//! payload builder adds the auxiliary per-property indices the dashboard renders.

pub mod aggregate;
pub mod availability;
pub mod classify;
pub mod dedup;
pub mod domain;
pub mod index;
pub mod lookahead;
pub mod normalizer;
pub mod occupancy;
pub mod payload;
pub mod property;
pub mod rent;
pub mod status;
pub mod velocity;

pub use aggregate::{
    apply_overrides, compute_kpis, KpiOptions, KpiOverride, OccupancySource, PortfolioKpiRecord,
    PortfolioTotals, PropertyKpiRecord, DEFAULT_RECENT_LEASE_LIMIT,
};
pub use availability::{compute_availability, AvailabilityBreakdown};
pub use classify::{classify_snapshot, classify_unit, UnitClassification};
pub use dedup::{deduplicate, CanonicalUnit, UnitSnapshot};
pub use domain::{UnitKey, UnitRecord};
pub use index::FeedIndex;
pub use lookahead::{
    project_occupancy, DepartureOrder, LookaheadConfig, LookaheadHorizon, LookaheadProjection,
    MoveInOrder,
};
pub use occupancy::{ClassificationCounts, FloorPlanBreakdown, OccupancySummary};
pub use payload::{
    build_dashboard_payload, DashboardPayload, DashboardPayloadBuilder, LeasingSummary,
    PricingPoint, RecentLease, TradeOutSummary, UnitMixPlan,
};
pub use property::{PropertyKey, PropertyMap, PropertyRegistry};
pub use rent::{base_plan_type, weighted_rent, WeightedRent};
pub use status::{NoticeMarker, ParsedStatus, StatusKind};
pub use velocity::{resolve_velocity, LeaseVelocity, VelocitySource};
