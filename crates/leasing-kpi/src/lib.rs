//! Occupancy, leasing and availability KPIs for a property portfolio, computed from the
//! nightly property-management extracts.

pub mod config;
pub mod error;
pub mod feeds;
pub mod kpi;
pub mod telemetry;

pub use error::AppError;
pub use feeds::{DatasetKind, FeedLoadError, FeedSet};
pub use kpi::{
    apply_overrides, build_dashboard_payload, compute_kpis, DashboardPayload,
    DashboardPayloadBuilder, KpiOptions, KpiOverride, PortfolioKpiRecord, PropertyKpiRecord,
    PropertyMap,
};
