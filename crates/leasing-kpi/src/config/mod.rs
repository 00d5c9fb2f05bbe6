use crate::feeds::DatasetKind;
use crate::kpi::{
    DepartureOrder, KpiOptions, LookaheadConfig, LookaheadHorizon, MoveInOrder,
    DEFAULT_RECENT_LEASE_LIMIT,
};
use chrono::NaiveDate;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
    /// Default dataset files from `KPI_DATASET_*`, in canonical dataset order.
    pub datasets: Vec<(DatasetKind, PathBuf)>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let datasets = DatasetKind::ALL
            .into_iter()
            .filter_map(|kind| {
                env::var(kind.env_var())
                    .ok()
                    .filter(|path| !path.trim().is_empty())
                    .map(|path| (kind, PathBuf::from(path.trim())))
            })
            .collect();

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
            datasets,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine defaults that the command line may override per run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub lookahead: LookaheadConfig,
    pub recent_lease_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead: LookaheadConfig::default(),
            recent_lease_limit: DEFAULT_RECENT_LEASE_LIMIT,
        }
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let weeks = env::var("KPI_LOOKAHEAD_WEEKS")
            .unwrap_or_else(|_| "4".to_string())
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidLookaheadWeeks)?;

        let horizon = match env::var("KPI_LOOKAHEAD_TARGET") {
            Ok(value) if !value.trim().is_empty() => {
                let target = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|_| ConfigError::InvalidLookaheadTarget { value })?;
                LookaheadHorizon::TargetDate(target)
            }
            _ => LookaheadHorizon::Weeks(weeks),
        };

        let move_in_order = match env::var("KPI_LOOKAHEAD_MOVE_IN_ORDER") {
            Ok(value) => parse_move_in_order(&value)
                .ok_or(ConfigError::InvalidMoveInOrder { value })?,
            Err(_) => MoveInOrder::default(),
        };

        let departure_order = match env::var("KPI_LOOKAHEAD_DEPARTURE_ORDER") {
            Ok(value) => parse_departure_order(&value)
                .ok_or(ConfigError::InvalidDepartureOrder { value })?,
            Err(_) => DepartureOrder::default(),
        };

        let recent_lease_limit = env::var("KPI_RECENT_LEASES_LIMIT")
            .unwrap_or_else(|_| DEFAULT_RECENT_LEASE_LIMIT.to_string())
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidRecentLeaseLimit)?;

        Ok(Self {
            lookahead: LookaheadConfig {
                horizon,
                move_in_order,
                departure_order,
            },
            recent_lease_limit,
        })
    }

    /// Options for one run anchored at `today`.
    pub fn options(&self, today: NaiveDate) -> KpiOptions {
        KpiOptions {
            lookahead: self.lookahead,
            recent_lease_limit: self.recent_lease_limit,
            ..KpiOptions::new(today)
        }
    }
}

pub fn parse_move_in_order(value: &str) -> Option<MoveInOrder> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lease_start_first" | "lease-start-first" => Some(MoveInOrder::LeaseStartFirst),
        "move_in_first" | "move-in-first" => Some(MoveInOrder::MoveInFirst),
        _ => None,
    }
}

pub fn parse_departure_order(value: &str) -> Option<DepartureOrder> {
    match value.trim().to_ascii_lowercase().as_str() {
        "notice_first" | "notice-first" => Some(DepartureOrder::NoticeFirst),
        "move_out_first" | "move-out-first" => Some(DepartureOrder::MoveOutFirst),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidLookaheadWeeks,
    InvalidLookaheadTarget { value: String },
    InvalidMoveInOrder { value: String },
    InvalidDepartureOrder { value: String },
    InvalidRecentLeaseLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLookaheadWeeks => {
                write!(f, "KPI_LOOKAHEAD_WEEKS must be a non-negative whole number")
            }
            ConfigError::InvalidLookaheadTarget { value } => {
                write!(f, "KPI_LOOKAHEAD_TARGET '{value}' must be a YYYY-MM-DD date")
            }
            ConfigError::InvalidMoveInOrder { value } => write!(
                f,
                "KPI_LOOKAHEAD_MOVE_IN_ORDER '{value}' must be lease_start_first or move_in_first"
            ),
            ConfigError::InvalidDepartureOrder { value } => write!(
                f,
                "KPI_LOOKAHEAD_DEPARTURE_ORDER '{value}' must be notice_first or move_out_first"
            ),
            ConfigError::InvalidRecentLeaseLimit => {
                write!(f, "KPI_RECENT_LEASES_LIMIT must be a non-negative whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
