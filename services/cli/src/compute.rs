use crate::infra::{read_json_file, write_json};
use chrono::{Local, NaiveDate};
use clap::Args;
use leasing_kpi::config::AppConfig;
use leasing_kpi::error::AppError;
use leasing_kpi::feeds::{
    load_local_datasets, load_payload_file, DatasetKind, FeedLoadError, FeedSet,
};
use leasing_kpi::kpi::{DashboardPayloadBuilder, KpiOverride, LookaheadHorizon, PropertyMap};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Where the datasets come from. Shared by every subcommand.
#[derive(Args, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Dataset file as KEY=PATH (for example `leasing=data/leasing.json`). Repeatable.
    #[arg(
        long = "local",
        value_name = "KEY=PATH",
        value_parser = crate::infra::parse_dataset_source
    )]
    pub(crate) local: Vec<(String, PathBuf)>,
    /// Full sync payload holding every dataset under its key
    #[arg(long)]
    pub(crate) payload: Option<PathBuf>,
    /// Only keep this dataset key after loading
    #[arg(long, value_name = "KEY")]
    pub(crate) only: Option<String>,
    /// Drop the portfolioUnitDetails dataset after loading
    #[arg(long = "skip-pud")]
    pub(crate) skip_unit_details: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ComputeArgs {
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
    /// Reference date for velocity windows (YYYY-MM-DD). Defaults to --today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Start of the lookahead window (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Lookahead window length in weeks
    #[arg(long, conflicts_with = "lookahead_target")]
    pub(crate) lookahead_weeks: Option<u32>,
    /// Lookahead window end date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) lookahead_target: Option<NaiveDate>,
    /// JSON object mapping property name to a status such as "Dead"
    #[arg(long)]
    pub(crate) status_overrides: Option<PathBuf>,
    /// JSON object mapping property name to KPI field overrides
    #[arg(long)]
    pub(crate) kpi_overrides: Option<PathBuf>,
    /// Write the payload here instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub(crate) pretty: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SummaryArgs {
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
}

pub(crate) fn run_compute(args: ComputeArgs, config: &AppConfig) -> Result<(), AppError> {
    let ComputeArgs {
        sources,
        as_of,
        today,
        lookahead_weeks,
        lookahead_target,
        status_overrides,
        kpi_overrides,
        output,
        pretty,
    } = args;

    let feeds = load_feeds(&sources, config)?;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let mut options = config.engine.options(today);
    options.as_of = as_of;
    if let Some(weeks) = lookahead_weeks {
        options.lookahead.horizon = LookaheadHorizon::Weeks(weeks);
    }
    if let Some(target) = lookahead_target {
        options.lookahead.horizon = LookaheadHorizon::TargetDate(target);
    }

    let mut builder = DashboardPayloadBuilder::new(&feeds, options);
    if let Some(path) = status_overrides {
        builder = builder.with_status_overrides(read_json_file::<PropertyMap<String>>(&path)?);
    }
    if let Some(path) = kpi_overrides {
        builder = builder.with_kpi_overrides(read_json_file::<PropertyMap<KpiOverride>>(&path)?);
    }

    let payload = builder.build();
    info!(
        as_of = %payload.as_of,
        properties = payload.portfolio.properties.len(),
        suppressed = payload.suppressed.len(),
        "computed dashboard payload"
    );

    write_json(&payload, output.as_deref(), pretty)
}

pub(crate) fn run_summary(args: SummaryArgs, config: &AppConfig) -> Result<(), AppError> {
    let feeds = load_feeds(&args.sources, config)?;
    let keys: Vec<&str> = feeds.present().into_iter().map(DatasetKind::key).collect();
    let summary = json!({
        "keys": keys,
        "total_rows": feeds.total_rows(),
    });

    write_json(&summary, None, true)
}

/// Explicit `--payload`/`--local` sources win; `KPI_DATASET_*` paths are used otherwise.
fn load_feeds(sources: &SourceArgs, config: &AppConfig) -> Result<FeedSet, AppError> {
    let SourceArgs {
        local,
        payload,
        only,
        skip_unit_details,
    } = sources;

    let mut feeds = match payload {
        Some(path) => load_payload_file(path)?,
        None => FeedSet::default(),
    };

    if !local.is_empty() {
        feeds.merge(load_local_datasets(local)?);
    } else if payload.is_none() {
        let configured: Vec<(String, PathBuf)> = config
            .datasets
            .iter()
            .map(|(kind, path)| (kind.key().to_string(), path.clone()))
            .collect();
        if configured.is_empty() {
            return Err(AppError::Usage(
                "no datasets given; pass --payload, --local KEY=PATH or set KPI_DATASET_* variables"
                    .to_string(),
            ));
        }
        feeds = load_local_datasets(&configured)?;
    }

    if *skip_unit_details {
        info!(
            dropped = feeds.unit_details.len(),
            dataset = DatasetKind::UnitDetails.key(),
            "skipping unit details"
        );
        feeds.unit_details.clear();
    }

    match only {
        Some(key) => {
            let kind = DatasetKind::from_key(key).ok_or_else(|| FeedLoadError::UnknownDataset {
                key: key.to_string(),
                expected: DatasetKind::known_keys(),
            })?;
            Ok(feeds.retain_only(kind))
        }
        None => Ok(feeds),
    }
}
