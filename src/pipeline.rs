// One pass from the two survey exports to the rendered report:
// load -> normalize -> derive -> geo-join -> charts -> output.
use crate::charts::LEADERBOARD_SIZE;
use crate::derive::{
    categorize, contribution_ratios, relative_happiness, score_breakup, spearman_matrix,
    BreakupCell, CategoryTable, ContributionRow, CorrelationMatrix, RelativeHappiness,
};
use crate::error::{ReportError, ReportResult};
use crate::geo::{match_countries, CountryCodes, GeoMatch, IsoTable};
use crate::interaction::{Controls, InteractionState};
use crate::loader::{self, HistoryEntry, LoadReport, HISTORY_TABLE, SNAPSHOT_TABLE};
use crate::normalize::{
    build_history, decomposition_outliers, rank_snapshot, NormalizePolicy, DECOMPOSITION_TOLERANCE,
};
use crate::output;
use crate::report::{self, Report};
use crate::types::{CountryMetricBreakdown, CountryYearRecord, SnapshotEntry};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub snapshot_path: PathBuf,
    pub history_path: PathBuf,
    pub policy: NormalizePolicy,
    /// Initial country of the history chart; the seed country when `None`.
    pub country: Option<String>,
    /// Initial slider year; the latest year when `None`.
    pub year: Option<i32>,
    pub geo_codes: Option<PathBuf>,
    pub html_out: Option<PathBuf>,
    pub json_out: Option<PathBuf>,
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("WHR2024.csv"),
            history_path: PathBuf::from("WorldHappinessIndex2013-2023.csv"),
            policy: NormalizePolicy::default(),
            country: None,
            year: None,
            geo_codes: None,
            html_out: Some(PathBuf::from("happiness_report.html")),
            json_out: None,
            preview_rows: 5,
        }
    }
}

/// Every table the charts read, built once per run and never mutated.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub snapshot_year: i32,
    pub snapshot: Vec<CountryMetricBreakdown>,
    pub history: Vec<CountryYearRecord>,
    pub contributions: Vec<ContributionRow>,
    pub correlation: CorrelationMatrix,
    pub categories: CategoryTable,
    pub relative: Vec<RelativeHappiness>,
    pub breakup: Vec<BreakupCell>,
    pub geo: BTreeMap<String, GeoMatch>,
    pub controls: Controls,
    pub snapshot_report: LoadReport,
    pub history_report: LoadReport,
    pub decomposition_outliers: Vec<(String, f64)>,
}

impl Dataset {
    /// Names that resolved to no ISO code.
    pub fn unmatched_countries(&self) -> Vec<&str> {
        self.geo
            .iter()
            .filter(|(_, m)| !m.is_matched())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Normalize and derive from already-loaded tables.
pub fn prepare(
    snapshot: (Vec<SnapshotEntry>, LoadReport),
    history: (Vec<HistoryEntry>, LoadReport),
    policy: &NormalizePolicy,
    codes: &dyn CountryCodes,
) -> ReportResult<Dataset> {
    let (snapshot_entries, snapshot_report) = snapshot;
    let (history_entries, history_report) = history;
    if snapshot_entries.is_empty() {
        return Err(ReportError::EmptyTable { table: SNAPSHOT_TABLE.to_string() });
    }

    let ranked = rank_snapshot(snapshot_entries);
    let outliers = decomposition_outliers(&ranked, DECOMPOSITION_TOLERANCE);
    let records = build_history(&ranked, history_entries, policy);
    if records.is_empty() {
        return Err(ReportError::EmptyTable { table: HISTORY_TABLE.to_string() });
    }

    let contributions = contribution_ratios(&ranked);
    let correlation = spearman_matrix(&ranked);
    let categories = categorize(&ranked);
    let relative = relative_happiness(&records);
    let breakup = score_breakup(&ranked, LEADERBOARD_SIZE);
    let geo = match_countries(
        codes,
        ranked.iter().map(|r| r.country.as_str()).chain(records.iter().map(|r| r.country.as_str())),
    );
    let controls = Controls::from_records(&records);
    info!(
        "prepared {} snapshot countries, {} history records over {} year(s)",
        ranked.len(),
        records.len(),
        controls.years.len()
    );

    Ok(Dataset {
        snapshot_year: policy.snapshot_year,
        snapshot: ranked,
        history: records,
        contributions,
        correlation,
        categories,
        relative,
        breakup,
        geo,
        controls,
        snapshot_report,
        history_report,
        decomposition_outliers: outliers,
    })
}

pub fn build_dataset(config: &ReportConfig) -> ReportResult<Dataset> {
    let snapshot = loader::load_snapshot(&config.snapshot_path)?;
    let history = loader::load_history(&config.history_path)?;
    let mut codes = IsoTable::builtin();
    if let Some(path) = &config.geo_codes {
        codes.load_overrides(path)?;
    }
    prepare(snapshot, history, &config.policy, &codes)
}

/// Defaults from the data, overridden by the configured year and country.
pub fn initial_state(dataset: &Dataset, config: &ReportConfig) -> ReportResult<InteractionState> {
    let controls = &dataset.controls;
    let mut state = controls.default_state();
    if let Some(year) = config.year {
        state = controls.select_year(state, year);
    }
    if let Some(country) = &config.country {
        state = controls.select_country(state, country)?;
    }
    Ok(state)
}

pub fn run(config: &ReportConfig) -> ReportResult<Report> {
    let dataset = build_dataset(config)?;
    let state = initial_state(&dataset, config)?;
    let report = report::build_report(&dataset, &state);

    output::print_previews(&dataset, &state, config.preview_rows);
    if let Some(path) = &config.html_out {
        output::write_html(path, &report)?;
        info!("report written to {}", path.display());
    }
    if let Some(path) = &config.json_out {
        output::write_chart_bundle(path, &report)?;
        info!("chart bundle written to {}", path.display());
    }
    Ok(report)
}
