// Entry point: parse the CLI, run the report once and exit.
//
// Loads both survey exports, prints markdown previews of the prepared
// tables and writes the interactive HTML page (and optionally the raw chart
// specs as JSON).
use anyhow::{Context, Result};
use clap::Parser;
use happiness_report::normalize::NormalizePolicy;
use happiness_report::ReportConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Render the World Happiness Report narrative dashboard")]
struct Cli {
    /// Single-year export with the "Explained by" columns
    #[arg(long, default_value = "WHR2024.csv")]
    snapshot: PathBuf,

    /// Multi-year export with Country, Year, Rank and Index columns
    #[arg(long, default_value = "WorldHappinessIndex2013-2023.csv")]
    history: PathBuf,

    /// Year the single-year export belongs to
    #[arg(long, default_value_t = 2024)]
    snapshot_year: i32,

    /// Years dropped from the history (repeatable)
    #[arg(long = "exclude-year", default_values_t = [2013, 2014])]
    exclude_years: Vec<i32>,

    /// Country the history chart opens on
    #[arg(long)]
    country: Option<String>,

    /// Initial year of the sliders; latest year when omitted
    #[arg(long)]
    year: Option<i32>,

    /// Extra country-name to ISO code mappings (name,numeric,alpha3)
    #[arg(long)]
    geo_codes: Option<PathBuf>,

    #[arg(long, default_value = "happiness_report.html")]
    out: PathBuf,

    /// Also write every chart spec to this JSON file
    #[arg(long)]
    json_out: Option<PathBuf>,

    #[arg(long, default_value_t = 5)]
    preview_rows: usize,
}

impl From<Cli> for ReportConfig {
    fn from(cli: Cli) -> Self {
        ReportConfig {
            snapshot_path: cli.snapshot,
            history_path: cli.history,
            policy: NormalizePolicy {
                snapshot_year: cli.snapshot_year,
                excluded_years: cli.exclude_years,
            },
            country: cli.country,
            year: cli.year,
            geo_codes: cli.geo_codes,
            html_out: Some(cli.out),
            json_out: cli.json_out,
            preview_rows: cli.preview_rows,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ReportConfig::from(Cli::parse());
    let report = happiness_report::run(&config).with_context(|| {
        format!(
            "failed to build the report from {} and {}",
            config.snapshot_path.display(),
            config.history_path.display()
        )
    })?;
    println!("Rendered {} charts.", report.charts().count());
    Ok(())
}
