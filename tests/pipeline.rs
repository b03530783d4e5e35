use happiness_report::error::ReportError;
use happiness_report::pipeline::{build_dataset, initial_state, run, ReportConfig};
use happiness_report::types::Metric;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SNAPSHOT: &str = concat!(
    "Country name,Ladder score,Explained by: Log GDP per capita,Explained by: Social support,",
    "Explained by: Healthy life expectancy,Explained by: Freedom to make life choices,",
    "Explained by: Generosity,Explained by: Perceptions of corruption,Dystopia + residual\n",
    "\
Finland,7.741,1.844,1.572,0.695,0.859,0.142,0.546,2.083
Denmark,7.583,1.908,1.520,0.699,0.823,0.204,0.548,1.881
Chile,6.360,1.550,1.310,0.650,0.560,0.110,0.080,2.100
Somaliland region,5.900,1.000,1.100,0.400,0.600,0.250,0.150,2.400
Benin,4.377,0.700,0.400,0.200,0.500,0.120,0.090,2.367
Afghanistan,1.721,0.628,0.000,0.242,0.000,0.091,0.088,0.672
Nowhere,,,,,,,,
"
);

const HISTORY: &str = "\
Country,Year,Rank,Index
Finland,2013,1,7.4
Finland,2022,1,7.821
Denmark,2022,2,7.636
Chile,2022,3,6.172
Afghanistan,2022,4,1.859
Finland,2023,1,7.804
Denmark,2023,2,7.586
Chile,2023,3,6.334
Afghanistan,2023,4,1.721
Denmark,2024,1,9.999
";

fn fixture(dir: &Path) -> ReportConfig {
    let snapshot_path = dir.join("snapshot.csv");
    let history_path = dir.join("history.csv");
    fs::write(&snapshot_path, SNAPSHOT).unwrap();
    fs::write(&history_path, HISTORY).unwrap();
    ReportConfig {
        snapshot_path,
        history_path,
        html_out: Some(dir.join("report.html")),
        json_out: Some(dir.join("charts.json")),
        ..ReportConfig::default()
    }
}

#[test]
fn builds_dataset_from_both_exports() {
    let dir = TempDir::new().unwrap();
    let config = fixture(dir.path());
    let dataset = build_dataset(&config).unwrap();

    assert_eq!(dataset.snapshot.len(), 6);
    assert_eq!(dataset.snapshot_report.dropped_rows, 1);
    assert_eq!(dataset.snapshot[0].country, "Finland");
    assert_eq!(dataset.snapshot[0].rank, 1);
    assert_eq!(dataset.snapshot[5].country, "Afghanistan");

    // 2013 excluded, snapshot rows replace the 2024 history row
    assert_eq!(dataset.controls.years, vec![2022, 2023, 2024]);
    assert!(dataset.history.iter().all(|r| r.year != 2013));
    let denmark_2024 = dataset
        .history
        .iter()
        .find(|r| r.country == "Denmark" && r.year == 2024)
        .unwrap();
    assert!((denmark_2024.happiness_score - 7.583).abs() < 1e-9);
    assert_eq!(denmark_2024.rank, 2);

    assert_eq!(dataset.unmatched_countries(), vec!["Somaliland region"]);
    assert_eq!(dataset.categories.rows.len(), 6);
    assert!(dataset.categories.degenerate.is_empty());
    assert_eq!(dataset.correlation.observations, 6);
    let (top_metric, r) = dataset.correlation.with_happiness()[0];
    assert!(Metric::ALL.contains(&top_metric));
    assert!(r > 0.0);
}

#[test]
fn initial_state_honours_configured_year_and_country() {
    let dir = TempDir::new().unwrap();
    let mut config = fixture(dir.path());
    config.year = Some(2030);
    config.country = Some("Chile".to_string());
    let dataset = build_dataset(&config).unwrap();
    let state = initial_state(&dataset, &config).unwrap();
    assert_eq!(state.year, 2024);
    assert_eq!(state.country, "Chile");

    config.country = Some("Atlantis".to_string());
    let err = initial_state(&dataset, &config).unwrap_err();
    assert!(matches!(err, ReportError::UnknownCountry { .. }));
}

#[test]
fn run_writes_html_and_chart_bundle() {
    let dir = TempDir::new().unwrap();
    let config = fixture(dir.path());
    let report = run(&config).unwrap();
    assert_eq!(report.charts().count(), 6);

    let html = fs::read_to_string(dir.path().join("report.html")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(html.matches("vegaEmbed(").count(), 6);
    assert!(html.contains("Somaliland region"));

    let bundle: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("charts.json")).unwrap()).unwrap();
    assert_eq!(bundle["charts"].as_array().map(Vec::len), Some(6));
    assert!(bundle["generated_at"].is_string());
}

#[test]
fn missing_column_is_reported_by_name() {
    let dir = TempDir::new().unwrap();
    let config = fixture(dir.path());
    fs::write(&config.history_path, "Country,Year,Index\nFinland,2023,7.8\n").unwrap();
    match build_dataset(&config) {
        Err(ReportError::MissingColumn { column, .. }) => assert_eq!(column, "Rank"),
        other => panic!("expected a missing column error, got {other:?}"),
    }
}

#[test]
fn empty_snapshot_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = fixture(dir.path());
    let header = SNAPSHOT.lines().next().unwrap();
    fs::write(&config.snapshot_path, format!("{header}\n")).unwrap();
    assert!(matches!(build_dataset(&config), Err(ReportError::EmptyTable { .. })));
}

#[test]
fn geo_overrides_resolve_unmatched_names() {
    let dir = TempDir::new().unwrap();
    let mut config = fixture(dir.path());
    let codes = dir.path().join("codes.csv");
    fs::write(&codes, "name,numeric,alpha3\nSomaliland region,706,SOM\n").unwrap();
    config.geo_codes = Some(codes);
    let dataset = build_dataset(&config).unwrap();
    assert!(dataset.unmatched_countries().is_empty());
}
