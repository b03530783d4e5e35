use crate::error::{ReportError, ReportResult};
use crate::types::{Metric, MetricValues, RawHistoryRow, RawSnapshotRow, SnapshotEntry};
use crate::util::{clean_text, parse_f64_safe, parse_i32_safe, parse_rank_safe};
use csv::{Reader, ReaderBuilder, Trim};
use log::{debug, info, warn};
use std::io::Read;
use std::path::Path;

pub const SNAPSHOT_TABLE: &str = "single-year";
pub const HISTORY_TABLE: &str = "multi-year";

/// A history row exactly as published, before year exclusion and the snapshot
/// append.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub country: String,
    pub year: i32,
    pub rank: u32,
    pub happiness_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
}

pub fn snapshot_columns() -> Vec<&'static str> {
    let mut cols = vec!["Country name", "Ladder score"];
    cols.extend(Metric::ALL.iter().map(|m| m.source_column()));
    cols.push("Dystopia + residual");
    cols
}

pub const HISTORY_COLUMNS: [&str; 4] = ["Country", "Year", "Rank", "Index"];

pub fn load_snapshot(path: impl AsRef<Path>) -> ReportResult<(Vec<SnapshotEntry>, LoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).trim(Trim::Headers).from_path(path)?;
    read_snapshot(rdr)
}

pub fn load_history(path: impl AsRef<Path>) -> ReportResult<(Vec<HistoryEntry>, LoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).trim(Trim::Headers).from_path(path)?;
    read_history(rdr)
}

/// Fails with `MissingColumn` naming the first required header absent from
/// the file.
fn require_columns<R: Read>(
    rdr: &mut Reader<R>,
    table: &str,
    required: &[&str],
) -> ReportResult<()> {
    let headers = rdr.headers()?;
    for col in required {
        if !headers.iter().any(|h| h == *col) {
            return Err(ReportError::MissingColumn {
                table: table.to_string(),
                column: col.to_string(),
            });
        }
    }
    Ok(())
}

pub fn read_snapshot<R: Read>(
    mut rdr: Reader<R>,
) -> ReportResult<(Vec<SnapshotEntry>, LoadReport)> {
    require_columns(&mut rdr, SNAPSHOT_TABLE, &snapshot_columns())?;

    let mut total_rows = 0usize;
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawSnapshotRow>() {
        total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{SNAPSHOT_TABLE} row {total_rows}: unreadable ({e})");
                continue;
            }
        };
        match clean_snapshot_row(raw) {
            Some(entry) => rows.push(entry),
            None => debug!("{SNAPSHOT_TABLE} row {total_rows}: incomplete, dropped"),
        }
    }

    let report = finish(SNAPSHOT_TABLE, total_rows, rows.len());
    Ok((rows, report))
}

pub fn read_history<R: Read>(mut rdr: Reader<R>) -> ReportResult<(Vec<HistoryEntry>, LoadReport)> {
    require_columns(&mut rdr, HISTORY_TABLE, &HISTORY_COLUMNS)?;

    let mut total_rows = 0usize;
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawHistoryRow>() {
        total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{HISTORY_TABLE} row {total_rows}: unreadable ({e})");
                continue;
            }
        };
        match clean_history_row(raw) {
            Some(entry) => rows.push(entry),
            None => debug!("{HISTORY_TABLE} row {total_rows}: incomplete, dropped"),
        }
    }

    let report = finish(HISTORY_TABLE, total_rows, rows.len());
    Ok((rows, report))
}

fn finish(table: &str, total_rows: usize, kept_rows: usize) -> LoadReport {
    let dropped_rows = total_rows - kept_rows;
    if dropped_rows > 0 {
        warn!("{table} table: dropped {dropped_rows} incomplete row(s) of {total_rows}");
    }
    info!("{table} table: {kept_rows} row(s) loaded");
    LoadReport { total_rows, kept_rows, dropped_rows }
}

fn clean_snapshot_row(raw: RawSnapshotRow) -> Option<SnapshotEntry> {
    let country = clean_text(raw.country)?;
    let happiness_score = parse_f64_safe(raw.ladder_score.as_deref())?;
    let metrics = MetricValues::new([
        parse_f64_safe(raw.gdp.as_deref())?,
        parse_f64_safe(raw.social_support.as_deref())?,
        parse_f64_safe(raw.healthy_life_expectancy.as_deref())?,
        parse_f64_safe(raw.freedom.as_deref())?,
        parse_f64_safe(raw.generosity.as_deref())?,
        parse_f64_safe(raw.perceptions_of_corruption.as_deref())?,
    ]);
    let dystopia_residual = parse_f64_safe(raw.dystopia_residual.as_deref())?;
    Some(SnapshotEntry { country, happiness_score, metrics, dystopia_residual })
}

fn clean_history_row(raw: RawHistoryRow) -> Option<HistoryEntry> {
    Some(HistoryEntry {
        country: clean_text(raw.country)?,
        year: parse_i32_safe(raw.year.as_deref())?,
        rank: parse_rank_safe(raw.rank.as_deref())?,
        happiness_score: parse_f64_safe(raw.index.as_deref())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &str) -> Reader<&[u8]> {
        ReaderBuilder::new().flexible(true).trim(Trim::Headers).from_reader(data.as_bytes())
    }

    const SNAPSHOT_HEADER: &str = concat!(
        "Country name,Ladder score,upperwhisker,",
        "Explained by: Log GDP per capita,Explained by: Social support,",
        "Explained by: Healthy life expectancy,Explained by: Freedom to make life choices,",
        "Explained by: Generosity,Explained by: Perceptions of corruption,Dystopia + residual"
    );

    #[test]
    fn snapshot_rows_with_gaps_are_dropped() {
        let data = format!(
            "{SNAPSHOT_HEADER}\n\
             Finland,7.741,7.8,1.844,1.572,0.695,0.859,0.142,0.546,2.082\n\
             Bahrain,5.959,6.0,,,,,,,\n\
             Denmark,7.583,7.6,1.908,1.520,0.699,0.823,0.204,0.548,1.881\n"
        );
        let (rows, report) = read_snapshot(reader(&data)).unwrap();
        assert_eq!(report, LoadReport { total_rows: 3, kept_rows: 2, dropped_rows: 1 });
        assert_eq!(rows[0].country, "Finland");
        assert_eq!(rows[0].metrics[Metric::GovernmentTrust], 0.546);
        assert_eq!(rows[1].dystopia_residual, 1.881);
    }

    #[test]
    fn missing_snapshot_column_fails_fast() {
        let data = "Country name,Ladder score\nFinland,7.741\n";
        let err = read_snapshot(reader(data)).unwrap_err();
        match err {
            ReportError::MissingColumn { table, column } => {
                assert_eq!(table, SNAPSHOT_TABLE);
                assert_eq!(column, "Explained by: Log GDP per capita");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn history_rows_parse_and_drop() {
        let data = "Country,Year,Rank,Index\n\
                    Finland,2023,1,7.804\n\
                    Denmark,2023,2.0,7.586\n\
                    Nowhere,2023,,5.0\n";
        let (rows, report) = read_history(reader(data)).unwrap();
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[0].year, 2023);
    }

    #[test]
    fn missing_history_column_names_table() {
        let data = "Country,Year,Index\nFinland,2023,7.8\n";
        let err = read_history(reader(data)).unwrap_err();
        assert_eq!(err.to_string(), "multi-year table is missing required column 'Rank'");
    }
}
