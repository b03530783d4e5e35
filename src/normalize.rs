use crate::loader::HistoryEntry;
use crate::types::{CountryMetricBreakdown, CountryYearRecord, SnapshotEntry};
use crate::util::cmp_f64;
use log::{info, warn};

/// Tolerance for the additive decomposition check on published data.
pub const DECOMPOSITION_TOLERANCE: f64 = 1e-2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizePolicy {
    /// Year stamped on the single-year snapshot when it joins the history.
    pub snapshot_year: i32,
    /// Years dropped from the combined history regardless of row validity.
    pub excluded_years: Vec<i32>,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self { snapshot_year: 2024, excluded_years: vec![2013, 2014] }
    }
}

/// Standard competition ranks ("1224") for scores, highest score first.
///
/// The result is index-aligned with `scores`.
pub fn competition_ranks(scores: &[f64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| cmp_f64(scores[*b], scores[*a]));

    let mut ranks = vec![0u32; scores.len()];
    let mut prev: Option<(f64, u32)> = None;
    for (pos, idx) in order.into_iter().enumerate() {
        let score = scores[idx];
        let rank = match prev {
            Some((prev_score, prev_rank)) if prev_score == score => prev_rank,
            _ => pos as u32 + 1,
        };
        ranks[idx] = rank;
        prev = Some((score, rank));
    }
    ranks
}

/// Rank the snapshot by happiness score and return it ordered by rank, ties
/// by country name.
pub fn rank_snapshot(entries: Vec<SnapshotEntry>) -> Vec<CountryMetricBreakdown> {
    let scores: Vec<f64> = entries.iter().map(|e| e.happiness_score).collect();
    let ranks = competition_ranks(&scores);
    let mut rows: Vec<CountryMetricBreakdown> = entries
        .into_iter()
        .zip(ranks)
        .map(|(e, rank)| CountryMetricBreakdown {
            country: e.country,
            happiness_score: e.happiness_score,
            rank,
            metrics: e.metrics,
            dystopia_residual: e.dystopia_residual,
        })
        .collect();
    rows.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.country.cmp(&b.country)));
    rows
}

/// Append the ranked snapshot, stamped with `policy.snapshot_year`, to the
/// published history and drop excluded years.
///
/// Published rows for the snapshot year itself are superseded by the snapshot.
/// The result is ordered by year, rank, country.
pub fn build_history(
    snapshot: &[CountryMetricBreakdown],
    history: Vec<HistoryEntry>,
    policy: &NormalizePolicy,
) -> Vec<CountryYearRecord> {
    let before = history.len();
    let mut records: Vec<CountryYearRecord> = history
        .into_iter()
        .filter(|h| h.year != policy.snapshot_year)
        .map(|h| CountryYearRecord {
            country: h.country,
            year: h.year,
            happiness_score: h.happiness_score,
            rank: h.rank,
        })
        .collect();
    let superseded = before - records.len();
    if superseded > 0 {
        warn!(
            "history already holds {superseded} row(s) for {}; using the snapshot instead",
            policy.snapshot_year
        );
    }

    records.extend(snapshot.iter().map(|r| CountryYearRecord {
        country: r.country.clone(),
        year: policy.snapshot_year,
        happiness_score: r.happiness_score,
        rank: r.rank,
    }));

    let combined = records.len();
    records.retain(|r| !policy.excluded_years.contains(&r.year));
    info!(
        "history: {} country-year record(s), {} removed by year exclusion {:?}",
        records.len(),
        combined - records.len(),
        policy.excluded_years
    );

    records.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.country.cmp(&b.country))
    });
    records
}

/// Signed difference between the sum of the parts and the published score.
pub fn decomposition_gap(row: &CountryMetricBreakdown) -> f64 {
    row.metrics.sum() + row.dystopia_residual - row.happiness_score
}

/// Countries whose metrics plus residual miss the score by more than
/// `tolerance`, worst first.
pub fn decomposition_outliers(
    rows: &[CountryMetricBreakdown],
    tolerance: f64,
) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = rows
        .iter()
        .map(|r| (r.country.clone(), decomposition_gap(r)))
        .filter(|(_, gap)| gap.abs() > tolerance)
        .collect();
    out.sort_by(|a, b| cmp_f64(b.1.abs(), a.1.abs()).then_with(|| a.0.cmp(&b.0)));
    for (country, gap) in &out {
        warn!("{country}: metrics plus residual differ from the score by {gap:.4}");
    }
    out
}

/// Distinct years in the history, ascending.
pub fn years_present(records: &[CountryYearRecord]) -> Vec<i32> {
    let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    years
}

/// Distinct country names in the history, sorted.
pub fn countries_present(records: &[CountryYearRecord]) -> Vec<String> {
    let mut names: Vec<String> = records.iter().map(|r| r.country.clone()).collect();
    names.sort_by(|a, b| a.cmp(b));
    names.dedup();
    names
}

/// Leaderboard rows: rank at or below `top_n` in every year, ordered by
/// year, rank and country.
pub fn top_ranked(records: &[CountryYearRecord], top_n: u32) -> Vec<&CountryYearRecord> {
    let mut out: Vec<&CountryYearRecord> = records.iter().filter(|r| r.rank <= top_n).collect();
    out.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.country.cmp(&b.country))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricValues;

    fn entry(country: &str, score: f64) -> SnapshotEntry {
        SnapshotEntry {
            country: country.to_string(),
            happiness_score: score,
            metrics: MetricValues::new([score / 7.0; 6]),
            dystopia_residual: score / 7.0,
        }
    }

    fn hist(country: &str, year: i32, rank: u32, score: f64) -> HistoryEntry {
        HistoryEntry { country: country.to_string(), year, rank, happiness_score: score }
    }

    #[test]
    fn ties_share_competition_rank() {
        assert_eq!(competition_ranks(&[5.0, 7.5, 5.0, 3.0]), vec![2, 1, 2, 4]);
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn higher_score_ranks_first() {
        let ranked = rank_snapshot(vec![entry("B", 5.0), entry("A", 7.5)]);
        assert_eq!(ranked[0].country, "A");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].country, "B");
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn excluded_years_never_survive() {
        let snapshot = rank_snapshot(vec![entry("A", 7.5)]);
        let history = vec![
            hist("A", 2013, 1, 7.0),
            hist("A", 2014, 1, 7.1),
            hist("A", 2015, 1, 7.2),
        ];
        let records = build_history(&snapshot, history, &NormalizePolicy::default());
        assert_eq!(years_present(&records), vec![2015, 2024]);
    }

    #[test]
    fn snapshot_supersedes_published_year() {
        let snapshot = rank_snapshot(vec![entry("A", 7.5)]);
        let history = vec![hist("A", 2024, 3, 6.0), hist("B", 2024, 1, 8.0)];
        let records = build_history(&snapshot, history, &NormalizePolicy::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].happiness_score, 7.5);
        assert_eq!(records[0].rank, 1);
    }

    #[test]
    fn decomposition_flags_drift() {
        let mut rows = rank_snapshot(vec![entry("A", 7.0), entry("B", 6.3)]);
        assert!(decomposition_outliers(&rows, DECOMPOSITION_TOLERANCE).is_empty());
        rows[1].dystopia_residual += 0.5;
        let out = decomposition_outliers(&rows, DECOMPOSITION_TOLERANCE);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "B");
        assert!((out[0].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn leaderboard_keeps_top_ranks_per_year() {
        let records = vec![
            CountryYearRecord { country: "A".into(), year: 2016, rank: 11, happiness_score: 6.0 },
            CountryYearRecord { country: "B".into(), year: 2015, rank: 2, happiness_score: 7.0 },
            CountryYearRecord { country: "C".into(), year: 2015, rank: 1, happiness_score: 7.5 },
        ];
        let top = top_ranked(&records, 10);
        let names: Vec<&str> = top.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);
    }
}
