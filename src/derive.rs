// Summary statistics derived from the normalized tables.
//
// Every function here is table-in, table-out: nothing is cached between
// calls, so feeding a different snapshot always recomputes from scratch.
use crate::error::{ReportError, ReportResult};
use crate::types::{
    Category, CountryMetricBreakdown, CountryYearRecord, Metric, MetricValues, Variable,
};
use crate::util::{cmp_f64, mean};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// --- contribution ratios ---------------------------------------------------

/// Share of a country's happiness score attributed to each metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionRow {
    pub country: String,
    pub ratios: MetricValues,
}

/// `value / score`, or `NaN` when the score is zero or not finite.
pub fn contribution_ratio(value: f64, score: f64) -> f64 {
    if score == 0.0 || !score.is_finite() {
        return f64::NAN;
    }
    value / score
}

pub fn contribution_ratios(rows: &[CountryMetricBreakdown]) -> Vec<ContributionRow> {
    rows.iter()
        .map(|r| ContributionRow {
            country: r.country.clone(),
            ratios: MetricValues::from_fn(|m| contribution_ratio(r.metrics[m], r.happiness_score)),
        })
        .collect()
}

// --- Spearman correlation --------------------------------------------------

/// 1-based ascending ranks with ties given the mean of the positions they
/// span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| cmp_f64(values[*a], values[*b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold equal values; 1-based mean rank
        let avg = (start + end + 1) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = avg;
        }
        start = end;
    }
    ranks
}

/// Pearson correlation; `NaN` when fewer than two observations or either
/// side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationCell {
    #[serde(rename = "Variable 1")]
    pub variable_1: String,
    #[serde(rename = "Variable 2")]
    pub variable_2: String,
    pub correlation: f64,
}

/// Symmetric Spearman matrix over the happiness score and the six metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub variables: Vec<Variable>,
    pub values: Vec<Vec<f64>>,
    /// Rows that had a finite value in every variable.
    pub observations: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Variable, b: Variable) -> Option<f64> {
        let i = self.variables.iter().position(|v| *v == a)?;
        let j = self.variables.iter().position(|v| *v == b)?;
        Some(self.values[i][j])
    }

    /// Long form, one cell per ordered pair, row-major.
    pub fn cells(&self) -> Vec<CorrelationCell> {
        let mut out = Vec::with_capacity(self.variables.len() * self.variables.len());
        for (i, a) in self.variables.iter().enumerate() {
            for (j, b) in self.variables.iter().enumerate() {
                out.push(CorrelationCell {
                    variable_1: a.label().to_string(),
                    variable_2: b.label().to_string(),
                    correlation: self.values[i][j],
                });
            }
        }
        out
    }

    /// Metrics ordered by their correlation with the happiness score,
    /// strongest first.
    pub fn with_happiness(&self) -> Vec<(Metric, f64)> {
        let mut out: Vec<(Metric, f64)> = Metric::ALL
            .iter()
            .filter_map(|m| Some((*m, self.get(Variable::HappinessScore, Variable::Metric(*m))?)))
            .collect();
        out.sort_by(|a, b| cmp_f64(b.1, a.1));
        out
    }
}

/// Complete-case Spearman matrix: a row is used only when all seven
/// variables are finite, so every pair is computed over the same rows.
pub fn spearman_matrix(rows: &[CountryMetricBreakdown]) -> CorrelationMatrix {
    let variables = Variable::ALL.to_vec();
    let complete: Vec<&CountryMetricBreakdown> = rows
        .iter()
        .filter(|r| variables.iter().all(|v| v.value_of(r).is_finite()))
        .collect();
    if complete.len() < rows.len() {
        warn!(
            "correlation: {} row(s) excluded for missing values",
            rows.len() - complete.len()
        );
    }

    let columns: Vec<Vec<f64>> = variables
        .iter()
        .map(|v| average_ranks(&complete.iter().map(|r| v.value_of(r)).collect::<Vec<_>>()))
        .collect();

    let k = variables.len();
    let mut values = vec![vec![0.0; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix { variables, values, observations: complete.len() }
}

// --- tertiles ---------------------------------------------------------------

/// Equal-frequency cut points of a distribution into Low / Average / High.
///
/// Bins are right-closed with the lowest edge included, so a value sitting
/// exactly on a cut point lands in the lower bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tertiles {
    pub edges: [f64; 4],
}

impl Tertiles {
    /// Cuts sit on observed values. Low ends at sorted position `(n - 1) / 3`
    /// and Average at `2 * (n - 1) / 3`; a run of equal values is never split
    /// and goes whole into the lower bin. Each cut is clamped so all three
    /// bins keep at least one distinct value.
    pub fn fit(name: &str, values: &[f64]) -> ReportResult<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(|a, b| cmp_f64(*a, *b));

        // (value, last sorted position) per distinct value
        let mut runs: Vec<(f64, usize)> = Vec::new();
        for (i, v) in sorted.iter().enumerate() {
            if let Some(run) = runs.last_mut().filter(|r| r.0 == *v) {
                run.1 = i;
            } else {
                runs.push((*v, i));
            }
        }
        if runs.len() < 3 {
            return Err(ReportError::DegenerateDistribution {
                metric: name.to_string(),
                distinct: runs.len(),
            });
        }

        let last = sorted.len() - 1;
        let top = runs.len() - 1;
        let run_at = |pos: usize| runs.iter().position(|r| r.1 >= pos).unwrap_or(top);
        let low = run_at(last / 3).min(top - 2);
        let average = run_at(2 * last / 3).clamp(low + 1, top - 1);
        Ok(Self { edges: [runs[0].0, runs[low].0, runs[average].0, runs[top].0] })
    }

    pub fn categorize(&self, value: f64) -> Option<Category> {
        let [lo, low_cut, high_cut, hi] = self.edges;
        if !(lo..=hi).contains(&value) {
            return None;
        }
        Some(if value <= low_cut {
            Category::Low
        } else if value <= high_cut {
            Category::Average
        } else {
            Category::High
        })
    }
}

/// A snapshot country with its tertile bucket for every splittable variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedCountry {
    pub country: String,
    pub happiness_score: f64,
    pub categories: BTreeMap<Variable, Category>,
}

impl CategorizedCountry {
    pub fn category(&self, variable: Variable) -> Option<Category> {
        self.categories.get(&variable).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    pub rows: Vec<CategorizedCountry>,
    pub tertiles: BTreeMap<Variable, Tertiles>,
    /// Variables that could not be split; their category is absent on every
    /// row while the other variables are unaffected.
    pub degenerate: Vec<Variable>,
}

pub fn categorize(rows: &[CountryMetricBreakdown]) -> CategoryTable {
    let mut tertiles = BTreeMap::new();
    let mut degenerate = Vec::new();
    for v in Variable::ALL {
        let values: Vec<f64> = rows.iter().map(|r| v.value_of(r)).collect();
        match Tertiles::fit(v.label(), &values) {
            Ok(t) => {
                debug!("{v}: tertile edges {:?}", t.edges);
                tertiles.insert(v, t);
            }
            Err(e) => {
                warn!("{e}; its category is left blank");
                degenerate.push(v);
            }
        }
    }

    let rows = rows
        .iter()
        .map(|r| CategorizedCountry {
            country: r.country.clone(),
            happiness_score: r.happiness_score,
            categories: tertiles
                .iter()
                .filter_map(|(v, t)| Some((*v, t.categorize(v.value_of(r))?)))
                .collect(),
        })
        .collect();
    CategoryTable { rows, tertiles, degenerate }
}

// --- relative happiness ------------------------------------------------------

/// A country-year score against the country's own mean and the year's
/// cross-country mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelativeHappiness {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Happiness Score")]
    pub happiness_score: f64,
    #[serde(rename = "Rank")]
    pub rank: u32,
    #[serde(rename = "Mean_Country")]
    pub mean_country: f64,
    #[serde(rename = "Difference_Country")]
    pub difference_country: f64,
    #[serde(rename = "Mean_Year")]
    pub mean_year: f64,
    #[serde(rename = "Difference_Year")]
    pub difference_year: f64,
}

/// Means are taken over the years a country actually has; absent years do
/// not count as zero.
pub fn relative_happiness(records: &[CountryYearRecord]) -> Vec<RelativeHappiness> {
    let mut by_country: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut by_year: HashMap<i32, Vec<f64>> = HashMap::new();
    for r in records {
        by_country.entry(r.country.as_str()).or_default().push(r.happiness_score);
        by_year.entry(r.year).or_default().push(r.happiness_score);
    }
    let country_mean: HashMap<&str, f64> =
        by_country.into_iter().map(|(k, v)| (k, mean(&v))).collect();
    let year_mean: HashMap<i32, f64> = by_year.into_iter().map(|(k, v)| (k, mean(&v))).collect();

    records
        .iter()
        .map(|r| {
            let mean_country = country_mean.get(r.country.as_str()).copied().unwrap_or(f64::NAN);
            let mean_year = year_mean.get(&r.year).copied().unwrap_or(f64::NAN);
            RelativeHappiness {
                country: r.country.clone(),
                year: r.year,
                happiness_score: r.happiness_score,
                rank: r.rank,
                mean_country,
                difference_country: r.happiness_score - mean_country,
                mean_year,
                difference_year: r.happiness_score - mean_year,
            }
        })
        .collect()
}

// --- score breakup -------------------------------------------------------------

pub const RESIDUAL_LABEL: &str = "Dystopia + residual";

/// Melted decomposition of one country's score: one cell per metric plus
/// the residual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakupCell {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Metric")]
    pub component: String,
    #[serde(rename = "Happiness Score Breakup")]
    pub value: f64,
}

/// Breakup of every snapshot country ranked at or above `top_n`.
pub fn score_breakup(rows: &[CountryMetricBreakdown], top_n: u32) -> Vec<BreakupCell> {
    let mut out = Vec::new();
    for r in rows.iter().filter(|r| r.rank <= top_n) {
        for (m, value) in r.metrics.iter() {
            out.push(BreakupCell {
                country: r.country.clone(),
                component: m.label().to_string(),
                value,
            });
        }
        out.push(BreakupCell {
            country: r.country.clone(),
            component: RESIDUAL_LABEL.to_string(),
            value: r.dystopia_residual,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, score: f64, metrics: [f64; 6]) -> CountryMetricBreakdown {
        CountryMetricBreakdown {
            country: country.to_string(),
            happiness_score: score,
            rank: 1,
            metrics: MetricValues::new(metrics),
            dystopia_residual: score - metrics.iter().sum::<f64>(),
        }
    }

    fn sample() -> Vec<CountryMetricBreakdown> {
        vec![
            row("A", 7.5, [1.9, 1.5, 0.7, 0.8, 0.2, 0.5]),
            row("B", 6.1, [1.5, 1.4, 0.6, 0.7, 0.1, 0.2]),
            row("C", 5.0, [1.2, 1.0, 0.5, 0.7, 0.3, 0.1]),
            row("D", 4.2, [0.9, 0.8, 0.4, 0.5, 0.2, 0.1]),
            row("E", 3.1, [0.5, 0.4, 0.2, 0.3, 0.1, 0.05]),
        ]
    }

    #[test]
    fn contribution_is_value_over_score() {
        let ratios = contribution_ratios(&sample());
        assert!((ratios[0].ratios[Metric::Gdp] - 1.9 / 7.5).abs() < 1e-12);
    }

    #[test]
    fn zero_score_gives_nan_ratio() {
        let rows = vec![row("Z", 0.0, [0.1; 6])];
        let ratios = contribution_ratios(&rows);
        assert!(ratios[0].ratios.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn ties_take_average_rank() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn spearman_detects_monotone_relation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
        let rev: Vec<f64> = y.iter().rev().copied().collect();
        assert!((spearman(&x, &rev) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_with_ties_matches_reference() {
        // reference value computed by hand from average ranks
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        let r = spearman(&x, &y);
        assert!((r - 0.9486832980505138).abs() < 1e-12);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let m = spearman_matrix(&sample());
        assert_eq!(m.observations, 5);
        for i in 0..7 {
            assert!((m.values[i][i] - 1.0).abs() < 1e-12);
            for j in 0..7 {
                assert_eq!(m.values[i][j].to_bits(), m.values[j][i].to_bits());
                let v = m.values[i][j];
                assert!(v.is_nan() || (-1.0..=1.0).contains(&v));
            }
        }
        assert_eq!(m.cells().len(), 49);
    }

    #[test]
    fn complete_case_drops_rows_with_gaps() {
        let mut rows = sample();
        rows[2].metrics[Metric::Freedom] = f64::NAN;
        let m = spearman_matrix(&rows);
        assert_eq!(m.observations, 4);
    }

    #[test]
    fn happiness_ranking_is_descending() {
        let ranked = spearman_matrix(&sample()).with_happiness();
        assert_eq!(ranked.len(), 6);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(ranked[0].0, Metric::Gdp);
    }

    fn bin_sizes(values: &[f64]) -> [usize; 3] {
        let t = Tertiles::fit("x", values).unwrap();
        let mut counts = [0usize; 3];
        for v in values {
            counts[t.categorize(*v).unwrap() as usize] += 1;
        }
        counts
    }

    #[test]
    fn tertiles_are_balanced() {
        for n in 3..=20 {
            let values: Vec<f64> = (0..n).map(|i| i as f64 * 1.5).collect();
            let counts = bin_sizes(&values);
            assert!(counts.iter().all(|c| *c > 0), "n={n} counts={counts:?}");
            let max = counts.iter().max().unwrap();
            let min = counts.iter().min().unwrap();
            assert!(max - min <= 1, "n={n} counts={counts:?}");
        }
    }

    #[test]
    fn ties_and_skew_still_fill_three_bins() {
        assert_eq!(bin_sizes(&[1.0, 2.0, 2.0, 3.0, 4.0]), [3, 1, 1]);
        assert_eq!(bin_sizes(&[1.0, 1.0, 1.0, 2.0, 3.0, 4.0]), [3, 1, 2]);
        assert_eq!(bin_sizes(&[1.0, 2.0, 3.0, 3.0, 3.0, 3.0]), [1, 1, 4]);
        assert_eq!(bin_sizes(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 5.0, 9.0]), [6, 1, 2]);
        // skewed but distinct: same sizes as evenly spaced values
        assert_eq!(bin_sizes(&[0.01, 0.02, 0.03, 0.04, 100.0, 1000.0]), [2, 2, 2]);
    }

    #[test]
    fn tied_values_share_a_bin() {
        let values = [5.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0, 2.0];
        let t = Tertiles::fit("x", &values).unwrap();
        let bins: Vec<Option<Category>> =
            [1.0, 2.0, 3.0, 4.0, 5.0].iter().map(|v| t.categorize(*v)).collect();
        assert_eq!(
            bins,
            vec![
                Some(Category::Low),
                Some(Category::Low),
                Some(Category::Average),
                Some(Category::High),
                Some(Category::High),
            ]
        );
    }

    #[test]
    fn skewed_metric_is_still_categorized() {
        let mut rows = sample();
        for (r, g) in rows.iter_mut().zip([0.3, 0.1, 0.1, 0.1, 0.2]) {
            r.metrics[Metric::Generosity] = g;
        }
        let table = categorize(&rows);
        assert!(table.degenerate.is_empty());
        let generosity = Variable::Metric(Metric::Generosity);
        assert_eq!(table.rows[0].category(generosity), Some(Category::High));
        assert_eq!(table.rows[1].category(generosity), Some(Category::Low));
        assert_eq!(table.rows[3].category(generosity), Some(Category::Low));
        assert_eq!(table.rows[4].category(generosity), Some(Category::Average));
    }

    #[test]
    fn boundary_value_falls_into_lower_bin() {
        let t = Tertiles::fit("x", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.edges[1], 2.0);
        assert_eq!(t.categorize(2.0), Some(Category::Low));
        assert_eq!(t.categorize(3.0), Some(Category::Average));
        assert_eq!(t.categorize(1.0), Some(Category::Low));
        assert_eq!(t.categorize(4.0), Some(Category::High));
        assert_eq!(t.categorize(9.0), None);
    }

    #[test]
    fn degenerate_distribution_is_an_error() {
        let err = Tertiles::fit("Generosity", &[0.1, 0.1, 0.2, 0.2]).unwrap_err();
        match err {
            ReportError::DegenerateDistribution { metric, distinct } => {
                assert_eq!(metric, "Generosity");
                assert_eq!(distinct, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn degenerate_metric_does_not_block_others() {
        let mut rows = sample();
        for r in &mut rows {
            r.metrics[Metric::Generosity] = 0.2;
        }
        let table = categorize(&rows);
        assert_eq!(table.degenerate, vec![Variable::Metric(Metric::Generosity)]);
        let generosity = Variable::Metric(Metric::Generosity);
        assert!(table.rows.iter().all(|r| r.category(generosity).is_none()));
        assert_eq!(table.rows[0].category(Variable::Metric(Metric::Gdp)), Some(Category::High));
        assert_eq!(table.rows[4].category(Variable::HappinessScore), Some(Category::Low));
    }

    #[test]
    fn country_mean_uses_only_observed_years() {
        let mut records: Vec<CountryYearRecord> = (2015..=2023)
            .map(|y| CountryYearRecord {
                country: "A".into(),
                year: y,
                happiness_score: (y - 2010) as f64,
                rank: 1,
            })
            .collect();
        for y in 2015..=2024 {
            records.push(CountryYearRecord {
                country: "B".into(),
                year: y,
                happiness_score: 5.0,
                rank: 2,
            });
        }
        let rel = relative_happiness(&records);
        let a = rel.iter().find(|r| r.country == "A" && r.year == 2015).unwrap();
        // mean of 5..=13 over nine years
        assert!((a.mean_country - 9.0).abs() < 1e-12);
        assert!((a.difference_country + 4.0).abs() < 1e-12);
        let b2024 = rel.iter().find(|r| r.country == "B" && r.year == 2024).unwrap();
        assert!((b2024.mean_year - 5.0).abs() < 1e-12);
        assert_eq!(b2024.difference_year, 0.0);
        let b2015 = rel.iter().find(|r| r.country == "B" && r.year == 2015).unwrap();
        assert!((b2015.mean_year - 5.0).abs() < 1e-12);
        assert!((b2015.difference_year - 0.0).abs() < 1e-12);
    }

    #[test]
    fn breakup_melts_metrics_and_residual() {
        let mut rows = sample();
        rows[1].rank = 11;
        let cells = score_breakup(&rows, 10);
        assert_eq!(cells.len(), 4 * 7);
        assert!(cells.iter().all(|c| c.country != "B"));
        let a_total: f64 = cells.iter().filter(|c| c.country == "A").map(|c| c.value).sum();
        assert!((a_total - 7.5).abs() < 1e-9);
    }
}
