use crate::charts::{self, Chart};
use crate::derive::CategorizedCountry;
use crate::interaction::InteractionState;
use crate::pipeline::Dataset;
use crate::types::{
    Category, CategoryPreviewRow, FactorCorrelationRow, LeaderboardRow, Metric, TrendPreviewRow,
    Variable,
};
use crate::util::{format_int, format_number};
use serde::Serialize;
use std::collections::BTreeMap;

pub const REPORT_TITLE: &str = "What makes a population happy? Decoding the World Happiness Report";

/// One block of the narrative: prose followed by an optional figure.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub heading: String,
    pub prose: Vec<String>,
    pub chart: Option<Chart>,
    pub caption: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: String,
    pub byline: String,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn charts(&self) -> impl Iterator<Item = &Chart> {
        self.sections.iter().filter_map(|s| s.chart.as_ref())
    }
}

fn source_line(first: Option<i32>, last: i32) -> String {
    match first {
        Some(first) if first != last => format!("Source: World Happiness Report {first}-{last}"),
        _ => format!("Source: World Happiness Report {last}"),
    }
}

/// The fixed narrative order. Figures quoted in the prose come from the
/// dataset.
pub fn build_report(dataset: &Dataset, state: &InteractionState) -> Report {
    let first_year = dataset.controls.years.first().copied();
    let snap = dataset.snapshot_year;
    let mut sections = Vec::new();

    let leader = dataset.snapshot.first();
    let mut intro = vec![
        "Every year Gallup asks people in each surveyed country to place their life on a \
         ladder from 0 to 10. The national average is the country's happiness score, and six \
         metrics are used to explain it: GDP per capita, social support, healthy life \
         expectancy, freedom, generosity and trust in government."
            .to_string(),
    ];
    if let Some(top) = leader {
        intro.push(format!(
            "In {snap}, {} leads {} ranked countries with a score of {}. \
             Slide the year to watch the leaderboard change.",
            top.country,
            format_int(dataset.snapshot.len()),
            format_number(top.happiness_score, 3)
        ));
    }
    sections.push(Section {
        heading: "The happiest countries".to_string(),
        prose: intro,
        chart: Some(charts::leaderboard_chart(
            &dataset.history,
            &dataset.breakup,
            &dataset.controls,
            state,
        )),
        caption: Some(
            "Figure 1: The top 10 happiest countries and the breakup of their scores. \
             Slide the slider to see the leaderboard change."
                .to_string(),
        ),
        source: Some(source_line(first_year, snap)),
    });

    let ranked = dataset.correlation.with_happiness();
    let mut corr_prose = vec![format!(
        "Spearman rank correlations are computed over {} countries with complete data.",
        format_int(dataset.correlation.observations)
    )];
    if let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) {
        corr_prose.push(format!(
            "{} moves most closely with happiness ({}), while {} trails ({}). \
             Correlation is not causation.",
            best.0,
            format_number(best.1, 2),
            worst.0,
            format_number(worst.1, 2)
        ));
    }
    sections.push(Section {
        heading: "Understanding the role of different variables in happiness".to_string(),
        prose: corr_prose,
        chart: Some(charts::correlation_chart(&dataset.correlation)),
        caption: Some(
            "Figure 2: Metrics ranked by their correlation with the happiness score, \
             and the correlation heatmap."
                .to_string(),
        ),
        source: Some(source_line(None, snap)),
    });

    let gdp: BTreeMap<String, f64> = dataset
        .snapshot
        .iter()
        .map(|r| (r.country.clone(), r.metrics[Metric::Gdp]))
        .collect();
    sections.push(Section {
        heading: "Does money buy happiness?".to_string(),
        prose: vec![
            "Countries are coloured by the tertile of their happiness score. The black line is \
             a least-squares fit; points far from it are where money tells only part of the story."
                .to_string(),
        ],
        chart: Some(charts::gdp_scatter_chart(&dataset.categories, &gdp)),
        caption: Some("Figure 3: Hover over a point to see the country.".to_string()),
        source: Some(source_line(None, snap)),
    });

    let unmatched = dataset.unmatched_countries();
    let mut map_prose = vec![
        "Each metric is split into Low, Average and High tertiles. Pick a category in any \
         dropdown to keep only the countries in it; the dropdowns combine."
            .to_string(),
    ];
    if !dataset.categories.degenerate.is_empty() {
        let names: Vec<&str> = dataset.categories.degenerate.iter().map(|v| v.label()).collect();
        map_prose.push(format!("No tertiles could be formed for: {}.", names.join(", ")));
    }
    if !unmatched.is_empty() {
        map_prose.push(format!("Not drawn on the maps (no ISO code): {}.", unmatched.join(", ")));
    }
    sections.push(Section {
        heading: "A global view on happiness".to_string(),
        prose: map_prose,
        chart: Some(charts::dashboard_map(&dataset.categories, &dataset.geo, state)),
        caption: Some("Figure 4: Happiness score dashboard.".to_string()),
        source: Some(source_line(None, snap)),
    });

    sections.push(Section {
        heading: "Historic trends of happiness".to_string(),
        prose: vec![format!(
            "Select a country to follow its score over the years and see which metrics carry \
             the most weight in it. The chart opens on {}.",
            state.country
        )],
        chart: Some(charts::country_history_chart(
            &dataset.history,
            &dataset.contributions,
            &dataset.controls,
            state,
        )),
        caption: Some(
            "Figure 5: Happiness score by year and the metrics most important to the \
             selected country."
                .to_string(),
        ),
        source: Some(source_line(first_year, snap)),
    });

    sections.push(Section {
        heading: "How has the world progressed over the last decade?".to_string(),
        prose: vec![
            "Countries are coloured by how far each year's score sits from their own average \
             across all surveyed years. Drag the slider to see the world change."
                .to_string(),
        ],
        chart: Some(charts::relative_globe(
            &dataset.relative,
            &dataset.geo,
            &dataset.controls,
            state,
        )),
        caption: Some("Figure 6: Happiness relative to each country's own average.".to_string()),
        source: Some(source_line(first_year, snap)),
    });

    Report {
        title: REPORT_TITLE.to_string(),
        byline: "A data-driven exploration of the World Happiness Report".to_string(),
        sections,
    }
}

// --- tabular views ---------------------------------------------------------------

pub fn leaderboard_preview(dataset: &Dataset, state: &InteractionState) -> Vec<LeaderboardRow> {
    charts::visible_leaderboard(&dataset.history, state)
        .into_iter()
        .map(|r| LeaderboardRow {
            rank: r.rank,
            country: r.country,
            year: r.year,
            happiness_score: format_number(r.happiness_score, 3),
        })
        .collect()
}

pub fn factor_preview(dataset: &Dataset) -> Vec<FactorCorrelationRow> {
    dataset
        .correlation
        .with_happiness()
        .into_iter()
        .map(|(m, r)| FactorCorrelationRow {
            factor: m.label().to_string(),
            correlation: format_number(r, 3),
        })
        .collect()
}

/// Categorized countries passing the state's filters. Countries without an
/// ISO code are kept here and marked as such.
pub fn category_preview(dataset: &Dataset, state: &InteractionState) -> Vec<CategoryPreviewRow> {
    let label = |r: &CategorizedCountry, v: Variable| {
        r.category(v).map(Category::label).unwrap_or("-").to_string()
    };
    dataset
        .categories
        .rows
        .iter()
        .filter(|r| state.filters.matches(r))
        .map(|r| CategoryPreviewRow {
            country: r.country.clone(),
            happiness: label(r, Variable::HappinessScore),
            gdp: label(r, Variable::Metric(Metric::Gdp)),
            social_support: label(r, Variable::Metric(Metric::SocialSupport)),
            health: label(r, Variable::Metric(Metric::HealthyLifeExpectancy)),
            freedom: label(r, Variable::Metric(Metric::Freedom)),
            generosity: label(r, Variable::Metric(Metric::Generosity)),
            trust: label(r, Variable::Metric(Metric::GovernmentTrust)),
            iso: dataset
                .geo
                .get(&r.country)
                .and_then(|m| m.code())
                .map(|c| c.alpha3.clone())
                .unwrap_or_else(|| "unmatched".to_string()),
        })
        .collect()
}

pub fn trend_preview(dataset: &Dataset, state: &InteractionState) -> Vec<TrendPreviewRow> {
    let mut rows: Vec<TrendPreviewRow> = dataset
        .relative
        .iter()
        .filter(|r| r.country == state.country)
        .map(|r| TrendPreviewRow {
            country: r.country.clone(),
            year: r.year,
            happiness_score: format_number(r.happiness_score, 3),
            difference_country: format_number(r.difference_country, 3),
            difference_year: format_number(r.difference_year, 3),
        })
        .collect();
    rows.sort_by_key(|r| r.year);
    rows
}
