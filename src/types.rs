use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use tabled::Tabled;

/// The six explanatory metrics published alongside each happiness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Gdp,
    SocialSupport,
    HealthyLifeExpectancy,
    Freedom,
    Generosity,
    GovernmentTrust,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Gdp,
        Metric::SocialSupport,
        Metric::HealthyLifeExpectancy,
        Metric::Freedom,
        Metric::Generosity,
        Metric::GovernmentTrust,
    ];

    /// Canonical display name, also used as the field name in chart data.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Gdp => "GDP per capita",
            Metric::SocialSupport => "Social Support",
            Metric::HealthyLifeExpectancy => "Healthy Life Expectancy",
            Metric::Freedom => "Freedom",
            Metric::Generosity => "Generosity",
            Metric::GovernmentTrust => "Government Trust",
        }
    }

    /// Column header in the survey's single-year export.
    pub fn source_column(self) -> &'static str {
        match self {
            Metric::Gdp => "Explained by: Log GDP per capita",
            Metric::SocialSupport => "Explained by: Social support",
            Metric::HealthyLifeExpectancy => "Explained by: Healthy life expectancy",
            Metric::Freedom => "Explained by: Freedom to make life choices",
            Metric::Generosity => "Explained by: Generosity",
            Metric::GovernmentTrust => "Explained by: Perceptions of corruption",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per metric, addressable by `Metric`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricValues([f64; 6]);

impl MetricValues {
    pub fn new(values: [f64; 6]) -> Self {
        Self(values)
    }

    pub fn from_fn(mut f: impl FnMut(Metric) -> f64) -> Self {
        let mut out = [0.0; 6];
        for m in Metric::ALL {
            out[m.index()] = f(m);
        }
        Self(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.0[m.index()]))
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl Index<Metric> for MetricValues {
    type Output = f64;

    fn index(&self, m: Metric) -> &f64 {
        &self.0[m.index()]
    }
}

impl IndexMut<Metric> for MetricValues {
    fn index_mut(&mut self, m: Metric) -> &mut f64 {
        &mut self.0[m.index()]
    }
}

/// A numeric column of the single-year table that takes part in correlation
/// and tertile derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    HappinessScore,
    Metric(Metric),
}

impl Variable {
    pub const ALL: [Variable; 7] = [
        Variable::HappinessScore,
        Variable::Metric(Metric::Gdp),
        Variable::Metric(Metric::SocialSupport),
        Variable::Metric(Metric::HealthyLifeExpectancy),
        Variable::Metric(Metric::Freedom),
        Variable::Metric(Metric::Generosity),
        Variable::Metric(Metric::GovernmentTrust),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Variable::HappinessScore => "Happiness Score",
            Variable::Metric(m) => m.label(),
        }
    }

    pub fn value_of(self, row: &CountryMetricBreakdown) -> f64 {
        match self {
            Variable::HappinessScore => row.happiness_score,
            Variable::Metric(m) => row.metrics[m],
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tertile bucket of a variable's distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Low,
    Average,
    High,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Low, Category::Average, Category::High];

    pub fn label(self) -> &'static str {
        match self {
            Category::Low => "Low",
            Category::Average => "Average",
            Category::High => "High",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Row of the single-year survey export, as read from CSV.
#[derive(Debug, Deserialize)]
pub struct RawSnapshotRow {
    #[serde(rename = "Country name")]
    pub country: Option<String>,
    #[serde(rename = "Ladder score")]
    pub ladder_score: Option<String>,
    #[serde(rename = "Explained by: Log GDP per capita")]
    pub gdp: Option<String>,
    #[serde(rename = "Explained by: Social support")]
    pub social_support: Option<String>,
    #[serde(rename = "Explained by: Healthy life expectancy")]
    pub healthy_life_expectancy: Option<String>,
    #[serde(rename = "Explained by: Freedom to make life choices")]
    pub freedom: Option<String>,
    #[serde(rename = "Explained by: Generosity")]
    pub generosity: Option<String>,
    #[serde(rename = "Explained by: Perceptions of corruption")]
    pub perceptions_of_corruption: Option<String>,
    #[serde(rename = "Dystopia + residual")]
    pub dystopia_residual: Option<String>,
}

/// Row of the multi-year history export.
#[derive(Debug, Deserialize)]
pub struct RawHistoryRow {
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Rank")]
    pub rank: Option<String>,
    #[serde(rename = "Index")]
    pub index: Option<String>,
}

/// Single-year breakdown of a country's happiness score into metric
/// contributions plus the unexplained residual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryMetricBreakdown {
    pub country: String,
    pub happiness_score: f64,
    pub rank: u32,
    pub metrics: MetricValues,
    pub dystopia_residual: f64,
}

/// Snapshot row before ranking; the loader's output for the single-year table.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub country: String,
    pub happiness_score: f64,
    pub metrics: MetricValues,
    pub dystopia_residual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryYearRecord {
    pub country: String,
    pub year: i32,
    pub happiness_score: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct LeaderboardRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: u32,
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Happiness Score")]
    #[tabled(rename = "Happiness Score")]
    pub happiness_score: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FactorCorrelationRow {
    #[serde(rename = "Factor")]
    #[tabled(rename = "Factor")]
    pub factor: String,
    #[serde(rename = "Correlation with Happiness Score")]
    #[tabled(rename = "Correlation with Happiness Score")]
    pub correlation: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct CategoryPreviewRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Happiness")]
    #[tabled(rename = "Happiness")]
    pub happiness: String,
    #[serde(rename = "GDP")]
    #[tabled(rename = "GDP")]
    pub gdp: String,
    #[serde(rename = "Social")]
    #[tabled(rename = "Social")]
    pub social_support: String,
    #[serde(rename = "Health")]
    #[tabled(rename = "Health")]
    pub health: String,
    #[serde(rename = "Freedom")]
    #[tabled(rename = "Freedom")]
    pub freedom: String,
    #[serde(rename = "Generosity")]
    #[tabled(rename = "Generosity")]
    pub generosity: String,
    #[serde(rename = "Trust")]
    #[tabled(rename = "Trust")]
    pub trust: String,
    #[serde(rename = "ISO")]
    #[tabled(rename = "ISO")]
    pub iso: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct TrendPreviewRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Happiness Score")]
    #[tabled(rename = "Happiness Score")]
    pub happiness_score: String,
    #[serde(rename = "Difference_Country")]
    #[tabled(rename = "Difference_Country")]
    pub difference_country: String,
    #[serde(rename = "Difference_Year")]
    #[tabled(rename = "Difference_Year")]
    pub difference_year: String,
}
