// Interaction state for the charts: the year slider, the country dropdown
// and one category dropdown per metric. Charts read it as a plain value and
// never keep their own copy between renders.
use crate::derive::CategorizedCountry;
use crate::error::{ReportError, ReportResult};
use crate::normalize::{countries_present, years_present};
use crate::types::{Category, CountryYearRecord, Metric, Variable};
use std::collections::BTreeMap;

pub const DEFAULT_COUNTRY: &str = "Afghanistan";

/// Dropdown value for one metric: everything, or a single tertile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn admits(self, category: Option<Category>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(wanted),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Only(c) => c.label(),
        }
    }
}

/// Per-metric filters, combined conjunctively. Metrics without an entry are
/// unfiltered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryFilters(BTreeMap<Metric, CategoryFilter>);

impl CategoryFilters {
    pub fn get(&self, metric: Metric) -> CategoryFilter {
        self.0.get(&metric).copied().unwrap_or_default()
    }

    pub fn set(&mut self, metric: Metric, filter: CategoryFilter) {
        match filter {
            CategoryFilter::All => {
                self.0.remove(&metric);
            }
            only => {
                self.0.insert(metric, only);
            }
        }
    }

    /// True when the row passes every active filter.
    pub fn matches(&self, row: &CategorizedCountry) -> bool {
        self.0
            .iter()
            .all(|(m, f)| f.admits(row.category(Variable::Metric(*m))))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionState {
    pub year: i32,
    pub country: String,
    pub filters: CategoryFilters,
}

impl InteractionState {
    pub fn with_filter(mut self, metric: Metric, filter: CategoryFilter) -> Self {
        self.filters.set(metric, filter);
        self
    }
}

/// The option sets the interactive controls offer, enumerated from the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub years: Vec<i32>,
    pub countries: Vec<String>,
}

impl Controls {
    pub fn from_records(records: &[CountryYearRecord]) -> Self {
        Self { years: years_present(records), countries: countries_present(records) }
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    /// Latest year, the seed country when present (else the first name), no
    /// category filters.
    pub fn default_state(&self) -> InteractionState {
        let country = if self.countries.iter().any(|c| c == DEFAULT_COUNTRY) {
            DEFAULT_COUNTRY.to_string()
        } else {
            self.countries.first().cloned().unwrap_or_default()
        };
        InteractionState {
            year: self.years.last().copied().unwrap_or_default(),
            country,
            filters: CategoryFilters::default(),
        }
    }

    /// Nearest year present in the data; earlier year on a tie.
    pub fn snap_year(&self, year: i32) -> i32 {
        self.years
            .iter()
            .copied()
            .min_by_key(|y| ((y - year).abs(), *y))
            .unwrap_or(year)
    }

    pub fn select_year(&self, state: InteractionState, year: i32) -> InteractionState {
        InteractionState { year: self.snap_year(year), ..state }
    }

    pub fn select_country(
        &self,
        state: InteractionState,
        country: &str,
    ) -> ReportResult<InteractionState> {
        match self.countries.iter().find(|c| c.as_str() == country) {
            Some(found) => Ok(InteractionState { country: found.clone(), ..state }),
            None => Err(ReportError::UnknownCountry { country: country.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, year: i32) -> CountryYearRecord {
        CountryYearRecord { country: country.into(), year, happiness_score: 5.0, rank: 1 }
    }

    fn categorized(country: &str, gdp: Category, trust: Category) -> CategorizedCountry {
        let mut categories = BTreeMap::new();
        categories.insert(Variable::Metric(Metric::Gdp), gdp);
        categories.insert(Variable::Metric(Metric::GovernmentTrust), trust);
        CategorizedCountry { country: country.into(), happiness_score: 5.0, categories }
    }

    #[test]
    fn defaults_to_latest_year_and_seed_country() {
        let controls = Controls::from_records(&[
            rec("Chile", 2016),
            rec("Afghanistan", 2024),
            rec("Chile", 2019),
        ]);
        let state = controls.default_state();
        assert_eq!(state.year, 2024);
        assert_eq!(state.country, "Afghanistan");
        assert!(state.filters.is_empty());
        assert_eq!(controls.year_bounds(), Some((2016, 2024)));
    }

    #[test]
    fn falls_back_to_first_country() {
        let controls = Controls::from_records(&[rec("Chile", 2016), rec("Benin", 2016)]);
        assert_eq!(controls.default_state().country, "Benin");
    }

    #[test]
    fn year_is_bounded_to_present_years() {
        let controls = Controls::from_records(&[rec("A", 2015), rec("A", 2018), rec("A", 2024)]);
        let state = controls.default_state();
        assert_eq!(controls.select_year(state.clone(), 1990).year, 2015);
        assert_eq!(controls.select_year(state.clone(), 2030).year, 2024);
        assert_eq!(controls.select_year(state, 2017).year, 2018);
    }

    #[test]
    fn unknown_country_is_rejected() {
        let controls = Controls::from_records(&[rec("A", 2015)]);
        let err = controls.select_country(controls.default_state(), "Atlantis").unwrap_err();
        assert!(matches!(err, ReportError::UnknownCountry { .. }));
    }

    #[test]
    fn filters_are_conjunctive_and_commute() {
        let rows = vec![
            categorized("A", Category::High, Category::High),
            categorized("B", Category::High, Category::Low),
            categorized("C", Category::Low, Category::High),
        ];
        let base = Controls::from_records(&[rec("A", 2024)]).default_state();
        let one = base
            .clone()
            .with_filter(Metric::Gdp, CategoryFilter::Only(Category::High))
            .with_filter(Metric::GovernmentTrust, CategoryFilter::Only(Category::High));
        let other = base
            .with_filter(Metric::GovernmentTrust, CategoryFilter::Only(Category::High))
            .with_filter(Metric::Gdp, CategoryFilter::Only(Category::High));
        let pick = |s: &InteractionState| -> Vec<String> {
            rows.iter().filter(|r| s.filters.matches(r)).map(|r| r.country.clone()).collect()
        };
        assert_eq!(pick(&one), vec!["A".to_string()]);
        assert_eq!(pick(&one), pick(&other));
    }

    #[test]
    fn missing_category_fails_an_active_filter() {
        let row = categorized("A", Category::High, Category::High);
        let mut filters = CategoryFilters::default();
        filters.set(Metric::Generosity, CategoryFilter::Only(Category::Low));
        assert!(!filters.matches(&row));
        filters.set(Metric::Generosity, CategoryFilter::All);
        assert!(filters.matches(&row));
    }
}
