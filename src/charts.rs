// Vega-Lite chart specifications for the report.
//
// Each figure is a pure function of the prepared tables and an
// `InteractionState`. The state seeds the initial value of every bound
// control; the `visible_*` helpers apply the same state on the Rust side so
// tabular views and tests see exactly what the chart shows.
use crate::derive::{
    BreakupCell, CategorizedCountry, CategoryTable, ContributionRow, CorrelationMatrix,
    RelativeHappiness, RESIDUAL_LABEL,
};
use crate::geo::GeoMatch;
use crate::interaction::{CategoryFilter, Controls, InteractionState};
use crate::normalize::top_ranked;
use crate::types::{Category, CountryYearRecord, Metric, Variable};
use crate::util::cmp_f64;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
pub const WORLD_TOPOJSON: &str =
    "https://cdn.jsdelivr.net/npm/vega-datasets@v1.29.0/data/world-110m.json";
/// Antarctica and Greenland dominate a Mercator projection without carrying
/// survey data.
pub const HIDDEN_GEOMETRY_IDS: [u16; 2] = [10, 304];
pub const LEADERBOARD_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: String,
    pub spec: Value,
}

fn title(text: &str) -> Value {
    json!({ "text": text, "anchor": "middle" })
}

fn category_field(variable: Variable) -> String {
    format!("{}_category", variable.label())
}

fn filter_param_name(metric: Metric) -> String {
    format!("filter_{}", metric.label().to_lowercase().replace(' ', "_"))
}

fn hidden_geometry_filter() -> Value {
    let clauses: Vec<String> =
        HIDDEN_GEOMETRY_IDS.iter().map(|id| format!("datum.id != {id}")).collect();
    json!({ "filter": clauses.join(" && ") })
}

fn year_slider(name: &str, controls: &Controls, year: i32) -> Value {
    let (min, max) = controls.year_bounds().unwrap_or((year, year));
    json!({
        "name": name,
        "select": { "type": "point", "fields": ["Year"] },
        "bind": { "input": "range", "min": min, "max": max, "step": 1, "name": "Year: " },
        "value": [{ "Year": year }]
    })
}

fn numeric_code(geo: &BTreeMap<String, GeoMatch>, country: &str) -> Option<u16> {
    geo.get(country).and_then(GeoMatch::numeric)
}

// --- figure 1: leaderboard and score breakup ---------------------------------

/// Top-ranked countries of the selected year, best first.
pub fn visible_leaderboard(
    history: &[CountryYearRecord],
    state: &InteractionState,
) -> Vec<CountryYearRecord> {
    top_ranked(history, LEADERBOARD_SIZE)
        .into_iter()
        .filter(|r| r.year == state.year)
        .cloned()
        .collect()
}

pub fn leaderboard_chart(
    history: &[CountryYearRecord],
    breakup: &[BreakupCell],
    controls: &Controls,
    state: &InteractionState,
) -> Chart {
    let values: Vec<Value> = top_ranked(history, LEADERBOARD_SIZE)
        .into_iter()
        .map(|r| {
            json!({
                "Country": r.country,
                "Year": r.year,
                "Happiness Score": r.happiness_score,
                "Rank": r.rank,
            })
        })
        .collect();

    let leaderboard = json!({
        "data": { "values": values },
        "mark": { "type": "bar", "color": "darkorange" },
        "params": [year_slider("select_year", controls, state.year)],
        "transform": [{ "filter": { "param": "select_year" } }],
        "encoding": {
            "y": {
                "field": "Country", "type": "nominal", "sort": "-x", "title": null,
                "axis": { "grid": false, "ticks": false, "labelPadding": 8 }
            },
            "x": {
                "field": "Happiness Score", "type": "quantitative",
                "scale": { "domain": [0, 9] }, "title": "Happiness Score",
                "axis": { "grid": false }
            },
            "tooltip": [
                { "field": "Country", "type": "nominal" },
                { "field": "Happiness Score", "type": "quantitative" },
                { "field": "Rank", "type": "quantitative" }
            ]
        },
        "width": 350,
        "height": 250,
        "title": title("Top 10 Happiest Countries in the World")
    });

    let mut component_order: Vec<&str> = Metric::ALL.iter().map(|m| m.label()).collect();
    component_order.push(RESIDUAL_LABEL);
    let breakup_chart = json!({
        "data": { "values": breakup },
        "mark": "bar",
        "encoding": {
            "x": {
                "field": "Happiness Score Breakup", "type": "quantitative",
                "scale": { "domain": [0, 9] },
                "axis": { "labelPadding": 3, "grid": false, "title": "Happiness Score" }
            },
            "y": {
                "field": "Country", "type": "nominal", "sort": "-x", "title": null,
                "axis": { "ticks": false, "labelPadding": 8 }
            },
            "color": { "field": "Metric", "type": "nominal", "sort": component_order },
            "order": { "field": "Metric", "type": "nominal", "sort": "descending" },
            "tooltip": [
                { "field": "Country", "type": "nominal" },
                { "field": "Metric", "type": "nominal" },
                { "field": "Happiness Score Breakup", "type": "quantitative" }
            ]
        },
        "width": 350,
        "height": 250,
        "title": title("Happiness Score Breakup of the Happiest Countries")
    });

    Chart {
        id: "leaderboard",
        title: "Top 10 happiest countries and their score breakup".to_string(),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "hconcat": [leaderboard, breakup_chart],
            "config": { "view": { "stroke": null } }
        }),
    }
}

// --- figure 2: correlations -----------------------------------------------------

pub fn correlation_chart(matrix: &CorrelationMatrix) -> Chart {
    let factors: Vec<Value> = matrix
        .with_happiness()
        .into_iter()
        .map(|(m, r)| json!({ "Factor": m.label(), "Correlation with Happiness Score": r }))
        .collect();

    let top_factors = json!({
        "data": { "values": factors },
        "mark": { "type": "bar", "color": "teal" },
        "encoding": {
            "x": {
                "field": "Correlation with Happiness Score", "type": "quantitative",
                "axis": { "labelPadding": 3, "grid": false }
            },
            "y": {
                "field": "Factor", "type": "nominal", "sort": "-x", "title": null,
                "axis": { "ticks": false, "labelPadding": 15 }
            },
            "tooltip": [
                { "field": "Factor", "type": "nominal" },
                { "field": "Correlation with Happiness Score", "type": "quantitative", "format": ".2f" }
            ]
        },
        "width": 350,
        "height": 250,
        "title": "Top Metrics Correlated with Happiness Score"
    });

    let order: Vec<&str> = matrix.variables.iter().map(|v| v.label()).collect();
    let heatmap = json!({
        "data": { "values": matrix.cells() },
        "encoding": {
            "x": {
                "field": "Variable 2", "type": "ordinal", "sort": order,
                "axis": {
                    "grid": false, "title": null, "ticks": false,
                    "labelAngle": -45, "labelPadding": 10
                }
            },
            "y": {
                "field": "Variable 1", "type": "ordinal", "sort": order,
                "axis": { "grid": false, "title": null, "ticks": false, "labelPadding": 10 }
            }
        },
        "layer": [
            {
                "mark": "rect",
                "encoding": {
                    "color": { "field": "correlation", "type": "quantitative", "scale": { "scheme": "reds" } }
                }
            },
            {
                "mark": "text",
                "encoding": {
                    "text": { "field": "correlation", "type": "quantitative", "format": ".2f" },
                    "color": {
                        "condition": { "test": "datum.correlation > 0.5", "value": "white" },
                        "value": "black"
                    }
                }
            }
        ],
        "width": 350,
        "height": 250,
        "title": title("Correlation Heatmap")
    });

    Chart {
        id: "correlation",
        title: "Metrics ranked by Spearman correlation with happiness".to_string(),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "hconcat": [top_factors, heatmap],
            "config": { "view": { "stroke": null } }
        }),
    }
}

// --- figure 3: GDP scatter --------------------------------------------------------

pub fn gdp_scatter_chart(categories: &CategoryTable, gdp: &BTreeMap<String, f64>) -> Chart {
    let happiness_field = category_field(Variable::HappinessScore);
    let values: Vec<Value> = categories
        .rows
        .iter()
        .filter_map(|r| {
            let x = gdp.get(&r.country)?;
            Some(json!({
                "Country": r.country,
                "GDP per capita": x,
                "Happiness Score": r.happiness_score,
                happiness_field.clone(): r.category(Variable::HappinessScore).map(Category::label),
            }))
        })
        .collect();

    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
    Chart {
        id: "gdp_scatter",
        title: "Happiness score against GDP per capita".to_string(),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "data": { "values": values },
            "layer": [
                {
                    "mark": "circle",
                    "encoding": {
                        "x": {
                            "field": "GDP per capita", "type": "quantitative",
                            "title": "Log GDP per capita", "axis": { "grid": false }
                        },
                        "y": {
                            "field": "Happiness Score", "type": "quantitative",
                            "title": "Happiness Score", "axis": { "grid": false }
                        },
                        "color": {
                            "field": happiness_field, "type": "nominal",
                            "scale": { "scheme": "category10", "domain": labels },
                            "legend": { "title": "Happiness" }
                        },
                        "tooltip": [
                            { "field": "Country", "type": "nominal" },
                            { "field": "Happiness Score", "type": "quantitative" }
                        ]
                    }
                },
                {
                    "transform": [{ "regression": "Happiness Score", "on": "GDP per capita" }],
                    "mark": { "type": "line", "strokeWidth": 2, "color": "black" },
                    "encoding": {
                        "x": { "field": "GDP per capita", "type": "quantitative" },
                        "y": { "field": "Happiness Score", "type": "quantitative" }
                    }
                }
            ],
            "title": "Happiness Score vs GDP per capita",
            "config": { "view": { "stroke": null } }
        }),
    }
}

// --- figure 4: dashboard map ---------------------------------------------------

/// Countries drawn on the dashboard map: those with an ISO code that pass
/// every active category filter.
pub fn visible_dashboard<'a>(
    categories: &'a CategoryTable,
    geo: &BTreeMap<String, GeoMatch>,
    state: &InteractionState,
) -> Vec<&'a CategorizedCountry> {
    categories
        .rows
        .iter()
        .filter(|r| numeric_code(geo, &r.country).is_some())
        .filter(|r| state.filters.matches(r))
        .collect()
}

fn category_dropdown(metric: Metric, filter: CategoryFilter) -> Value {
    let field = category_field(Variable::Metric(metric));
    let choices = [
        CategoryFilter::All,
        CategoryFilter::Only(Category::High),
        CategoryFilter::Only(Category::Average),
        CategoryFilter::Only(Category::Low),
    ];
    let options: Vec<Value> = choices
        .iter()
        .map(|f| match f {
            CategoryFilter::All => Value::Null,
            CategoryFilter::Only(c) => json!(c.label()),
        })
        .collect();
    let labels: Vec<&str> = choices.iter().map(|f| f.label()).collect();
    let mut param = json!({
        "name": filter_param_name(metric),
        "select": { "type": "point", "fields": [field], "clear": "click" },
        "bind": {
            "input": "select",
            "options": options,
            "labels": labels,
            "name": format!("{}:  ", metric.label())
        }
    });
    if let CategoryFilter::Only(c) = filter {
        param["value"] = json!([{ field: c.label() }]);
    }
    param
}

pub fn dashboard_map(
    categories: &CategoryTable,
    geo: &BTreeMap<String, GeoMatch>,
    state: &InteractionState,
) -> Chart {
    let values: Vec<Value> = categories
        .rows
        .iter()
        .filter_map(|r| {
            let id = numeric_code(geo, &r.country)?;
            let mut obj = Map::new();
            obj.insert("Country_iso_numeric".into(), json!(id));
            obj.insert("Country".into(), json!(r.country));
            obj.insert("Happiness Score".into(), json!(r.happiness_score));
            for v in Variable::ALL {
                obj.insert(category_field(v), json!(r.category(v).map(Category::label)));
            }
            Some(Value::Object(obj))
        })
        .collect();

    let mut lookup_fields = vec!["Happiness Score".to_string(), "Country".to_string()];
    lookup_fields.extend(Variable::ALL.iter().map(|v| category_field(*v)));

    let mut transform = vec![
        json!({
            "lookup": "id",
            "from": { "data": { "values": values }, "key": "Country_iso_numeric", "fields": lookup_fields }
        }),
        hidden_geometry_filter(),
        json!({ "filter": "isValid(datum.Country)" }),
    ];
    transform.extend(
        Metric::ALL
            .iter()
            .map(|m| json!({ "filter": { "param": filter_param_name(*m) } })),
    );

    let mut tooltip = vec![
        json!({ "field": "Country", "type": "nominal" }),
        json!({ "field": "Happiness Score", "type": "quantitative" }),
    ];
    tooltip.extend(Metric::ALL.iter().map(|m| {
        json!({
            "field": category_field(Variable::Metric(*m)),
            "type": "nominal",
            "title": m.label()
        })
    }));

    let menu = ["High", "Average", "Low"];
    let dropdowns: Vec<Value> = Metric::ALL
        .iter()
        .map(|m| category_dropdown(*m, state.filters.get(*m)))
        .collect();
    let factors = json!({
        "data": { "url": WORLD_TOPOJSON, "format": { "type": "topojson", "feature": "countries" } },
        "mark": { "type": "geoshape", "stroke": "black", "strokeWidth": 0.3 },
        "params": dropdowns,
        "transform": transform,
        "encoding": {
            "color": {
                "field": category_field(Variable::HappinessScore), "type": "nominal",
                "scale": { "domain": menu, "scheme": "viridis", "reverse": true },
                "title": "Happiness Score"
            },
            "tooltip": tooltip
        }
    });
    let base = json!({
        "data": { "url": WORLD_TOPOJSON, "format": { "type": "topojson", "feature": "countries" } },
        "mark": { "type": "geoshape", "fill": "lightgray", "stroke": "black" },
        "transform": [hidden_geometry_filter()]
    });

    Chart {
        id: "dashboard",
        title: "Happiness score dashboard".to_string(),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "layer": [base, factors],
            "projection": { "type": "mercator" },
            "width": 900,
            "height": 600,
            "title": { "text": "Happiness Score Dashboard" },
            "config": {
                "view": { "stroke": null },
                "title": { "fontSize": 15, "anchor": "middle", "color": "black", "offset": 10 },
                "legend": { "symbolStrokeWidth": 0, "padding": 10 }
            }
        }),
    }
}

// --- figure 5: country history ---------------------------------------------------

/// The selected country's scores, oldest year first.
pub fn visible_country_history<'a>(
    history: &'a [CountryYearRecord],
    state: &InteractionState,
) -> Vec<&'a CountryYearRecord> {
    let mut rows: Vec<&CountryYearRecord> =
        history.iter().filter(|r| r.country == state.country).collect();
    rows.sort_by_key(|r| r.year);
    rows
}

/// The selected country's metric shares, largest first.
pub fn visible_contributions(
    contributions: &[ContributionRow],
    state: &InteractionState,
) -> Vec<(Metric, f64)> {
    let mut out: Vec<(Metric, f64)> = contributions
        .iter()
        .filter(|r| r.country == state.country)
        .flat_map(|r| r.ratios.iter())
        .collect();
    out.sort_by(|a, b| cmp_f64(b.1, a.1));
    out
}

pub fn country_history_chart(
    history: &[CountryYearRecord],
    contributions: &[ContributionRow],
    controls: &Controls,
    state: &InteractionState,
) -> Chart {
    let scores: Vec<Value> = history
        .iter()
        .map(|r| {
            json!({ "Country": r.country, "Year": r.year, "Happiness Score": r.happiness_score })
        })
        .collect();
    let shares: Vec<Value> = contributions
        .iter()
        .flat_map(|r| {
            r.ratios.iter().map(move |(m, share)| {
                json!({
                    "Country": r.country,
                    "Factor": m.label(),
                    "Share of Happiness Score": share
                })
            })
        })
        .collect();

    let country_param = json!({
        "name": "select_country",
        "select": { "type": "point", "fields": ["Country"] },
        "bind": { "input": "select", "options": controls.countries, "name": "Select Country  " },
        "value": [{ "Country": state.country }]
    });
    let x = json!({ "field": "Year", "type": "ordinal", "axis": { "title": "Year", "labelAngle": 0 } });
    let y = json!({
        "field": "Happiness Score", "type": "quantitative",
        "scale": { "domain": [1, 10] }, "axis": { "title": "Happiness Score", "grid": false }
    });
    let hover_opacity = json!({ "condition": { "param": "hover_year", "value": 1 }, "value": 0 });

    let trend = json!({
        "data": { "values": scores },
        "transform": [{ "filter": { "param": "select_country" } }],
        "layer": [
            {
                "mark": { "type": "line", "interpolate": "basis" },
                "params": [country_param],
                "encoding": { "x": x, "y": y }
            },
            {
                "mark": { "type": "point", "color": "black", "size": 10 },
                "params": [{
                    "name": "hover_year",
                    "select": { "type": "point", "fields": ["Year"], "nearest": true, "on": "mouseover" }
                }],
                "encoding": { "x": x, "y": y, "opacity": hover_opacity }
            },
            {
                "mark": { "type": "text", "align": "left", "dy": -15 },
                "encoding": {
                    "x": x, "y": y,
                    "text": { "field": "Happiness Score", "type": "quantitative", "format": ".1f" },
                    "opacity": hover_opacity
                }
            }
        ],
        "width": 400,
        "height": 250,
        "title": title("Happiness Score by Year")
    });

    let share_x = json!({
        "field": "Share of Happiness Score", "type": "quantitative",
        "scale": { "domain": [0, 0.5] }, "axis": { "labelPadding": 3, "grid": false, "format": "%" }
    });
    let factor_y = json!({
        "field": "Factor", "type": "nominal", "sort": "-x", "title": null,
        "axis": { "ticks": false, "labelPadding": 8 }
    });
    let importance = json!({
        "data": { "values": shares },
        "transform": [{ "filter": { "param": "select_country" } }],
        "layer": [
            { "mark": { "type": "bar", "color": "darkorange" }, "encoding": { "x": share_x, "y": factor_y } },
            {
                "mark": { "type": "text", "align": "left", "baseline": "middle", "dx": 3 },
                "encoding": {
                    "x": share_x, "y": factor_y,
                    "text": { "field": "Share of Happiness Score", "type": "quantitative", "format": ".2%" }
                }
            }
        ],
        "width": 400,
        "height": 250,
        "title": { "text": "Most Important Metrics", "offset": 10, "anchor": "middle" }
    });

    Chart {
        id: "country_history",
        title: format!("Happiness trend and metric shares for {}", state.country),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "hconcat": [trend, importance],
            "resolve": { "scale": { "y": "independent" } },
            "config": { "view": { "stroke": null } }
        }),
    }
}

// --- figure 6: relative happiness globe ------------------------------------------

/// Deviation from the country's own mean, one column per year, keyed by ISO
/// numeric code.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativePivotRow {
    pub iso_numeric: u16,
    pub country: String,
    pub by_year: BTreeMap<i32, f64>,
}

/// Unmatched countries are left out. When two names share a code in the same
/// year the first row wins.
pub fn relative_pivot(
    relative: &[RelativeHappiness],
    geo: &BTreeMap<String, GeoMatch>,
) -> Vec<RelativePivotRow> {
    let mut seen: HashSet<(u16, i32)> = HashSet::new();
    let mut rows: BTreeMap<(u16, String), BTreeMap<i32, f64>> = BTreeMap::new();
    for r in relative {
        let Some(id) = numeric_code(geo, &r.country) else { continue };
        if !seen.insert((id, r.year)) {
            continue;
        }
        rows.entry((id, r.country.clone())).or_default().insert(r.year, r.difference_country);
    }
    rows.into_iter()
        .map(|((iso_numeric, country), by_year)| RelativePivotRow { iso_numeric, country, by_year })
        .collect()
}

pub fn relative_globe(
    relative: &[RelativeHappiness],
    geo: &BTreeMap<String, GeoMatch>,
    controls: &Controls,
    state: &InteractionState,
) -> Chart {
    let pivot = relative_pivot(relative, geo);
    let year_columns: Vec<String> = controls.years.iter().map(|y| y.to_string()).collect();
    let values: Vec<Value> = pivot
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            obj.insert("iso_numeric".into(), json!(row.iso_numeric));
            obj.insert("Country".into(), json!(row.country));
            for (year, diff) in &row.by_year {
                obj.insert(year.to_string(), json!(diff));
            }
            Value::Object(obj)
        })
        .collect();

    let mut lookup_fields = year_columns.clone();
    lookup_fields.push("Country".to_string());

    let countries = json!({
        "data": { "url": WORLD_TOPOJSON, "format": { "type": "topojson", "feature": "countries" } },
        "mark": { "type": "geoshape", "stroke": "black", "strokeWidth": 0.05 },
        "params": [year_slider("globe_year", controls, state.year)],
        "transform": [
            {
                "lookup": "id",
                "from": { "data": { "values": values }, "key": "iso_numeric", "fields": lookup_fields }
            },
            { "fold": year_columns, "as": ["Year", "Difference_Country"] },
            { "calculate": "parseInt(datum.Year)", "as": "Year" },
            {
                "calculate": "isValid(datum.Difference_Country) ? datum.Difference_Country : -1",
                "as": "Difference_Country"
            },
            { "filter": { "param": "globe_year" } }
        ],
        "encoding": {
            "color": {
                "condition": {
                    "test": "datum.Difference_Country > -1",
                    "field": "Difference_Country", "type": "quantitative",
                    "scale": { "scheme": "redyellowgreen", "domain": [-1, 1] },
                    "legend": { "title": "Relative Happiness" }
                },
                "value": "#dbe9f6"
            },
            "tooltip": [
                { "field": "Country", "type": "nominal" },
                {
                    "field": "Difference_Country", "type": "quantitative",
                    "format": ".2f", "title": "Relative Happiness"
                }
            ]
        }
    });

    Chart {
        id: "relative_globe",
        title: "Happiness relative to each country's own average".to_string(),
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "layer": [
                { "data": { "sphere": true }, "mark": { "type": "geoshape", "fill": "lightblue" } },
                {
                    "data": { "graticule": true },
                    "mark": { "type": "geoshape", "stroke": "white", "strokeWidth": 0.5 }
                },
                countries
            ],
            "projection": { "type": "naturalEarth1" },
            "width": 900,
            "height": 600,
            "title": title(
                "Happiness of Countries Relative to their National Averages Over the Last Decade"
            ),
            "config": { "view": { "stroke": null } }
        }),
    }
}
