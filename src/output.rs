use crate::charts::Chart;
use crate::error::ReportResult;
use crate::interaction::InteractionState;
use crate::pipeline::Dataset;
use crate::report::{self, Report};
use crate::util::format_int;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> ReportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChartBundle<'a> {
    title: &'a str,
    generated_at: DateTime<Utc>,
    charts: Vec<&'a Chart>,
}

/// All chart specs of the report in narrative order, stamped with the
/// generation time.
pub fn write_chart_bundle(path: impl AsRef<Path>, report: &Report) -> ReportResult<()> {
    let bundle = ChartBundle {
        title: &report.title,
        generated_at: Utc::now(),
        charts: report.charts().collect(),
    };
    write_json(path, &bundle)
}

pub fn write_html(path: impl AsRef<Path>, report: &Report) -> ReportResult<()> {
    std::fs::write(path, render_html(report)?)?;
    Ok(())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Self-contained page: narrative text plus one vega-embed call per chart.
pub fn render_html(report: &Report) -> ReportResult<String> {
    let mut html = String::new();
    let title = escape_html(&report.title);
    // `write!` into a String cannot fail
    let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{title}</title>");
    html.push_str(concat!(
        "<script src=\"https://cdn.jsdelivr.net/npm/vega@5\"></script>\n",
        "<script src=\"https://cdn.jsdelivr.net/npm/vega-lite@5\"></script>\n",
        "<script src=\"https://cdn.jsdelivr.net/npm/vega-embed@6\"></script>\n",
        "<style>body{font-family:sans-serif;max-width:960px;margin:auto;padding:1em}",
        ".caption{color:#555;font-size:0.9em}</style>\n</head>\n<body>\n"
    ));
    let _ = writeln!(
        html,
        "<h1>{title}</h1>\n<p class=\"caption\">{}</p>",
        escape_html(&report.byline)
    );

    let mut embeds = String::new();
    for section in &report.sections {
        let _ = writeln!(html, "<section>\n<h2>{}</h2>", escape_html(&section.heading));
        for para in &section.prose {
            let _ = writeln!(html, "<p>{}</p>", escape_html(para));
        }
        if let Some(chart) = &section.chart {
            let _ = writeln!(html, "<div id=\"{}\"></div>", chart.id);
            // keep "</script>" sequences in data from closing the tag
            let spec = serde_json::to_string(&chart.spec)?.replace("</", "<\\/");
            let _ = writeln!(embeds, "vegaEmbed('#{}', {spec}, {{actions: false}});", chart.id);
        }
        for line in section.caption.iter().chain(section.source.iter()) {
            let _ = writeln!(html, "<p class=\"caption\">{}</p>", escape_html(line));
        }
        html.push_str("</section>\n");
    }
    let _ = write!(html, "<script>\n{embeds}</script>\n</body>\n</html>\n");
    Ok(html)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Console summary of the run with a markdown preview of each prepared table.
pub fn print_previews(dataset: &Dataset, state: &InteractionState, max_rows: usize) {
    println!(
        "Processing dataset... ({} snapshot rows loaded, {} dropped as incomplete)",
        format_int(dataset.snapshot_report.total_rows),
        format_int(dataset.snapshot_report.dropped_rows)
    );
    println!(
        "History: {} rows loaded, {} dropped as incomplete, {} country-year records kept",
        format_int(dataset.history_report.total_rows),
        format_int(dataset.history_report.dropped_rows),
        format_int(dataset.history.len())
    );
    if !dataset.decomposition_outliers.is_empty() {
        println!(
            "Note: {} countries' metrics do not add up to their score.",
            format_int(dataset.decomposition_outliers.len())
        );
    }

    let year_note = format!("Year {}", state.year);
    preview_table(
        "Top 10 Happiest Countries",
        Some(&year_note),
        &report::leaderboard_preview(dataset, state),
        max_rows,
    );
    preview_table(
        "Metrics Correlated with Happiness Score",
        Some("Spearman"),
        &report::factor_preview(dataset),
        max_rows,
    );
    preview_table(
        "Metric Categories",
        Some("Tertiles of the single-year table"),
        &report::category_preview(dataset, state),
        max_rows,
    );
    let trend_note = format!("{} against its own and each year's mean", state.country);
    preview_table(
        "Relative Happiness",
        Some(&trend_note),
        &report::trend_preview(dataset, state),
        max_rows,
    );
}
