// Narrative report over the World Happiness Report survey: loads the
// single-year breakdown and the multi-year scores, derives rankings,
// correlations, tertiles and relative happiness, and binds them to
// Vega-Lite charts.

pub mod charts;
pub mod derive;
pub mod error;
pub mod geo;
pub mod interaction;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod util;

pub use error::{ReportError, ReportResult};
pub use pipeline::{run, Dataset, ReportConfig};
