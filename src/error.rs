use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{table} table is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("{table} table has no usable rows after cleaning")]
    EmptyTable { table: String },

    #[error("'{metric}' cannot be split into tertiles: {distinct} distinct value(s)")]
    DegenerateDistribution { metric: String, distinct: usize },

    #[error("country '{country}' is not present in the data")]
    UnknownCountry { country: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
