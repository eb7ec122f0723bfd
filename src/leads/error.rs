use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeadCsvError {
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CSV has no header row")]
    MissingHeaders,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown verification status '{0}'")]
pub struct ParseStatusError(pub String);
