use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// An uploaded input is malformed or missing a required section/column.
    #[error("malformed input: {0}")]
    Format(String),

    /// The workbook does not have the sheet or columns the merge expects.
    #[error("workbook layout error: {0}")]
    Layout(String),

    /// Reading or writing an artifact failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for ReconcileError {
    fn from(e: std::io::Error) -> Self {
        ReconcileError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
