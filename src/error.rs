use thiserror::Error;

/// Errors surfaced by annotation-table operations.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("cannot concatenate an empty set of tables")]
    EmptyTableSet,

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("no row index assigned to annotation {0}")]
    UnknownAnnotation(String),

    #[error("row index {index} out of range for table with {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },
}

/// Result type for annotation-table operations.
pub type Result<T> = std::result::Result<T, TableError>;
