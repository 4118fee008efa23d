/// Errors from loading or parsing tile maps.
#[derive(Debug, thiserror::Error)]
pub enum DungenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("map has {found} rows, at most {max} allowed")]
    TooManyRows { found: usize, max: usize },
    #[error("map row {row} has {found} columns, at most {max} allowed")]
    RowTooLong { row: usize, found: usize, max: usize },
    #[error("unknown tile glyph {glyph:?} at row {row}, column {column}")]
    UnknownGlyph { glyph: char, row: usize, column: usize },
    #[error("invalid entropy {0:?}: expected 32 hex digits")]
    InvalidEntropy(String),
}
