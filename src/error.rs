use thiserror::Error;

/// Reasons a statement upload is rejected as a whole.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unsupported file format: missing column '{0}'. Expected an M-Pesa statement CSV")]
    Unrecognized(String),

    #[error("Invalid Completion Time on row {row}: '{value}' (expected YYYY-MM-DD HH:MM:SS)")]
    BadDate { row: usize, value: String },

    #[error("Invalid {field} amount on row {row}: '{value}'")]
    BadAmount {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A category or keyword edit that was refused. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryOpError {
    #[error("Category name is empty")]
    EmptyCategoryName,

    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Keyword is empty")]
    EmptyKeyword,

    #[error("Keyword '{keyword}' already exists in '{category}'")]
    DuplicateKeyword { category: String, keyword: String },
}

impl CategoryOpError {
    /// Empty or duplicate input; the caller gets `false` rather than an error.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CategoryOpError::UnknownCategory(_))
    }
}
