use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source table '{table}' not found in store")]
    MissingTable { table: String },

    #[error("Source table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Malformed value in {table}.{column} (row {row_id}): {reason}")]
    DataQuality {
        table: String,
        column: String,
        row_id: i64,
        reason: String,
    },

    #[error("Sum of {table}.{column} for {group} is not a finite number")]
    NonFiniteTotal {
        table: String,
        column: String,
        group: String,
    },

    #[error("Malformed source file {file}: {reason}")]
    MalformedSource { file: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification used for logging and the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing table or column, unreadable store, unwritable output path.
    Configuration,
    /// Values that the cleaning rules cannot repair.
    DataQuality,
}

impl SummaryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SummaryError::DataQuality { .. }
            | SummaryError::NonFiniteTotal { .. }
            | SummaryError::MalformedSource { .. } => ErrorKind::DataQuality,
            SummaryError::Csv(e) if !e.is_io_error() => ErrorKind::DataQuality,
            _ => ErrorKind::Configuration,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::DataQuality => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, SummaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_is_a_configuration_error() {
        let err = SummaryError::MissingTable {
            table: "sales".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn malformed_numeric_is_a_data_quality_error() {
        let err = SummaryError::DataQuality {
            table: "purchases".to_string(),
            column: "Dollars".to_string(),
            row_id: 7,
            reason: "'12,50' is not a number".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::DataQuality);
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("purchases.Dollars"));
    }
}
