use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the DvLIR dashboard.
#[derive(Error, Debug)]
pub enum MeterError {
    /// A source file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required column is missing from a meter export.
    #[error("{file}: missing required column {column}")]
    Schema { file: String, column: String },

    /// A row of a meter export could not be parsed.
    #[error("{file}, line {line}: {message}")]
    Parse {
        file: String,
        line: u64,
        message: String,
    },

    /// An operation needs readings but the dataset is empty.
    #[error("Dataset contains no readings")]
    EmptyDataset,

    /// Analysis or plotting was requested before any data was imported.
    #[error("No data has been imported yet")]
    NotImported,

    /// The requested export does not make sense for the chosen table/format.
    #[error("Invalid export combination: {0}")]
    InvalidCombination(String),

    /// A threshold, date range or similar parameter is out of bounds.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The spreadsheet writer rejected the workbook.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The chart backend failed to draw.
    #[error("Plot rendering failed: {0}")]
    Render(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MeterError {
    /// Name of the source file this error refers to, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            MeterError::Schema { file, .. } | MeterError::Parse { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the meter crates.
pub type Result<T> = std::result::Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = MeterError::FileRead {
            path: PathBuf::from("/exports/meter.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/exports/meter.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_schema() {
        let err = MeterError::Schema {
            file: "march.csv".to_string(),
            column: "Status".to_string(),
        };
        assert_eq!(err.to_string(), "march.csv: missing required column Status");
    }

    #[test]
    fn test_error_display_parse() {
        let err = MeterError::Parse {
            file: "march.csv".to_string(),
            line: 7,
            message: "invalid counter value \"1,2,3\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "march.csv, line 7: invalid counter value \"1,2,3\""
        );
    }

    #[test]
    fn test_error_display_invalid_combination() {
        let err = MeterError::InvalidCombination("raw data cannot be split".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid export combination: raw data cannot be split"
        );
    }

    #[test]
    fn test_file_name_only_for_ingestion_errors() {
        let schema = MeterError::Schema {
            file: "a.csv".to_string(),
            column: "Date[UTC]".to_string(),
        };
        assert_eq!(schema.file_name(), Some("a.csv"));
        assert_eq!(MeterError::EmptyDataset.file_name(), None);
        assert_eq!(MeterError::NotImported.file_name(), None);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: MeterError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
