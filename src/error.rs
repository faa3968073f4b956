use std::fmt::{self, Debug, Display};
use std::io;
use std::path::PathBuf;

/// Provides `StrideError` and maps other errors to
/// convert to a `StrideError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum StrideError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// Missing mandatory keys, unparseable values such as dates, or an empty horizon.
    ConfigInvalid(String),
    /// A schedule vector does not cover the calendar horizon.
    ShapeMismatch {
        schedule: &'static str,
        expected: usize,
        found: usize,
    },
    /// The calendar was asked to move past its last day.
    OutOfHorizon {
        day: usize,
        horizon: usize,
    },
    /// The runner has already been ended.
    Ended,
    OutputPathUnwritable {
        path: PathBuf,
        source: io::Error,
    },
    /// The decision process has no simulation to operate on.
    NotCreated,
    ReportError(String),
}

impl From<io::Error> for StrideError {
    fn from(error: io::Error) -> Self {
        StrideError::IoError(error)
    }
}

impl From<serde_json::Error> for StrideError {
    fn from(error: serde_json::Error) -> Self {
        StrideError::JsonError(error)
    }
}

impl From<csv::Error> for StrideError {
    fn from(error: csv::Error) -> Self {
        StrideError::CsvError(error)
    }
}

impl std::error::Error for StrideError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrideError::IoError(error) => Some(error),
            StrideError::JsonError(error) => Some(error),
            StrideError::CsvError(error) => Some(error),
            StrideError::OutputPathUnwritable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for StrideError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrideError::IoError(error) => write!(f, "I/O error: {error}"),
            StrideError::JsonError(error) => write!(f, "JSON error: {error}"),
            StrideError::CsvError(error) => write!(f, "CSV error: {error}"),
            StrideError::ConfigInvalid(message) => write!(f, "invalid configuration: {message}"),
            StrideError::ShapeMismatch {
                schedule,
                expected,
                found,
            } => write!(
                f,
                "{schedule} schedule has {found} entries but the horizon is {expected} days"
            ),
            StrideError::OutOfHorizon { day, horizon } => write!(
                f,
                "day {day} is outside the simulation horizon of {horizon} days"
            ),
            StrideError::Ended => write!(f, "the simulation has already ended"),
            StrideError::OutputPathUnwritable { path, source } => write!(
                f,
                "cannot create output location {}: {source}",
                path.display()
            ),
            StrideError::NotCreated => write!(f, "no simulation has been created"),
            StrideError::ReportError(message) => write!(f, "report error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_errors_keep_their_source() {
        let error: StrideError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(error, StrideError::IoError(_)));
        assert!(error.source().is_some());
    }

    #[test]
    fn shape_mismatch_message_names_the_schedule() {
        let error = StrideError::ShapeMismatch {
            schedule: "workplace distancing",
            expected: 10,
            found: 3,
        };
        assert_eq!(
            error.to_string(),
            "workplace distancing schedule has 3 entries but the horizon is 10 days"
        );
    }
}
