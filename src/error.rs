//! Error types for the schema synchronizer

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for synchronizer operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// A logical name claimed by more than one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateName {
    pub name: String,
    pub paths: Vec<PathBuf>,
}

impl fmt::Display for DuplicateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for path in &self.paths {
            write!(f, "\n{}", path.display())?;
        }
        Ok(())
    }
}

/// Synchronizer errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(
        "There can only be one of each schema name. The following schemas were duplicated:\n{}",
        join_lines(.0)
    )]
    DuplicateNames(Vec<DuplicateName>),

    #[error("{rule}, got {name}")]
    InvalidName {
        kind: NameKind,
        name: String,
        rule: &'static str,
    },

    #[error("Failed to parse JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid JSON Schema document for event {name}\n{message}\n{document}")]
    InvalidSchema {
        name: String,
        message: String,
        document: String,
    },

    #[error("{} problems found in schema sources:\n{}", .0.len(), join_lines(.0))]
    Invalid(Vec<SyncError>),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store error: {op} {key}: {message}")]
    Store {
        op: StoreOp,
        key: String,
        message: String,
    },

    #[error("Scaffold error: {0}")]
    Scaffold(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Which naming grammar a name was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Message,
    Destination,
    Stream,
}

/// The registry operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Delete,
    Snapshot,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Put => write!(f, "put"),
            StoreOp::Delete => write!(f, "delete"),
            StoreOp::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl SyncError {
    pub fn store(op: StoreOp, key: impl Into<String>, err: impl fmt::Display) -> Self {
        SyncError::Store {
            op,
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Flatten this error into its individual problems
    pub fn problems(&self) -> Vec<&SyncError> {
        match self {
            SyncError::Invalid(errors) => errors.iter().flat_map(|e| e.problems()).collect(),
            other => vec![other],
        }
    }
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collects every failure found during a pass so they can be raised together
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<SyncError>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SyncError) {
        self.errors.push(error);
    }

    /// Record the error of a failed result, passing the value of a successful one through
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// A single problem is raised as itself; several are wrapped in `SyncError::Invalid`
    pub fn finish(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(SyncError::Invalid(self.errors)),
        }
    }
}
