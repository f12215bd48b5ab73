//! Error Taxonomy
//!
//! Every core operation returns `Result<T, EdfsError>`. Storage backends speak
//! `anyhow` and are folded into `EdfsError::Backend` at the engine boundary.

use thiserror::Error;

pub type EdfsResult<T> = Result<T, EdfsError>;

/// Textual status carried in every HTTP envelope.
pub const STATUS_OK: &str = "EDFS200";
pub const STATUS_NO_CONTENT: &str = "EDFS204";
pub const STATUS_BAD_REQUEST: &str = "EDFS400";

#[derive(Error, Debug)]
pub enum EdfsError {
    #[error("{0}: No such file or directory")]
    PathNotFound(String),

    #[error("{0}: File exists")]
    AlreadyExists(String),

    #[error("Cannot remove {0}: Directory is not empty")]
    DirectoryNotEmpty(String),

    #[error("Cannot remove {0}: Root directory")]
    RootDeletionForbidden(String),

    #[error("File does not exist: {0}")]
    SourceFileNotFound(String),

    #[error("Invalid file: {0}")]
    InvalidFileType(String),

    #[error("Column {0} doesn't exist")]
    ColumnNotFound(String),

    #[error("Cannot aggregate on column {0}: Data not numeric")]
    ColumnNotNumeric(String),

    #[error("No partitions found for {0}")]
    NoPartitionsFound(String),

    #[error("No content found for partition {partition} of file {path}")]
    NoContentForPartition { path: String, partition: u32 },

    #[error("No data found")]
    NoDataAggregated,

    #[error("{0}: Is a directory")]
    NotAFile(String),

    #[error("{0}: Not a directory")]
    NotADirectory(String),

    #[error("{0}: Invalid path")]
    InvalidPath(String),

    #[error("Partition count must be at least 1")]
    InvalidPartitionCount,

    #[error("Malformed dataset: {0}")]
    Dataset(String),

    #[error("Storage backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl EdfsError {
    /// Envelope status for this error. All caller-visible failures share one code.
    pub fn status(&self) -> &'static str {
        STATUS_BAD_REQUEST
    }

    /// True for errors caused by the storage layer rather than the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, EdfsError::Backend(_))
    }
}
