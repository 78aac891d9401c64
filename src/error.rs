//! Errors raised by the mail and grade parsing core.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A mailbox boundary carried a date that does not match the date format.
    #[error("invalid mailbox date {value:?} (expected format {format:?}): {source}")]
    Parse {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The grading file for a person and round does not exist.
    #[error("grading file {0} does not exist")]
    GradeFileMissing(PathBuf),

    /// The grading file exists but contains no result block.
    #[error("file {0} is missing the expected grade block")]
    ResultBlockMissing(PathBuf),

    /// A grade string is not of the form `normal[+extra[+]]`.
    #[error("ill-formed grade {input:?}: {reason}")]
    Format { input: String, reason: String },

    /// None of the candidate text encodings could decode an attachment.
    #[error("attachment {filename:?} could not be decoded (tried {tried})")]
    Decode { filename: String, tried: String },

    /// An attachment filename has no usable last path component.
    #[error("attachment filename {0:?} does not name a file")]
    InvalidFilename(String),

    #[error("could not parse mail: {0}")]
    Mail(#[from] mailparse::MailParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
