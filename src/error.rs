use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;

/// A specialized [`Result`](std::result::Result) for parsing and rendering.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between reading a measurements file and writing a chart.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The measurements file could not be opened.
    #[error("couldn't open {}", path.display())]
    Open {
        /// The path that was opened.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Reading a record failed, either on I/O or on invalid UTF-8.
    #[error("couldn't read measurements")]
    Read(#[from] csv::Error),

    /// A line had other than three fields and strict parsing was requested.
    #[error("line {line}: expected 3 fields, found {fields}")]
    FieldCount {
        /// The 1-based line number.
        line: u64,
        /// The number of fields found on the line.
        fields: usize,
    },

    /// The input size field wasn't an unsigned integer.
    #[error("line {line}: invalid input size {value:?}")]
    InvalidSize {
        /// The 1-based line number.
        line: u64,
        /// The offending field.
        value: String,
        /// Why it didn't parse.
        source: ParseIntError,
    },

    /// The thread count field wasn't an unsigned integer.
    #[error("line {line}: invalid thread count {value:?}")]
    InvalidThreads {
        /// The 1-based line number.
        line: u64,
        /// The offending field.
        value: String,
        /// Why it didn't parse.
        source: ParseIntError,
    },

    /// The elapsed time field wasn't `SS.sss` or `MM:SS.sss`.
    #[error("line {line}: invalid elapsed time {value:?}")]
    InvalidTime {
        /// The 1-based line number.
        line: u64,
        /// The offending field.
        value: String,
        /// Why it didn't parse.
        source: TimeError,
    },

    /// Drawing the chart failed.
    #[error("couldn't draw chart: {0}")]
    Draw(String),

    /// Converting the chart to a raster image failed.
    #[error("couldn't rasterize chart: {0}")]
    Rasterize(String),

    /// The output path has an extension other than `png` or `svg`.
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The chart could not be written.
    #[error("couldn't write {}", path.display())]
    Write {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Why an elapsed time string couldn't be converted to seconds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// One of the components wasn't a number.
    #[error(transparent)]
    Number(#[from] ParseFloatError),

    /// More than one `:` separator.
    #[error("expected at most one ':'")]
    TooManyColons,

    /// The value was NaN or infinite.
    #[error("not a finite number of seconds")]
    NotFinite,
}
