use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Problems with the configuration record.
///
/// These are fatal and are reported before any document is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("region `{field}`: {message}")]
    InvalidRegion { field: &'static str, message: String },

    #[error("strategy axis `{axis}` is empty")]
    EmptyAxis { axis: &'static str },

    #[error("strategy axis `{axis}` lists {value} more than once")]
    DuplicateAxisValue { axis: &'static str, value: String },

    #[error("degenerate strategy set: {message}")]
    DegenerateStrategies { message: String },

    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build worker pool: {0}")]
    WorkerPool(String),
}

impl ConfigError {
    pub(crate) fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A configured band does not exist on this particular document.
#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("region {start:.3}..{end:.3} is empty on a {width}x{height} document")]
    Empty {
        start: f64,
        end: f64,
        width: u32,
        height: u32,
    },
}

/// One engine call failed. Always absorbed by the invoker.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("cannot start OCR engine {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    TimedOut(Duration),

    #[error("OCR engine produced no text")]
    NoText,

    #[error("OCR engine: {0}")]
    Engine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A document image could not be loaded.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read image {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
