//! Reads the registration plate, VIN and body number from scanned vehicle
//! registration certificates.
//!
//! Every field is cropped from a fixed band of the page, run through a grid
//! of preprocessing and OCR settings, normalised, and decided by vote.

pub mod config;
pub mod consensus;
pub mod error;
pub mod normalize;
pub mod ocr;
pub mod parser;
pub mod preprocess;
pub mod region;
pub mod report;
pub mod strategy;
pub mod vin;

pub use config::{Field, Settings};
pub use consensus::FieldResult;
pub use error::{ConfigError, DocumentError, RecognitionError, RegionError, ReportError};
pub use ocr::{Recognition, Recognizer};
pub use parser::{Document, DocumentParser, ParseResult};
pub use report::{BatchResult, Statistics, FORMAT_VERSION};
