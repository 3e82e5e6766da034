use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Field, Settings};
use crate::consensus::{resolve, FieldResult};
use crate::error::{ConfigError, DocumentError};
use crate::normalize::Normalizer;
use crate::ocr::{collect_candidates, Recognizer};
use crate::region;
use crate::report::BatchResult;
use crate::strategy::{generate_strategies, Strategy};

/// A decoded certificate image.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name used in the results.
    pub name: String,
    pub image: DynamicImage,
}

impl Document {
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let image = image::open(path).map_err(|source| DocumentError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file_name(path), image))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extraction outcome for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub file: String,
    pub reg_number: FieldResult,
    pub vin: FieldResult,
    pub body_number: FieldResult,
    /// Set only when the document could not be read at all.
    pub error: Option<String>,
}

impl ParseResult {
    pub fn unreadable(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            reg_number: FieldResult::empty(),
            vin: FieldResult::empty(),
            body_number: FieldResult::empty(),
            error: Some(error.into()),
        }
    }

    pub fn field(&self, field: Field) -> &FieldResult {
        match field {
            Field::RegNumber => &self.reg_number,
            Field::Vin => &self.vin,
            Field::BodyNumber => &self.body_number,
        }
    }
}

/// Runs the whole pipeline: region → strategies → normalisation → vote.
///
/// Construction validates the settings and fixes the strategy list, so a
/// bad configuration is reported before any document is touched. The
/// parser owns a rayon pool; every strategy of every field of a document
/// runs on it.
pub struct DocumentParser<R> {
    settings: Settings,
    strategies: Vec<Strategy>,
    normalizer: Normalizer,
    recognizer: R,
    pool: rayon::ThreadPool,
}

impl<R: Recognizer> DocumentParser<R> {
    pub fn new(settings: Settings, recognizer: R) -> Result<Self, ConfigError> {
        settings.validate()?;
        let strategies = generate_strategies(&settings.strategy)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|i| format!("ocr-worker-{i}"))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

        info!(
            engine = recognizer.name(),
            strategies = strategies.len(),
            workers = pool.current_num_threads(),
            "parser ready"
        );
        Ok(Self {
            normalizer: Normalizer::new(settings.body_number),
            settings,
            strategies,
            recognizer,
            pool,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Extract and vote on a single field.
    ///
    /// A band that does not exist on this document yields an empty result
    /// rather than an error.
    pub fn extract_field(&self, document: &Document, field: Field) -> FieldResult {
        let bounds = self.settings.regions.get(field);
        let band = match region::extract(&document.image, bounds) {
            Ok(band) => band,
            Err(e) => {
                warn!(file = %document.name, %field, error = %e, "region skipped");
                return FieldResult::empty();
            }
        };

        let raw = self
            .pool
            .install(|| collect_candidates(&self.recognizer, &band, &self.strategies));
        let normalized = self.normalizer.normalize_all(field, &raw);
        debug!(
            file = %document.name,
            %field,
            raw = raw.len(),
            normalized = normalized.len(),
            "candidates"
        );
        resolve(field, &normalized)
    }

    pub fn parse(&self, document: &Document) -> ParseResult {
        let started = Instant::now();
        let (reg_number, (vin, mut body_number)) = self.pool.install(|| {
            rayon::join(
                || self.extract_field(document, Field::RegNumber),
                || {
                    rayon::join(
                        || self.extract_field(document, Field::Vin),
                        || self.extract_field(document, Field::BodyNumber),
                    )
                },
            )
        });

        if self.settings.body_falls_back_to_vin && !body_number.is_found() && vin.is_found() {
            debug!(file = %document.name, "body number taken from VIN");
            body_number = vin.clone();
        }

        info!(
            file = %document.name,
            reg_number = reg_number.value.as_deref().unwrap_or("-"),
            vin = vin.value.as_deref().unwrap_or("-"),
            body_number = body_number.value.as_deref().unwrap_or("-"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document parsed"
        );
        ParseResult {
            file: document.name.clone(),
            reg_number,
            vin,
            body_number,
            error: None,
        }
    }

    /// Open and parse one file. An unreadable file gives an empty result
    /// carrying the error message.
    pub fn parse_file(&self, path: &Path) -> ParseResult {
        match Document::open(path) {
            Ok(document) => self.parse(&document),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document skipped");
                ParseResult::unreadable(file_name(path), e.to_string())
            }
        }
    }

    /// Parse every path in order. One bad file never stops the batch.
    pub fn parse_paths(&self, paths: &[PathBuf]) -> BatchResult {
        let total = paths.len();
        let documents = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                debug!(n = i + 1, total, path = %path.display(), "parsing");
                self.parse_file(path)
            })
            .collect();
        BatchResult::from_results(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyAxes;
    use crate::error::RecognitionError;
    use crate::ocr::Recognition;
    use crate::strategy::RecognitionParams;
    use image::{GrayImage, Luma};

    /// Reads the same VIN from every band.
    struct VinOnly;

    impl Recognizer for VinOnly {
        fn name(&self) -> &str {
            "vin-only"
        }

        fn recognize(
            &self,
            _image: &GrayImage,
            _params: &RecognitionParams,
        ) -> Result<Recognition, RecognitionError> {
            Ok(Recognition {
                text: "WP1ZZZ9PZ9LA42290".into(),
                confidence: Some(0.9),
            })
        }
    }

    fn small_settings() -> Settings {
        Settings {
            strategy: StrategyAxes {
                language_sets: vec!["eng".into()],
                psm_modes: vec![6, 7],
                contrast: vec!["2.0x2".parse().unwrap(), "3.0x2".parse().unwrap()],
                min_heights: vec![0],
                ..StrategyAxes::default()
            },
            workers: 2,
            ..Settings::default()
        }
    }

    fn document() -> Document {
        Document::new(
            "synthetic.png",
            DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 100, Luma([200]))),
        )
    }

    #[test]
    fn construction_rejects_invalid_settings() {
        let mut settings = small_settings();
        settings.strategy.psm_modes.clear();
        assert!(matches!(
            DocumentParser::new(settings, VinOnly),
            Err(ConfigError::EmptyAxis { axis: "psm_modes" })
        ));
    }

    #[test]
    fn every_field_is_voted_independently() {
        let parser = DocumentParser::new(small_settings(), VinOnly).unwrap();
        assert_eq!(parser.strategies().len(), 4);

        let result = parser.parse(&document());
        assert_eq!(result.file, "synthetic.png");
        assert_eq!(result.reg_number, FieldResult::empty());
        assert_eq!(result.vin.value.as_deref(), Some("WP1ZZZ9PZ9LA42290"));
        assert_eq!(result.vin.votes, 4);
        // The VIN text is also a plausible body number.
        assert_eq!(result.body_number.value.as_deref(), Some("WP1ZZZ9PZ9LA42290"));
        assert!(result.error.is_none());
    }

    #[test]
    fn body_falls_back_to_vin_when_enabled() {
        let mut settings = small_settings();
        settings.body_number.max_length = 10;
        let parser = DocumentParser::new(settings.clone(), VinOnly).unwrap();
        assert!(!parser.parse(&document()).body_number.is_found());

        settings.body_falls_back_to_vin = true;
        let parser = DocumentParser::new(settings, VinOnly).unwrap();
        let result = parser.parse(&document());
        assert_eq!(result.body_number, result.vin);
    }

    #[test]
    fn unreadable_file_yields_error_entry() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.jpg");
        std::fs::write(&bogus, b"not an image").unwrap();

        let parser = DocumentParser::new(small_settings(), VinOnly).unwrap();
        let result = parser.parse_file(&bogus);
        assert_eq!(result.file, "broken.jpg");
        assert!(result.error.is_some());
        for field in Field::ALL {
            assert_eq!(result.field(field), &FieldResult::empty());
        }
    }
}
