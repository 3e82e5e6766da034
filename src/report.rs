use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Field;
use crate::error::ReportError;
use crate::parser::ParseResult;

/// Tag written into every results file.
pub const FORMAT_VERSION: &str = "1.0.0";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// Documents whose field resolved to a value, per field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub reg_numbers_found: usize,
    pub vins_found: usize,
    pub body_numbers_found: usize,
}

impl Statistics {
    pub fn found(&self, field: Field) -> usize {
        match field {
            Field::RegNumber => self.reg_numbers_found,
            Field::Vin => self.vins_found,
            Field::BodyNumber => self.body_numbers_found,
        }
    }
}

/// Results for a batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub documents: Vec<ParseResult>,
    pub statistics: Statistics,
}

impl BatchResult {
    pub fn from_results(documents: Vec<ParseResult>) -> Self {
        let count = |field: Field| {
            documents
                .iter()
                .filter(|d| d.field(field).is_found())
                .count()
        };
        let statistics = Statistics {
            reg_numbers_found: count(Field::RegNumber),
            vins_found: count(Field::Vin),
            body_numbers_found: count(Field::BodyNumber),
        };
        Self {
            documents,
            statistics,
        }
    }

    pub fn total_processed(&self) -> usize {
        self.documents.len()
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&BatchRecord::from(self))?)
    }

    /// Write the results as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        let write_err = |source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, json).map_err(write_err)?;
        info!(path = %path.display(), documents = self.total_processed(), "results written");
        Ok(())
    }
}

// ── On-disk shape ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct BatchRecord<'a> {
    documents: Vec<DocumentRecord<'a>>,
    total_processed: usize,
    statistics: Statistics,
    version: &'static str,
}

#[derive(Serialize)]
struct DocumentRecord<'a> {
    file: &'a str,
    reg_number: Option<&'a str>,
    vin: Option<&'a str>,
    body_number: Option<&'a str>,
    votes: Votes,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct Votes {
    reg_number: usize,
    vin: usize,
    body_number: usize,
}

impl<'a> From<&'a BatchResult> for BatchRecord<'a> {
    fn from(batch: &'a BatchResult) -> Self {
        let documents = batch
            .documents
            .iter()
            .map(|d| DocumentRecord {
                file: &d.file,
                reg_number: d.reg_number.value.as_deref(),
                vin: d.vin.value.as_deref(),
                body_number: d.body_number.value.as_deref(),
                votes: Votes {
                    reg_number: d.reg_number.votes,
                    vin: d.vin.votes,
                    body_number: d.body_number.votes,
                },
                error: d.error.as_deref(),
            })
            .collect();
        Self {
            documents,
            total_processed: batch.total_processed(),
            statistics: batch.statistics,
            version: FORMAT_VERSION,
        }
    }
}

// ── Input discovery ──────────────────────────────────────────────────────────

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Image files directly inside `dir`, sorted by name.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let list_err = |source| ReportError::List {
        path: dir.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::FieldResult;

    fn found(value: &str, votes: usize) -> FieldResult {
        FieldResult {
            value: Some(value.to_string()),
            votes,
        }
    }

    fn sample() -> BatchResult {
        BatchResult::from_results(vec![
            ParseResult {
                file: "a.jpg".into(),
                reg_number: found("В883ВО799", 36),
                vin: FieldResult::empty(),
                body_number: FieldResult::empty(),
                error: None,
            },
            ParseResult {
                file: "b.png".into(),
                reg_number: found("А123АА77", 20),
                vin: found("WP1ZZZ9PZ9LA42290", 18),
                body_number: FieldResult::empty(),
                error: None,
            },
            ParseResult::unreadable("c.bmp", "cannot read image c.bmp"),
        ])
    }

    #[test]
    fn statistics_count_non_null_fields() {
        let batch = sample();
        assert_eq!(batch.total_processed(), 3);
        assert_eq!(
            batch.statistics,
            Statistics {
                reg_numbers_found: 2,
                vins_found: 1,
                body_numbers_found: 0,
            }
        );
        assert_eq!(batch.statistics.found(Field::Vin), 1);
    }

    #[test]
    fn json_layout() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["version"], FORMAT_VERSION);
        assert_eq!(json["total_processed"], 3);
        assert_eq!(json["statistics"]["reg_numbers_found"], 2);

        let docs = json["documents"].as_array().unwrap();
        assert_eq!(docs[0]["file"], "a.jpg");
        assert_eq!(docs[0]["reg_number"], "В883ВО799");
        assert!(docs[0]["vin"].is_null());
        assert_eq!(docs[0]["votes"]["reg_number"], 36);
        assert_eq!(docs[0]["votes"]["vin"], 0);
        assert!(docs[0].get("error").is_none());
        assert_eq!(docs[2]["error"], "cannot read image c.bmp");
    }

    #[test]
    fn cyrillic_is_written_verbatim() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("В883ВО799"));
        assert!(!json.contains("\\u"));
    }

    #[test]
    fn write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/output/results.json");
        sample().write_json(&out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("\"total_processed\": 3"));
    }

    #[test]
    fn collect_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "c.tiff", "d"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = collect_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.JPG", "c.tiff"]);
    }

    #[test]
    fn collect_images_reports_missing_dir() {
        let err = collect_images(Path::new("/nonexistent/vehicle-ocr-input")).unwrap_err();
        assert!(matches!(err, ReportError::List { .. }));
    }
}
