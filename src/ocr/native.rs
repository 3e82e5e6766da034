use image::GrayImage;
use tesseract::{PageSegMode, Tesseract};

use super::{Recognition, Recognizer};
use crate::config::EngineSettings;
use crate::error::RecognitionError;
use crate::strategy::RecognitionParams;

/// libtesseract called in-process.
///
/// A fresh `Tesseract` handle is built per call, so the engine holds no
/// shared mutable state and can be used from every worker at once.
pub struct NativeTesseract {
    pub tessdata_dir: Option<String>,
}

impl NativeTesseract {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            tessdata_dir: settings
                .tessdata_dir
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned()),
        }
    }
}

impl Recognizer for NativeTesseract {
    fn name(&self) -> &str {
        "tesseract/native"
    }

    fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognitionParams,
    ) -> Result<Recognition, RecognitionError> {
        let (w, h) = image.dimensions();
        let lang = params.language_arg();
        let engine_err = |e: &dyn std::fmt::Display| RecognitionError::Engine(e.to_string());

        let psm = page_seg_mode(params.psm)
            .ok_or_else(|| RecognitionError::Engine(format!("unsupported PSM {}", params.psm)))?;

        let mut tess = Tesseract::new(self.tessdata_dir.as_deref(), Some(&lang))
            .map_err(|e| engine_err(&e))?
            .set_frame(image.as_raw(), w as i32, h as i32, 1, w as i32)
            .map_err(|e| engine_err(&e))?;
        tess.set_page_seg_mode(psm);
        let mut tess = tess.recognize().map_err(|e| engine_err(&e))?;

        let text = tess.get_text().map_err(|e| engine_err(&e))?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(RecognitionError::NoText);
        }
        let confidence = tess.mean_text_conf().max(0) as f64 / 100.0;
        Ok(Recognition {
            text,
            confidence: Some(confidence),
        })
    }
}

/// Tesseract's numeric `--psm` values as the typed enum.
fn page_seg_mode(psm: u8) -> Option<PageSegMode> {
    let mode = match psm {
        0 => PageSegMode::PsmOsdOnly,
        1 => PageSegMode::PsmAutoOsd,
        2 => PageSegMode::PsmAutoOnly,
        3 => PageSegMode::PsmAuto,
        4 => PageSegMode::PsmSingleColumn,
        5 => PageSegMode::PsmSingleBlockVertText,
        6 => PageSegMode::PsmSingleBlock,
        7 => PageSegMode::PsmSingleLine,
        8 => PageSegMode::PsmSingleWord,
        9 => PageSegMode::PsmCircleWord,
        10 => PageSegMode::PsmSingleChar,
        11 => PageSegMode::PsmSparseText,
        12 => PageSegMode::PsmSparseTextOsd,
        13 => PageSegMode::PsmRawLine,
        _ => return None,
    };
    Some(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PSM;

    #[test]
    fn every_configurable_psm_has_a_mode() {
        for psm in 0..=MAX_PSM {
            assert!(page_seg_mode(psm).is_some(), "PSM {psm}");
        }
        assert!(page_seg_mode(MAX_PSM + 1).is_none());
    }

    #[test]
    fn common_modes_map_to_their_names() {
        assert!(matches!(page_seg_mode(3), Some(PageSegMode::PsmAuto)));
        assert!(matches!(page_seg_mode(6), Some(PageSegMode::PsmSingleBlock)));
        assert!(matches!(page_seg_mode(11), Some(PageSegMode::PsmSparseText)));
    }
}
