pub mod tesseract;

#[cfg(feature = "native-tesseract")]
pub mod native;

use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use std::sync::Mutex;
use tracing::{debug, trace};

use crate::error::RecognitionError;
use crate::preprocess::{enhance, PreprocessParams};
use crate::strategy::{RecognitionParams, Strategy};

// ── Public types ─────────────────────────────────────────────────────────────

/// What an engine returns for one image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recognition {
    pub text: String,
    /// Mean confidence in 0.0 – 1.0, when the engine reports one.
    pub confidence: Option<f64>,
}

/// Raw text produced by one strategy for one band.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub strategy: usize,
    pub text: String,
    pub confidence: Option<f64>,
}

/// Every OCR backend implements this.
///
/// `recognize` receives the preprocessed band by reference and must not
/// assume anything about which field it belongs to. Implementations are
/// called from several worker threads at once.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognitionParams,
    ) -> Result<Recognition, RecognitionError>;
}

impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognitionParams,
    ) -> Result<Recognition, RecognitionError> {
        (**self).recognize(image, params)
    }
}

/// Funnels every call through one lock, for bindings that are not re-entrant.
pub struct Serialized<R> {
    inner: R,
    gate: Mutex<()>,
}

impl<R: Recognizer> Serialized<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

impl<R: Recognizer> Recognizer for Serialized<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognitionParams,
    ) -> Result<Recognition, RecognitionError> {
        // A panic in another call leaves nothing to repair behind a unit lock.
        let _guard = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.recognize(image, params)
    }
}

// ── Invocation ───────────────────────────────────────────────────────────────

/// Run one strategy's recognition step.
///
/// Engine failures and empty output are absorbed: the strategy simply
/// contributes no candidate.
pub fn recognize<R: Recognizer + ?Sized>(
    engine: &R,
    image: &GrayImage,
    strategy: &Strategy,
) -> Option<Candidate> {
    match engine.recognize(image, &strategy.recognition) {
        Ok(r) if !r.text.trim().is_empty() => {
            trace!(engine = engine.name(), %strategy, text = ?r.text, "recognised");
            Some(Candidate {
                strategy: strategy.index,
                text: r.text,
                confidence: r.confidence,
            })
        }
        Ok(_) => {
            debug!(engine = engine.name(), %strategy, "no text");
            None
        }
        Err(e) => {
            debug!(engine = engine.name(), %strategy, error = %e, "recognition failed");
            None
        }
    }
}

/// Run every strategy against one band and return the raw candidates in
/// strategy order.
///
/// Each distinct preprocessing variant is computed once and shared by the
/// strategies that only differ in recognition parameters. Both stages run
/// on the current rayon pool; the call returns only after all work joined.
pub fn collect_candidates<R: Recognizer + ?Sized>(
    engine: &R,
    band: &DynamicImage,
    strategies: &[Strategy],
) -> Vec<Candidate> {
    let mut variants: Vec<PreprocessParams> = Vec::new();
    let mut variant_of: Vec<usize> = Vec::with_capacity(strategies.len());
    for s in strategies {
        let idx = match variants.iter().position(|v| *v == s.preprocess) {
            Some(i) => i,
            None => {
                variants.push(s.preprocess);
                variants.len() - 1
            }
        };
        variant_of.push(idx);
    }

    let processed: Vec<GrayImage> = variants.par_iter().map(|p| enhance(band, p)).collect();

    strategies
        .par_iter()
        .zip(variant_of.par_iter())
        .filter_map(|(s, &v)| recognize(engine, &processed[v], s))
        .collect()
}
