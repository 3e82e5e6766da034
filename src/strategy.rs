use std::fmt;

use crate::config::StrategyAxes;
use crate::error::ConfigError;
use crate::preprocess::PreprocessParams;

/// Recognition half of a strategy: what the OCR engine is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecognitionParams {
    /// Tesseract language codes, in priority order.
    pub languages: Vec<String>,
    pub psm: u8,
}

impl RecognitionParams {
    /// The `+`-joined form Tesseract expects on the command line.
    pub fn language_arg(&self) -> String {
        self.languages.join("+")
    }
}

/// One combination of preprocessing and recognition parameters.
///
/// `index` is the position in generation order and breaks consensus ties.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub index: usize,
    pub recognition: RecognitionParams,
    pub preprocess: PreprocessParams,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} psm={} clahe={} min_h={}",
            self.index,
            self.recognition.language_arg(),
            self.recognition.psm,
            self.preprocess.contrast,
            self.preprocess.min_height
        )
    }
}

/// Expand the axes into their cross-product.
///
/// Order is fixed: language set (outermost) → PSM → contrast → min height
/// (innermost), each axis in the order it was configured.
pub fn generate_strategies(axes: &StrategyAxes) -> Result<Vec<Strategy>, ConfigError> {
    let mut strategies = Vec::with_capacity(
        axes.language_sets.len() * axes.psm_modes.len() * axes.preprocessing_variants(),
    );
    for langs in &axes.language_sets {
        let languages = parse_languages(langs);
        for &psm in &axes.psm_modes {
            for &contrast in &axes.contrast {
                for &min_height in &axes.min_heights {
                    strategies.push(Strategy {
                        index: strategies.len(),
                        recognition: RecognitionParams {
                            languages: languages.clone(),
                            psm,
                        },
                        preprocess: PreprocessParams {
                            contrast,
                            min_height,
                            upscale_filter: axes.upscale_filter,
                        },
                    });
                }
            }
        }
    }

    if strategies.len() < 2 {
        return Err(ConfigError::DegenerateStrategies {
            message: format!("{} strategy(ies) generated", strategies.len()),
        });
    }
    Ok(strategies)
}

/// Split a `+`-joined language set and expand short aliases.
pub fn parse_languages(set: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in set.split('+').map(str::trim).filter(|c| !c.is_empty()) {
        let code = match code {
            "en" | "eng" => "eng",
            "ru" | "rus" => "rus",
            "de" | "deu" => "deu",
            "fr" | "fra" => "fra",
            other => other,
        }
        .to_string();
        if !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContrastSetting, UpscaleFilter};

    #[test]
    fn default_axes_give_36_strategies() {
        let strategies = generate_strategies(&StrategyAxes::default()).unwrap();
        assert_eq!(strategies.len(), 36);
        for (i, s) in strategies.iter().enumerate() {
            assert_eq!(s.index, i);
        }
    }

    #[test]
    fn generation_order_is_stable() {
        let axes = StrategyAxes {
            language_sets: vec!["eng".into(), "rus+eng".into()],
            psm_modes: vec![6, 3],
            contrast: vec![
                ContrastSetting { clip_limit: 2.0, tile_grid: 8 },
                ContrastSetting { clip_limit: 3.0, tile_grid: 4 },
            ],
            min_heights: vec![400],
            ..StrategyAxes::default()
        };
        let a = generate_strategies(&axes).unwrap();
        let b = generate_strategies(&axes).unwrap();
        assert_eq!(a, b);

        let order: Vec<(String, u8, f32)> = a
            .iter()
            .map(|s| {
                (
                    s.recognition.language_arg(),
                    s.recognition.psm,
                    s.preprocess.contrast.clip_limit,
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("eng".to_string(), 6, 2.0),
                ("eng".to_string(), 6, 3.0),
                ("eng".to_string(), 3, 2.0),
                ("eng".to_string(), 3, 3.0),
                ("rus+eng".to_string(), 6, 2.0),
                ("rus+eng".to_string(), 6, 3.0),
                ("rus+eng".to_string(), 3, 2.0),
                ("rus+eng".to_string(), 3, 3.0),
            ]
        );
    }

    #[test]
    fn every_strategy_shares_the_upscale_filter() {
        let axes = StrategyAxes {
            upscale_filter: UpscaleFilter::Lanczos,
            ..StrategyAxes::default()
        };
        let strategies = generate_strategies(&axes).unwrap();
        assert_eq!(strategies.len(), 36);
        assert!(strategies
            .iter()
            .all(|s| s.preprocess.upscale_filter == UpscaleFilter::Lanczos));
    }

    #[test]
    fn empty_axis_yields_error() {
        let axes = StrategyAxes {
            psm_modes: vec![],
            ..StrategyAxes::default()
        };
        assert!(matches!(
            generate_strategies(&axes),
            Err(ConfigError::DegenerateStrategies { .. })
        ));
    }

    #[test]
    fn languages_expand_aliases_and_dedupe() {
        assert_eq!(parse_languages("ru+en"), vec!["rus", "eng"]);
        assert_eq!(parse_languages(" eng + eng+deu"), vec!["eng", "deu"]);
        assert!(parse_languages("").is_empty());
    }
}
