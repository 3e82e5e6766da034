use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::strategy::parse_languages;

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "VOCR_";

pub const MIN_CLIP_LIMIT: f32 = 1.0;
pub const MAX_CLIP_LIMIT: f32 = 4.0;
pub const MAX_TILE_GRID: u32 = 64;
pub const MAX_MIN_HEIGHT: u32 = 10_000;
pub const MAX_PSM: u8 = 13;
pub const MAX_BODY_LENGTH: usize = 32;

/// The three fields read from a registration certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    RegNumber,
    Vin,
    BodyNumber,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::RegNumber, Field::Vin, Field::BodyNumber];

    pub fn name(self) -> &'static str {
        match self {
            Field::RegNumber => "reg_number",
            Field::Vin => "vin",
            Field::BodyNumber => "body_number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A horizontal band of the document, as fractions of its height.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegionBounds {
    pub start: f64,
    pub end: f64,
}

impl RegionBounds {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn validate(&self, field: Field) -> Result<(), ConfigError> {
        let fail = |message: String| ConfigError::InvalidRegion {
            field: field.name(),
            message,
        };
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(fail("fractions must be finite".into()));
        }
        if self.start < 0.0 || self.end > 1.0 {
            return Err(fail(format!(
                "{}..{} leaves the [0, 1] range",
                self.start, self.end
            )));
        }
        if self.start >= self.end {
            return Err(fail(format!(
                "start {} must be below end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegionSettings {
    pub reg_number: RegionBounds,
    pub vin: RegionBounds,
    pub body_number: RegionBounds,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            reg_number: RegionBounds::new(0.15, 0.30),
            vin: RegionBounds::new(0.25, 0.60),
            body_number: RegionBounds::new(0.52, 0.68),
        }
    }
}

impl RegionSettings {
    pub fn get(&self, field: Field) -> RegionBounds {
        match field {
            Field::RegNumber => self.reg_number,
            Field::Vin => self.vin,
            Field::BodyNumber => self.body_number,
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut RegionBounds {
        match field {
            Field::RegNumber => &mut self.reg_number,
            Field::Vin => &mut self.vin,
            Field::BodyNumber => &mut self.body_number,
        }
    }
}

/// Contrast-limited equalisation parameters for one preprocessing variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ContrastSetting {
    /// Histogram clip limit; higher values amplify local contrast more.
    pub clip_limit: f32,
    /// Number of tiles along each axis.
    #[serde(default = "default_tile_grid")]
    pub tile_grid: u32,
}

fn default_tile_grid() -> u32 {
    8
}

impl fmt::Display for ContrastSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x{}", self.clip_limit, self.tile_grid)
    }
}

impl FromStr for ContrastSetting {
    type Err = String;

    /// Accepts `"2.0x8"` or a bare clip limit such as `"2.0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (clip, tile) = match s.split_once(['x', 'X']) {
            Some((clip, tile)) => (clip, Some(tile)),
            None => (s, None),
        };
        let clip_limit = clip
            .trim()
            .parse::<f32>()
            .map_err(|e| format!("bad clip limit {clip:?}: {e}"))?;
        let tile_grid = match tile {
            Some(t) => t
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("bad tile grid {t:?}: {e}"))?,
            None => default_tile_grid(),
        };
        Ok(Self {
            clip_limit,
            tile_grid,
        })
    }
}

/// Interpolation used when a band is upscaled to its minimum height.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpscaleFilter {
    /// Bilinear.
    Linear,
    /// Catmull-Rom bicubic.
    #[default]
    Cubic,
    /// Lanczos with a 3-lobe window.
    Lanczos,
}

impl UpscaleFilter {
    pub fn name(self) -> &'static str {
        match self {
            UpscaleFilter::Linear => "linear",
            UpscaleFilter::Cubic => "cubic",
            UpscaleFilter::Lanczos => "lanczos",
        }
    }
}

impl fmt::Display for UpscaleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UpscaleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "triangle" => Ok(UpscaleFilter::Linear),
            "cubic" | "catmullrom" => Ok(UpscaleFilter::Cubic),
            "lanczos" | "lanczos3" => Ok(UpscaleFilter::Lanczos),
            other => Err(format!(
                "unknown upscale method {other:?} (expected linear, cubic or lanczos)"
            )),
        }
    }
}

/// Values along each strategy axis. The generator takes their cross-product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyAxes {
    /// `+`-joined Tesseract language sets, e.g. `"rus+eng"`.
    pub language_sets: Vec<String>,
    /// Tesseract page-segmentation modes.
    pub psm_modes: Vec<u8>,
    pub contrast: Vec<ContrastSetting>,
    /// Bands shorter than this are upscaled to it before recognition.
    pub min_heights: Vec<u32>,
    /// Shared by every strategy; not an axis.
    pub upscale_filter: UpscaleFilter,
}

impl Default for StrategyAxes {
    fn default() -> Self {
        Self {
            language_sets: vec!["eng".to_string()],
            psm_modes: vec![3, 6, 11],
            contrast: vec![
                ContrastSetting { clip_limit: 2.0, tile_grid: 8 },
                ContrastSetting { clip_limit: 3.0, tile_grid: 8 },
                ContrastSetting { clip_limit: 2.0, tile_grid: 4 },
                ContrastSetting { clip_limit: 1.5, tile_grid: 16 },
            ],
            min_heights: vec![400, 600, 800],
            upscale_filter: UpscaleFilter::Cubic,
        }
    }
}

impl StrategyAxes {
    pub fn recognition_variants(&self) -> usize {
        self.language_sets.len() * self.psm_modes.len()
    }

    pub fn preprocessing_variants(&self) -> usize {
        self.contrast.len() * self.min_heights.len()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        non_empty("language_sets", &self.language_sets)?;
        non_empty("psm_modes", &self.psm_modes)?;
        non_empty("contrast", &self.contrast)?;
        non_empty("min_heights", &self.min_heights)?;

        // Aliases collapse: "en" and "eng" are the same set.
        let expanded: Vec<Vec<String>> = self
            .language_sets
            .iter()
            .map(|set| parse_languages(set))
            .collect();
        no_duplicates("language_sets", &expanded)?;
        no_duplicates("psm_modes", &self.psm_modes)?;
        no_duplicates("contrast", &self.contrast)?;
        no_duplicates("min_heights", &self.min_heights)?;

        for langs in &self.language_sets {
            if langs.split('+').any(|code| code.trim().is_empty()) {
                return Err(ConfigError::invalid_value(
                    "strategy.language_sets",
                    format!("{langs:?} contains an empty language code"),
                ));
            }
        }
        for &psm in &self.psm_modes {
            check_range("psm_mode", psm as f64, 0.0, MAX_PSM as f64)?;
        }
        for c in &self.contrast {
            check_range(
                "clip_limit",
                c.clip_limit as f64,
                MIN_CLIP_LIMIT as f64,
                MAX_CLIP_LIMIT as f64,
            )?;
            check_range("tile_grid", c.tile_grid as f64, 1.0, MAX_TILE_GRID as f64)?;
        }
        for &h in &self.min_heights {
            check_range("min_height", h as f64, 0.0, MAX_MIN_HEIGHT as f64)?;
        }

        // A single variant on either side leaves nothing to vote with.
        if self.recognition_variants() < 2 {
            return Err(ConfigError::DegenerateStrategies {
                message: format!(
                    "{} recognition variant(s); at least 2 language-set/PSM combinations are required",
                    self.recognition_variants()
                ),
            });
        }
        if self.preprocessing_variants() < 2 {
            return Err(ConfigError::DegenerateStrategies {
                message: format!(
                    "{} preprocessing variant(s); at least 2 contrast/min-height combinations are required",
                    self.preprocessing_variants()
                ),
            });
        }
        Ok(())
    }
}

/// Plausible body/chassis number lengths after cleaning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LengthBounds {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for LengthBounds {
    fn default() -> Self {
        Self {
            min_length: 7,
            max_length: 17,
        }
    }
}

impl LengthBounds {
    pub fn contains(&self, len: usize) -> bool {
        (self.min_length..=self.max_length).contains(&len)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Run the `tesseract` executable once per strategy.
    #[default]
    Cli,
    /// Call libtesseract in-process (`native-tesseract` feature).
    Native,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cli" => Ok(EngineKind::Cli),
            "native" => Ok(EngineKind::Native),
            other => Err(format!("unknown engine {other:?} (expected cli or native)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub kind: EngineKind,
    /// Path to the `tesseract` executable. `None` → look it up on `PATH`.
    pub executable: Option<PathBuf>,
    /// Directory holding `*.traineddata`. `None` → engine default.
    pub tessdata_dir: Option<PathBuf>,
    /// Wall-clock limit for one engine call.
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            kind: EngineKind::Cli,
            executable: None,
            tessdata_dir: None,
            timeout_secs: 30,
        }
    }
}

/// Complete configuration, fixed once at startup.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub regions: RegionSettings,
    pub strategy: StrategyAxes,
    pub body_number: LengthBounds,
    /// Copy the VIN into an empty body number (they usually coincide).
    pub body_falls_back_to_vin: bool,
    /// Worker threads for the strategy fan-out; 0 = one per CPU.
    pub workers: usize,
    pub engine: EngineSettings,
}

impl Settings {
    /// Read settings from a JSON file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `VOCR_*` overrides fetched through `lookup`.
    ///
    /// `lookup` receives the full variable name; pass `|k| std::env::var(k).ok()`
    /// to read the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            lookup(&key).map(|v| (key, v))
        };

        for field in Field::ALL {
            let upper = field.name().to_ascii_uppercase();
            if let Some((key, v)) = get(&format!("{upper}_REGION_START")) {
                self.regions.get_mut(field).start = parse_scalar(&key, &v)?;
            }
            if let Some((key, v)) = get(&format!("{upper}_REGION_END")) {
                self.regions.get_mut(field).end = parse_scalar(&key, &v)?;
            }
        }

        if let Some((key, v)) = get("LANGUAGE_SETS") {
            self.strategy.language_sets = parse_list(&key, &v)?;
        }
        if let Some((key, v)) = get("PSM_MODES") {
            self.strategy.psm_modes = parse_list(&key, &v)?;
        }
        if let Some((key, v)) = get("CONTRAST") {
            self.strategy.contrast = parse_list(&key, &v)?;
        }
        if let Some((key, v)) = get("MIN_HEIGHTS") {
            self.strategy.min_heights = parse_list(&key, &v)?;
        }
        if let Some((key, v)) = get("UPSCALE_METHOD") {
            self.strategy.upscale_filter = parse_scalar(&key, &v)?;
        }
        if let Some((key, v)) = get("BODY_NUMBER_MIN_LENGTH") {
            self.body_number.min_length = parse_scalar(&key, &v)?;
        }
        if let Some((key, v)) = get("BODY_NUMBER_MAX_LENGTH") {
            self.body_number.max_length = parse_scalar(&key, &v)?;
        }
        if let Some((key, v)) = get("BODY_FALLS_BACK_TO_VIN") {
            self.body_falls_back_to_vin = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("WORKERS") {
            self.workers = parse_scalar(&key, &v)?;
        }
        if let Some((key, v)) = get("ENGINE") {
            self.engine.kind = parse_scalar(&key, &v)?;
        }
        if let Some((_, v)) = get("TESSERACT_PATH") {
            self.engine.executable = Some(PathBuf::from(v));
        }
        if let Some((_, v)) = get("TESSDATA_DIR") {
            self.engine.tessdata_dir = Some(PathBuf::from(v));
        }
        if let Some((key, v)) = get("ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = parse_scalar(&key, &v)?;
        }
        Ok(())
    }

    /// Check every value eagerly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for field in Field::ALL {
            self.regions.get(field).validate(field)?;
        }
        self.strategy.validate()?;

        let body = &self.body_number;
        check_range(
            "body_number.min_length",
            body.min_length as f64,
            1.0,
            MAX_BODY_LENGTH as f64,
        )?;
        check_range(
            "body_number.max_length",
            body.max_length as f64,
            body.min_length as f64,
            MAX_BODY_LENGTH as f64,
        )?;

        if self.engine.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "engine.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn non_empty<T>(axis: &'static str, values: &[T]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::EmptyAxis { axis });
    }
    Ok(())
}

fn no_duplicates<T: PartialEq + fmt::Debug>(
    axis: &'static str,
    values: &[T],
) -> Result<(), ConfigError> {
    for (i, v) in values.iter().enumerate() {
        if values[..i].contains(v) {
            return Err(ConfigError::DuplicateAxisValue {
                axis,
                value: format!("{v:?}"),
            });
        }
    }
    Ok(())
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn parse_scalar<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid_value(key, format!("{raw:?}: {e}")))
}

fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_scalar(key, item))
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, format!("{raw:?} is not a boolean"))),
    }
}
