use image::{GrayImage, Luma};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{Recognition, Recognizer};
use crate::config::EngineSettings;
use crate::error::RecognitionError;
use crate::strategy::RecognitionParams;

/// White border added around every band (helps Tesseract find text blocks).
const BORDER: u32 = 15;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the `tesseract` executable once per call.
///
/// Each call works in its own temporary directory, so calls are independent
/// and safe to run from many threads.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            tessdata_dir: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tessdata_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        let executable = settings
            .executable
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        let mut engine =
            Self::new(executable).with_timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(dir) = &settings.tessdata_dir {
            engine = engine.with_tessdata_dir(dir);
        }
        engine
    }

    /// `tesseract --version`, to fail fast when the binary is missing.
    pub fn version(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|source| RecognitionError::Spawn {
                program: self.executable.clone(),
                source,
            })?;
        let text = String::from_utf8_lossy(&output.stdout);
        let text = if text.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr)
        } else {
            text
        };
        Ok(text.lines().next().unwrap_or("").trim().to_string())
    }

    /// Run one recognition. stderr goes to a file beside the output, so a
    /// chatty engine never blocks on a full pipe.
    fn run(
        &self,
        input: &Path,
        output_base: &Path,
        params: &RecognitionParams,
    ) -> Result<(), RecognitionError> {
        let stderr_path = output_base.with_extension("stderr");
        let stderr_file = File::create(&stderr_path)?;

        let mut cmd = Command::new(&self.executable);
        cmd.arg(input)
            .arg(output_base)
            .arg("-l")
            .arg(params.language_arg())
            .arg("--psm")
            .arg(params.psm.to_string());
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file));

        let mut child = cmd.spawn().map_err(|source| RecognitionError::Spawn {
            program: self.executable.clone(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognitionError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = fs::read(&stderr_path).unwrap_or_default();
            return Err(RecognitionError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Recognizer for TesseractCli {
    fn name(&self) -> &str {
        "tesseract/cli"
    }

    fn recognize(
        &self,
        image: &GrayImage,
        params: &RecognitionParams,
    ) -> Result<Recognition, RecognitionError> {
        let work = tempfile::tempdir()?;
        let input = work.path().join("band.png");
        pad(image, BORDER).save(&input)?;

        let output_base = work.path().join("out");
        self.run(&input, &output_base, params)?;

        let tsv = fs::read_to_string(output_base.with_extension("tsv"))?;
        let recognition = parse_tsv(&tsv);
        if recognition.text.trim().is_empty() {
            return Err(RecognitionError::NoText);
        }
        Ok(recognition)
    }
}

/// Surround `image` with `pad` px of white.
fn pad(image: &GrayImage, pad: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut padded = GrayImage::from_pixel(w + pad * 2, h + pad * 2, Luma([255u8]));
    image::imageops::overlay(&mut padded, image, pad as i64, pad as i64);
    padded
}

/// Parse Tesseract TSV output.
///
/// Words (level 5) are joined with spaces inside a line and lines with
/// `\n`. The confidence is the mean word confidence scaled to 0.0 – 1.0;
/// words reported with negative confidence are ignored.
pub fn parse_tsv(tsv: &str) -> Recognition {
    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(i32, i32, i32, i32)> = None;
    let mut current: Vec<&str> = Vec::new();
    let mut conf_sum = 0.0f64;
    let mut conf_count = 0usize;

    // Header: level page_num block_num par_num line_num word_num
    //         left top width height conf text
    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let num = |i: usize| fields[i].trim().parse::<i32>().unwrap_or(-1);
        if num(0) != 5 {
            continue;
        }
        let conf: f64 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (num(1), num(2), num(3), num(4));
        if current_key != Some(key) && !current.is_empty() {
            lines.push(current.join(" "));
            current.clear();
        }
        current_key = Some(key);
        current.push(text);
        conf_sum += conf;
        conf_count += 1;
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }

    Recognition {
        text: lines.join("\n"),
        confidence: (conf_count > 0).then(|| conf_sum / conf_count as f64 / 100.0),
    }
}
