use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vehicle_ocr::config::{EngineKind, Field, Settings};
use vehicle_ocr::ocr::tesseract::TesseractCli;
use vehicle_ocr::ocr::Recognizer;
use vehicle_ocr::report::collect_images;
use vehicle_ocr::{BatchResult, DocumentParser};

#[derive(Parser, Debug)]
#[command(name = "vehicle-ocr")]
#[command(version, about = "Plate, VIN and body number extraction from vehicle registration certificates", long_about = None)]
struct Cli {
    /// Directory with certificate images
    #[arg(short, long, default_value = "data/input")]
    input: PathBuf,

    /// Results file (JSON)
    #[arg(short, long, default_value = "data/output/results.json")]
    output: PathBuf,

    /// Settings file (JSON); absent keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tesseract language sets, comma-separated (e.g. "eng,rus+eng")
    #[arg(long, value_delimiter = ',')]
    lang: Vec<String>,

    /// Worker threads (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Path to the tesseract executable
    #[arg(long)]
    tesseract: Option<PathBuf>,

    /// Tesseract data directory
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// File, then `VOCR_*` environment, then command-line flags.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings
        .apply_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;

    if !cli.lang.is_empty() {
        settings.strategy.language_sets = cli.lang.clone();
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(path) = &cli.tesseract {
        settings.engine.executable = Some(path.clone());
    }
    if let Some(dir) = &cli.tessdata {
        settings.engine.tessdata_dir = Some(dir.clone());
    }
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

fn build_engine(settings: &Settings) -> Result<Box<dyn Recognizer>> {
    match settings.engine.kind {
        EngineKind::Cli => {
            let engine = TesseractCli::from_settings(&settings.engine);
            let version = engine
                .version()
                .context("tesseract is not available; install it or pass --tesseract")?;
            tracing::info!(%version, "using tesseract executable");
            Ok(Box::new(engine))
        }
        #[cfg(feature = "native-tesseract")]
        EngineKind::Native => Ok(Box::new(
            vehicle_ocr::ocr::native::NativeTesseract::from_settings(&settings.engine),
        )),
        #[cfg(not(feature = "native-tesseract"))]
        EngineKind::Native => {
            bail!("engine `native` requires building with --features native-tesseract")
        }
    }
}

fn print_document_blocks(batch: &BatchResult) {
    for doc in &batch.documents {
        println!("\n[*] {}", doc.file);
        if let Some(error) = &doc.error {
            println!("    [!] {error}");
            continue;
        }
        for field in Field::ALL {
            let result = doc.field(field);
            match &result.value {
                Some(value) => println!("    {:<12} {value}  ({} votes)", field.name(), result.votes),
                None => println!("    {:<12} -", field.name()),
            }
        }
    }
}

fn print_summary(batch: &BatchResult, output: &Path) {
    let total = batch.total_processed();
    println!("\n[*] Summary ({total} document(s))");
    for (label, field) in [
        ("Plates", Field::RegNumber),
        ("VINs", Field::Vin),
        ("Body numbers", Field::BodyNumber),
    ] {
        println!("    {label:<13} {}/{total}", batch.statistics.found(field));
    }
    println!("\n[✓] Results saved to: {}", output.display());
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let settings = load_settings(&cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    if !cli.input.is_dir() {
        bail!("input directory does not exist: {}", cli.input.display());
    }

    let engine = build_engine(&settings)?;
    let parser = DocumentParser::new(settings, engine).context("invalid settings")?;

    let images = collect_images(&cli.input)?;
    if images.is_empty() {
        tracing::warn!(dir = %cli.input.display(), "no images found");
    }
    if !cli.quiet {
        println!(
            "[*] Processing {} image(s) from {} with {} strategies",
            images.len(),
            cli.input.display(),
            parser.strategies().len()
        );
    }

    let batch = parser.parse_paths(&images);
    batch
        .write_json(&cli.output)
        .with_context(|| format!("failed to write results to {}", cli.output.display()))?;

    if !cli.quiet {
        print_document_blocks(&batch);
        print_summary(&batch, &cli.output);
    }
    Ok(())
}
