//! `aocr` — recognise one file from the command line.
//!
//! ```text
//! aocr INPUT_FILE [text|xml|pdf] [all|text|barcode] [langcode]
//! ```

mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use aocr_core::native::loader::PlatformInfo;
use aocr_core::{
    EngineConfig, OcrLibrary, OutputFormat, PropertyBuilder, PropertySpec, RecognitionRequest,
    RecognizeType, Speed,
};
use tracing::{debug, info};

const USAGE: &str = "Usage: aocr INPUT_FILE [text|xml|pdf] [all|text|barcode] [langcode]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aocr=info,aocr_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("aocr: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let settings_file = settings::settings_path();
    let settings = settings::load_settings(&settings_file);
    debug!(path = ?settings_file, ?settings, "loaded settings");
    settings::apply_runtime_env_from_settings(&settings);

    let args: Vec<String> = std::env::args().skip(1).collect();

    println!("aocr {} - OCR engine binding", env!("CARGO_PKG_VERSION"));
    let library = OcrLibrary::from_env().context("loading the OCR engine library")?;
    println!("Library version: {}", library.version());
    println!("{}", PlatformInfo::current());

    library.setup().context("one-time engine setup")?;
    let languages = library.supported_languages();
    println!("Supported languages: {}", languages.join(", "));

    let Some(input) = args.first().map(PathBuf::from) else {
        println!("{USAGE}");
        return Ok(());
    };

    let format = match args.get(1).map(String::as_str) {
        None => OutputFormat::Text,
        Some(raw) => match raw.parse::<OutputFormat>() {
            Ok(f @ (OutputFormat::Text | OutputFormat::Xml | OutputFormat::Pdf)) => f,
            _ => {
                println!("Unsupported output format {raw:?}, using text");
                OutputFormat::Text
            }
        },
    };
    let recognize_type = match args.get(2) {
        None => RecognizeType::All,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            println!("Unsupported recognize type {raw:?}, using all");
            RecognizeType::All
        }),
    };
    let lang = args
        .get(3)
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| settings.language.clone());
    if !languages.is_empty() && !languages.contains(&lang) {
        bail!(
            "language {lang:?} is not supported; choose one of: {}",
            languages.join(", ")
        );
    }
    let speed: Speed = settings.speed.parse()?;

    let engine = library.new_engine(EngineConfig::default());
    engine
        .start(&lang, speed, PropertySpec::None)
        .with_context(|| format!("starting engine ({lang}, {speed})"))?;

    let mut request = RecognitionRequest::file(&input)
        .recognize_type(recognize_type)
        .output_format(format);
    if format == OutputFormat::Pdf {
        let pdf = pdf_output_path(&input, settings.output_dir.as_deref());
        request = request.properties(
            PropertyBuilder::new()
                .pdf_output_file(&pdf)
                .pdf_text_visible(settings.pdf_text_visible),
        );
    }

    let started = Instant::now();
    let result = engine
        .recognize(&request)
        .with_context(|| format!("recognising {}", input.display()))?;
    let elapsed = started.elapsed();

    match &result.document {
        Some(document) => println!("PDF file: {}", document.display()),
        None => println!("Result:\n{}", result.text()),
    }
    println!("Time taken: {} ms", elapsed.as_millis());
    info!(elapsed_ms = elapsed.as_millis() as u64, %format, "recognition finished");

    engine.stop();
    Ok(())
}

/// `output-<input name>-<millis>.pdf` in `dir` (or the current directory).
fn pdf_output_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".into());
    let file = format!(
        "output-{name}-{}.pdf",
        chrono::Local::now().timestamp_millis()
    );
    match dir {
        Some(dir) => dir.join(file),
        None => PathBuf::from(file),
    }
}
