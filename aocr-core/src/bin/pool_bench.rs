use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use aocr_core::{
    LoaderConfig, OcrLibrary, OcrWorkerPool, PoolConfig, PoolSnapshot, RecognitionRequest, Speed,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "pdf"];

#[derive(Debug)]
struct Args {
    input: PathBuf,
    threads: Option<usize>,
    lang: String,
    speed: Speed,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct CaseResult {
    file: String,
    latency_ms: f64,
    text_len: usize,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    input_dir: String,
    library_version: String,
    files: usize,
    threads: usize,
    lang: String,
    wall_time_ms: f64,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
    avg_latency_ms: f64,
    failures: usize,
    pool: PoolSnapshot,
    cases: Vec<CaseResult>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("aocr=info,aocr_core=info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("pool_bench failed: {e:#}");
        std::process::exit(1);
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut threads: Option<usize> = None;
    let mut lang = "eng".to_string();
    let mut speed = Speed::Fastest;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--input" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --input");
                };
                input = Some(PathBuf::from(v));
            }
            "--threads" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --threads");
                };
                let n = v
                    .parse::<usize>()
                    .with_context(|| format!("invalid value for --threads: {v}"))?;
                threads = Some(n.clamp(1, 256));
            }
            "--lang" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --lang");
                };
                lang = v;
            }
            "--speed" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --speed");
                };
                speed = v.parse()?;
            }
            "--output" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --output");
                };
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: pool_bench --input <dir> [--threads <n>] [--lang <code>] \
                     [--speed fastest|fast|slow] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    let Some(input) = input else {
        bail!("--input <dir> is required");
    };
    Ok(Args {
        input,
        threads,
        lang,
        speed,
        output,
    })
}

fn collect_inputs(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_inputs(&path, out)?;
            continue;
        }
        let is_input = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        // Engine inputs are comma-joined; such paths can not be passed through.
        if is_input && !path.to_string_lossy().contains(',') {
            out.push(path);
        }
    }
    Ok(())
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    if !args.input.is_dir() {
        bail!("input directory not found: {}", args.input.display());
    }

    let mut files = Vec::new();
    collect_inputs(&args.input, &mut files)?;
    files.sort();
    if files.is_empty() {
        bail!("no image or PDF files found in {}", args.input.display());
    }

    let library =
        OcrLibrary::load(&LoaderConfig::from_env()).context("loading the OCR library")?;
    let mut config = PoolConfig {
        lang: args.lang.clone(),
        speed: args.speed,
        ..PoolConfig::default()
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    let threads = config.threads;
    let library_version = library.version();
    let pool = OcrWorkerPool::new(library, config)?;

    println!(
        "Running aocr pool benchmark on {} files (threads={threads}, lang={})",
        files.len(),
        args.lang
    );

    let started = Instant::now();
    let handles: Vec<_> = files
        .iter()
        .map(|path| {
            let request = RecognitionRequest::file(path);
            pool.execute(move |engine| {
                let t0 = Instant::now();
                let result = engine.recognize(&request);
                Ok((t0.elapsed().as_secs_f64() * 1000.0, result))
            })
        })
        .collect();

    let mut cases = Vec::with_capacity(files.len());
    for (path, handle) in files.iter().zip(handles) {
        let file = path
            .strip_prefix(&args.input)
            .unwrap_or(path)
            .display()
            .to_string();
        let case = match handle.wait() {
            Ok((latency_ms, Ok(result))) => CaseResult {
                file,
                latency_ms,
                text_len: result.text().len(),
                error: None,
            },
            Ok((latency_ms, Err(e))) => CaseResult {
                file,
                latency_ms,
                text_len: 0,
                error: Some(e.to_string()),
            },
            Err(e) => CaseResult {
                file,
                latency_ms: 0.0,
                text_len: 0,
                error: Some(e.to_string()),
            },
        };
        println!(
            "{} {:.1} ms{}",
            case.file,
            case.latency_ms,
            if case.error.is_some() { " (failed)" } else { "" }
        );
        cases.push(case);
    }
    let wall_time_ms = started.elapsed().as_secs_f64() * 1000.0;

    pool.shutdown();

    let latencies: Vec<f64> = cases
        .iter()
        .filter(|c| c.error.is_none())
        .map(|c| c.latency_ms)
        .collect();
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let summary = Summary {
        input_dir: args.input.display().to_string(),
        library_version,
        files: cases.len(),
        threads,
        lang: args.lang.clone(),
        wall_time_ms,
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
        avg_latency_ms,
        failures: cases.iter().filter(|c| c.error.is_some()).count(),
        pool: pool.diagnostics(),
        cases,
    };

    let json = serde_json::to_string_pretty(&summary)?;
    if let Some(path) = &args.output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
        println!("Benchmark summary written to {}", path.display());
    }
    println!("{json}");
    Ok(())
}
