//! Native library loader.
//!
//! ## Resolution order
//!
//! ```text
//! AOCR_LIB_FILE set?  ── yes ──► load that file in place
//!        │ no
//!        ▼
//! first existing of: AOCR_LIB_PATH (file, or dir/<name>), <exe dir>/<name>, <cwd>/<name>
//!        │
//!        ▼
//! stage into first writable of: AOCR_TEMP_DIR, OS temp dir, cwd
//! (skipped when the staged copy has the same SHA-256, unless AOCR_FORCE_WRITE)
//!        │
//!        ▼
//! load staged copy
//! ```
//!
//! The load happens at most once per process. A successful load is cached in a
//! `OnceLock`; failed loads are not cached, so a corrected environment can be
//! retried, but no engine can start until one succeeds.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::NativeBackend;
use crate::config::LoaderConfig;
use crate::error::{OcrError, Result};

static LOADED: OnceLock<Arc<dyn NativeBackend>> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// Host platform as seen by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub pointer_width: u32,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            pointer_width: if cfg!(target_pointer_width = "64") { 64 } else { 32 },
        }
    }

    pub fn is_64bit(&self) -> bool {
        self.pointer_width == 64
    }
}

impl std::fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OS: {} {} ({}bit)", self.os, self.arch, self.pointer_width)
    }
}

/// File name of the engine library for `platform`.
///
/// # Errors
/// A message when the platform has no build (32-bit macOS).
pub fn library_file_name(platform: &PlatformInfo) -> std::result::Result<&'static str, String> {
    match (platform.os, platform.is_64bit()) {
        ("windows", true) => Ok("aocr_x64.dll"),
        ("windows", false) => Ok("aocr.dll"),
        ("macos", true) => Ok("libaocr_x64.dylib"),
        ("macos", false) => {
            Err("the engine is only available for 64-bit processes on macOS".into())
        }
        (_, true) => Ok("libaocr_x64.so"),
        (_, false) => Ok("libaocr.so"),
    }
}

/// True once a native library has been loaded in this process.
pub fn is_loaded() -> bool {
    LOADED.get().is_some()
}

/// Load the engine library once per process.
///
/// # Errors
/// `OcrError::NativeLoadFailure` with diagnostics (platform, paths tried,
/// library search variables, dependency listing when available).
pub fn load_library(config: &LoaderConfig) -> Result<Arc<dyn NativeBackend>> {
    if let Some(backend) = LOADED.get() {
        debug!("native library already loaded");
        return Ok(Arc::clone(backend));
    }

    let _guard = LOAD_LOCK.lock();
    if let Some(backend) = LOADED.get() {
        debug!("native library loaded by another thread");
        return Ok(Arc::clone(backend));
    }

    let backend = load_uncached(config)?;
    let _ = LOADED.set(Arc::clone(&backend));
    Ok(backend)
}

fn load_uncached(config: &LoaderConfig) -> Result<Arc<dyn NativeBackend>> {
    let platform = PlatformInfo::current();
    let file_name = library_file_name(&platform)
        .map_err(|message| load_failure(message, &platform, &[], None))?;

    let (lib_path, tried) = match &config.lib_file {
        Some(explicit) => {
            info!(path = ?explicit, "loading native library from explicit file");
            (explicit.clone(), vec![explicit.clone()])
        }
        None => {
            let candidates = source_candidates(config, file_name);
            let Some(source) = candidates.iter().find(|p| p.is_file()).cloned() else {
                return Err(load_failure(
                    format!("{file_name} not found"),
                    &platform,
                    &candidates,
                    None,
                ));
            };
            let dir = writable_dir(config).ok_or_else(|| {
                load_failure(
                    "no writable directory to stage the library into".into(),
                    &platform,
                    &candidates,
                    None,
                )
            })?;
            let staged = stage_library(&source, &dir, config.force_write).map_err(|e| {
                load_failure(
                    format!("failed to stage {}: {e}", source.display()),
                    &platform,
                    &candidates,
                    None,
                )
            })?;
            (staged, candidates)
        }
    };

    open_backend(&lib_path).map_err(|message| {
        load_failure(message, &platform, &tried, Some(&lib_path))
    })
}

#[cfg(feature = "native")]
fn open_backend(path: &Path) -> std::result::Result<Arc<dyn NativeBackend>, String> {
    let backend = super::DylibBackend::open(path).map_err(|e| e.to_string())?;
    info!(path = ?path, version = %backend.version(), "native library loaded");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "native"))]
fn open_backend(path: &Path) -> std::result::Result<Arc<dyn NativeBackend>, String> {
    Err(format!(
        "aocr-core was built without the `native` feature; can not load {}",
        path.display()
    ))
}

/// Where a bundled library may live, in lookup order.
fn source_candidates(config: &LoaderConfig, file_name: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(p) = &config.lib_path {
        if p.is_dir() {
            out.push(p.join(file_name));
        } else {
            out.push(p.clone());
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        out.push(dir.join(file_name));
    }
    if let Ok(cwd) = std::env::current_dir() {
        out.push(cwd.join(file_name));
    }
    out
}

/// First directory we can actually create a file in.
pub fn writable_dir(config: &LoaderConfig) -> Option<PathBuf> {
    writable_dir_preferring(config.temp_dir.as_deref())
}

/// [`writable_dir`] with an explicit preferred directory.
pub fn writable_dir_preferring(preferred: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = preferred {
        candidates.push(dir.to_path_buf());
    }
    candidates.push(std::env::temp_dir());
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    candidates.into_iter().find(|dir| {
        let _ = std::fs::create_dir_all(dir);
        match tempfile::tempfile_in(dir) {
            Ok(_) => true,
            Err(e) => {
                debug!(dir = ?dir, error = %e, "directory not writable");
                false
            }
        }
    })
}

/// Copy `source` into `dir`, skipping the write when an identical copy exists.
pub fn stage_library(source: &Path, dir: &Path, force_write: bool) -> io::Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "library path has no file name")
        })?;
    let target = dir.join(name);

    if !force_write && target.is_file() {
        match (file_digest(&target), file_digest(source)) {
            (Ok(existing), Ok(bundled)) if existing == bundled => {
                debug!(target = ?target, "staged library is current; skipping write");
                return Ok(target);
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(
                    target = ?target,
                    error = %e,
                    "could not compare library digests; re-staging"
                );
            }
            _ => {}
        }
    }

    let mut staging = tempfile::NamedTempFile::new_in(dir)?;
    io::copy(&mut File::open(source)?, &mut staging)?;
    staging.persist(&target).map_err(|e| e.error)?;
    info!(source = ?source, target = ?target, "staged native library");
    Ok(target)
}

/// Hex SHA-256 of a file.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn load_failure(
    message: String,
    platform: &PlatformInfo,
    tried: &[PathBuf],
    lib: Option<&Path>,
) -> OcrError {
    let diagnostics = load_diagnostics(platform, tried, lib);
    warn!(%message, "native library load failed");
    OcrError::NativeLoadFailure {
        message,
        diagnostics,
    }
}

/// Human-readable context for a failed load.
pub fn load_diagnostics(platform: &PlatformInfo, tried: &[PathBuf], lib: Option<&Path>) -> String {
    let mut out = String::new();
    out.push_str(&platform.to_string());
    out.push('\n');

    if tried.is_empty() {
        out.push_str("Paths tried: (none)\n");
    } else {
        out.push_str("Paths tried:\n");
        for p in tried {
            let state = if p.is_file() { "exists" } else { "missing" };
            out.push_str(&format!("  {} [{state}]\n", p.display()));
        }
    }

    for var in ["LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH", "PATH"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                out.push_str(&format!("{var}={value}\n"));
            }
        }
    }

    if let Some(deps) = lib.filter(|p| p.is_file()).and_then(dependency_listing) {
        out.push_str("Dependency information:\n");
        out.push_str(&deps);
    }
    out
}

/// `ldd` / `otool -L` output for the library, if the tool is available.
fn dependency_listing(lib: &Path) -> Option<String> {
    let (tool, args): (&str, &[&str]) = match std::env::consts::OS {
        "windows" => return None,
        "macos" => ("otool", &["-L"]),
        _ => ("ldd", &[]),
    };
    let output = std::process::Command::new(tool)
        .args(args)
        .arg(lib)
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    (!text.trim().is_empty()).then_some(text)
}
