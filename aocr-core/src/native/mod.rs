//! The native call boundary.
//!
//! The `NativeBackend` trait mirrors the engine library's primitives one to one:
//! strings and integers in, strings and integers out. Everything above it
//! (validation, encoding, busy enforcement, temp files) lives in this crate;
//! everything below it is opaque.
//!
//! Implementations:
//! - [`DylibBackend`] — the prebuilt engine, loaded via [`loader::load_library`].
//! - [`StubBackend`] — in-process echo, for development and tests.

pub mod loader;
pub mod stub;

#[cfg(feature = "native")]
pub mod dylib;

#[cfg(feature = "native")]
pub use dylib::DylibBackend;
pub use stub::StubBackend;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{BackendKind, EngineConfig, LoaderConfig, Separators};
use crate::engine::OcrEngine;
use crate::error::{OcrError, Result};

/// Opaque native context handle. Only meaningful to the backend that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeContext(pub i64);

/// Arguments of one native recognition call, already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCall<'a> {
    /// Comma-joined absolute file paths.
    pub files: &'a str,
    pub page_index: i32,
    pub start_x: i32,
    pub start_y: i32,
    pub width: i32,
    pub height: i32,
    pub recognize_type: &'a str,
    pub output_format: &'a str,
    pub properties: &'a str,
    pub separators: Separators,
}

/// Contract for engine backends.
///
/// Backends are shared by every engine created from the same library, so they
/// must be `Send + Sync`; per-context state belongs on the native side.
pub trait NativeBackend: Send + Sync + 'static {
    fn version(&self) -> String;

    fn build_info(&self) -> String;

    /// One-time setup. Returns `1` when setup is (or, with `query_only`,
    /// already was) complete; any other value is a failure code.
    fn setup(&self, query_only: bool) -> i32;

    /// Comma-separated language codes, or `None` if the library reports none.
    fn supported_languages(&self) -> Option<String>;

    /// Create a native context.
    ///
    /// # Errors
    /// The native diagnostic string, verbatim.
    fn start(
        &self,
        lang: &str,
        speed: &str,
        properties: &str,
        separators: Separators,
    ) -> std::result::Result<NativeContext, String>;

    /// Run one recognition on a started context.
    ///
    /// # Errors
    /// The native error string, verbatim.
    fn recognize(
        &self,
        ctx: NativeContext,
        call: &NativeCall<'_>,
    ) -> std::result::Result<Option<String>, String>;

    /// Release a native context. Called at most once per context.
    fn stop(&self, ctx: NativeContext);
}

/// Entry point: a loaded backend plus library-level queries.
///
/// Cheap to clone; every engine holds one.
#[derive(Clone)]
pub struct OcrLibrary {
    backend: Arc<dyn NativeBackend>,
    /// Preferred directory for per-call temp inputs.
    temp_dir: Option<PathBuf>,
}

impl OcrLibrary {
    /// Wrap any backend.
    pub fn new<B: NativeBackend>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn NativeBackend>) -> Self {
        Self {
            backend,
            temp_dir: None,
        }
    }

    /// Use `dir` for URL and image inputs of engines that do not set their own.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Load the backend selected by `config`.
    ///
    /// The native library is loaded at most once per process; later calls
    /// reuse it.
    ///
    /// # Errors
    /// `OcrError::NativeLoadFailure` when the native library can not be loaded.
    pub fn load(config: &LoaderConfig) -> Result<Self> {
        let backend: Arc<dyn NativeBackend> = match config.backend {
            BackendKind::Stub => {
                info!("using stub OCR backend");
                Arc::new(StubBackend::new())
            }
            BackendKind::Native => loader::load_library(config)?,
        };
        Ok(Self {
            backend,
            temp_dir: config.temp_dir.clone(),
        })
    }

    /// [`load`](Self::load) with [`LoaderConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::load(&LoaderConfig::from_env())
    }

    pub fn version(&self) -> String {
        self.backend.version()
    }

    /// Version plus build information.
    pub fn version_verbose(&self) -> String {
        format!("{}\n{}", self.backend.version(), self.backend.build_info())
    }

    pub fn is_setup_required(&self) -> bool {
        self.backend.setup(true) != 1
    }

    /// Perform one-time setup; a no-op when already done.
    ///
    /// # Errors
    /// `OcrError::Setup` with the native code.
    pub fn setup(&self) -> Result<()> {
        match self.backend.setup(false) {
            1 => Ok(()),
            code => Err(OcrError::Setup { code }),
        }
    }

    /// Supported language codes, sorted and free of duplicates.
    pub fn supported_languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self
            .backend
            .supported_languages()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// Create a stopped engine bound to this library.
    pub fn new_engine(&self, config: EngineConfig) -> OcrEngine {
        OcrEngine::new(self.clone(), config)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for OcrLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrLibrary").finish_non_exhaustive()
    }
}
