//! Runtime configuration.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `AOCR_LIB_FILE` | Explicit library file, loaded in place |
//! | `AOCR_LIB_PATH` | Bundled library (file or directory) staged into a temp dir |
//! | `AOCR_FORCE_WRITE` | `1`/`true` re-stages even when digests match |
//! | `AOCR_TEMP_DIR` | Preferred writable directory for staging and temp inputs |
//! | `AOCR_BACKEND` | `native` (default) or `stub` |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{OcrError, Result};
use crate::props::PropertySet;

pub const ENV_LIB_FILE: &str = "AOCR_LIB_FILE";
pub const ENV_LIB_PATH: &str = "AOCR_LIB_PATH";
pub const ENV_FORCE_WRITE: &str = "AOCR_FORCE_WRITE";
pub const ENV_TEMP_DIR: &str = "AOCR_TEMP_DIR";
pub const ENV_BACKEND: &str = "AOCR_BACKEND";

/// Separator characters of the flat property encoding.
///
/// Neither character may appear inside a key or a value; there is no escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    /// Between `key=value` pairs. Default `|`.
    pub pair: char,
    /// Between a key and its value. Default `=`.
    pub key_value: char,
}

impl Separators {
    pub fn new(pair: char, key_value: char) -> Result<Self> {
        if pair == key_value {
            return Err(OcrError::config(format!(
                "pair and key/value separators must differ (both are {pair:?})"
            )));
        }
        Ok(Self { pair, key_value })
    }

    pub fn pair_str(&self) -> String {
        self.pair.to_string()
    }

    pub fn key_value_str(&self) -> String {
        self.key_value.to_string()
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            pair: '|',
            key_value: '=',
        }
    }
}

/// Which implementation sits behind the native call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The prebuilt engine library, loaded dynamically.
    #[default]
    Native,
    /// In-process echo backend; no recognition happens.
    Stub,
}

impl BackendKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stub" | "echo" => Self::Stub,
            _ => Self::Native,
        }
    }
}

/// Where and how to find the native library.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Load this file directly; disables staging.
    pub lib_file: Option<PathBuf>,
    /// Bundled library to stage. May name the file itself or its directory.
    pub lib_path: Option<PathBuf>,
    /// Re-stage even when the staged copy is identical.
    pub force_write: bool,
    /// Preferred writable directory.
    pub temp_dir: Option<PathBuf>,
    pub backend: BackendKind,
}

impl LoaderConfig {
    pub fn from_env() -> Self {
        Self {
            lib_file: env_path(ENV_LIB_FILE),
            lib_path: env_path(ENV_LIB_PATH),
            force_write: env_flag(ENV_FORCE_WRITE),
            temp_dir: env_path(ENV_TEMP_DIR),
            backend: std::env::var(ENV_BACKEND)
                .map(|v| BackendKind::parse(&v))
                .unwrap_or_default(),
        }
    }
}

/// Per-engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub separators: Separators,
    /// Merged under every request's own properties.
    pub call_defaults: PropertySet,
    /// Reject languages missing from the library's language list before
    /// calling into the native layer. Default: true.
    pub validate_language: bool,
    /// Directory for URL and image inputs. Falls back to the library's
    /// `AOCR_TEMP_DIR`, then to the first writable default.
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            separators: Separators::default(),
            call_defaults: PropertySet::new(),
            validate_language: true,
            temp_dir: None,
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
