//! Turns a request [`Source`] into the comma-joined path list the engine reads.
//!
//! URL and in-memory image sources are written to `NamedTempFile`s owned by
//! [`Materialized`]; dropping it deletes them, whatever the call's outcome.
//! They go to the preferred directory when it is writable, else to the first
//! writable default of [`loader::writable_dir_preferring`].

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::request::Source;
use crate::error::{OcrError, Result};
use crate::native::loader;

/// Paths ready for the native call, plus the temp files backing them.
#[derive(Debug)]
pub(crate) struct Materialized {
    pub files: String,
    temps: Vec<NamedTempFile>,
}

impl Materialized {
    #[cfg(test)]
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        self.temps.iter().map(|t| t.path().to_path_buf()).collect()
    }
}

impl Drop for Materialized {
    fn drop(&mut self) {
        for temp in self.temps.drain(..) {
            let path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                warn!(path = ?path, error = %e, "failed to remove temporary input");
            }
        }
    }
}

pub(crate) fn materialize(source: &Source, preferred_dir: Option<&Path>) -> Result<Materialized> {
    let mut temps = Vec::new();
    let paths = match source {
        Source::Files(paths) => paths.clone(),
        Source::Urls(urls) => {
            let dir = temp_dir(preferred_dir)?;
            let mut out = Vec::with_capacity(urls.len());
            for url in urls {
                let temp = download(url, &dir)?;
                out.push(temp.path().to_path_buf());
                temps.push(temp);
            }
            out
        }
        Source::Image(image) => {
            let temp = write_png(image, &temp_dir(preferred_dir)?)?;
            let path = temp.path().to_path_buf();
            temps.push(temp);
            vec![path]
        }
    };

    let files = join_paths(&paths)?;
    Ok(Materialized { files, temps })
}

fn temp_dir(preferred: Option<&Path>) -> Result<PathBuf> {
    loader::writable_dir_preferring(preferred).ok_or_else(|| {
        OcrError::Io(std::io::Error::other("no writable directory for temporary inputs"))
    })
}

/// Absolute, comma-joined list of the paths that exist.
///
/// # Errors
/// `InvalidArgument` when a path contains a comma or NUL, or nothing is left.
pub(crate) fn join_paths(paths: &[PathBuf]) -> Result<String> {
    let mut joined = Vec::with_capacity(paths.len());
    for path in paths {
        let absolute = std::path::absolute(path)?;
        let text = absolute.to_string_lossy();
        if text.contains(',') {
            return Err(OcrError::argument(format!(
                "file path must not contain a comma: {text}"
            )));
        }
        if text.contains('\0') {
            return Err(OcrError::argument(format!("file path must not contain NUL: {text:?}")));
        }
        if !absolute.exists() {
            warn!(path = ?absolute, "input file does not exist; skipping");
            continue;
        }
        joined.push(text.into_owned());
    }

    if joined.is_empty() {
        return Err(OcrError::argument("no input file exists"));
    }
    Ok(joined.join(","))
}

fn write_png(image: &DynamicImage, dir: &Path) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix("aocr-image-")
        .suffix(".png")
        .tempfile_in(dir)?;
    image
        .write_to(&mut temp, ImageFormat::Png)
        .map_err(|e| OcrError::Image(e.to_string()))?;
    debug!(
        path = ?temp.path(),
        width = image.width(),
        height = image.height(),
        "wrote image input"
    );
    Ok(temp)
}

/// Extension of the last URL path segment, including the dot.
#[cfg_attr(not(feature = "remote"), allow(dead_code))]
fn url_suffix(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    Path::new(last)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5)
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

#[cfg(feature = "remote")]
fn download(url: &str, dir: &Path) -> Result<NamedTempFile> {
    let failure = |reason: String| OcrError::Download {
        url: url.to_string(),
        reason,
    };

    let mut temp = tempfile::Builder::new()
        .prefix("aocr-url-")
        .suffix(&url_suffix(url))
        .tempfile_in(dir)?;

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| failure(e.to_string()))?;
    let bytes = response
        .copy_to(temp.as_file_mut())
        .map_err(|e| failure(e.to_string()))?;
    debug!(url, bytes, path = ?temp.path(), "downloaded input");
    Ok(temp)
}

#[cfg(not(feature = "remote"))]
fn download(url: &str, _dir: &Path) -> Result<NamedTempFile> {
    Err(OcrError::argument(format!(
        "URL inputs need the `remote` feature: {url}"
    )))
}
