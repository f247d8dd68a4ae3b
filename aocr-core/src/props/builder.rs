//! Recognised option names and a typed builder for them.
//!
//! `START_PROP_*` options only take effect when passed to
//! [`OcrEngine::start`](crate::engine::OcrEngine::start); `PROP_*` options are
//! per-call, although the engine also accepts them at start.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PropertySet;
use crate::error::{OcrError, Result};

// ── Dictionary (start-time) ───────────────────────────────────────────────────

/// `true` skips the default built-in dictionary.
pub const START_PROP_DICT_SKIP_BUILT_IN_DEFAULT: &str = "START_PROP_DICT_SKIP_BUILT_IN_DEFAULT";
/// `true` skips every built-in dictionary.
pub const START_PROP_DICT_SKIP_BUILT_IN_ALL: &str = "START_PROP_DICT_SKIP_BUILT_IN_ALL";
/// Custom dictionary file, one word per line.
pub const START_PROP_DICT_CUSTOM_DICT_FILE: &str = "START_PROP_DICT_CUSTOM_DICT_FILE";
/// Custom templates file, one template per line.
pub const START_PROP_DICT_CUSTOM_TEMPLATES_FILE: &str = "START_PROP_DICT_CUSTOM_TEMPLATES_FILE";
/// Dictionary importance 0–100 (default 10).
pub const PROP_DICT_DICT_IMPORTANCE: &str = "PROP_DICT_DICT_IMPORTANCE";

// ── General ──────────────────────────────────────────────────────────────────

pub const PROP_PAGE_TYPE: &str = "PROP_PAGE_TYPE";
pub const PROP_LIMIT_TO_CHARSET: &str = "PROP_LIMIT_TO_CHARSET";
/// `true` outputs words instead of lines.
pub const PROP_OUTPUT_SEPARATE_WORDS: &str = "PROP_OUTPUT_SEPARATE_WORDS";
/// Render DPI for PDF input (engine default 300).
pub const PROP_INPUT_PDF_DPI: &str = "PROP_INPUT_PDF_DPI";

// ── Image pre-processing ─────────────────────────────────────────────────────

pub const PROP_IMG_PREPROCESS_TYPE: &str = "PROP_IMG_PREPROCESS_TYPE";
pub const PROP_IMG_PREPROCESS_CUSTOM_CMDS: &str = "PROP_IMG_PREPROCESS_CUSTOM_CMDS";

// ── Tables ───────────────────────────────────────────────────────────────────

pub const PROP_TABLE_SKIP_DETECTION: &str = "PROP_TABLE_SKIP_DETECTION";
/// Minimum cell side length (engine default 31).
pub const PROP_TABLE_MIN_SIDE_LENGTH: &str = "PROP_TABLE_MIN_SIDE_LENGTH";
/// Debug dump directory for intermediate images; empty disables.
pub const PROP_SAVE_INTERMEDIATE_IMAGES_TO_DIR: &str = "PROP_SAVE_INTERMEDIATE_IMAGES_TO_DIR";

// ── PDF output ───────────────────────────────────────────────────────────────

/// Required when the output format is PDF.
pub const PROP_PDF_OUTPUT_FILE: &str = "PROP_PDF_OUTPUT_FILE";
/// `0` auto-detects.
pub const PROP_PDF_OUTPUT_IMAGE_DPI: &str = "PROP_PDF_OUTPUT_IMAGE_DPI";
/// `serif` (default) or `sans`.
pub const PROP_PDF_OUTPUT_FONT: &str = "PROP_PDF_OUTPUT_FONT";
pub const PROP_PDF_OUTPUT_TEXT_VISIBLE: &str = "PROP_PDF_OUTPUT_TEXT_VISIBLE";
pub const PROP_PDF_OUTPUT_IMAGE_FORCE_BW: &str = "PROP_PDF_OUTPUT_IMAGE_FORCE_BW";
/// 0–100; text above/below is highlighted differently.
pub const PROP_PDF_OUTPUT_CONF_THRESHOLD: &str = "PROP_PDF_OUTPUT_CONF_THRESHOLD";
/// `text` or `xml`; absent returns nothing.
pub const PROP_PDF_OUTPUT_RETURN_TEXT: &str = "PROP_PDF_OUTPUT_RETURN_TEXT";

// ── RTF output ───────────────────────────────────────────────────────────────

pub const PROP_RTF_OUTPUT_FILE: &str = "PROP_RTF_OUTPUT_FILE";
/// `LETTER` (default) or `A4`.
pub const PROP_RTF_PAPER_SIZE: &str = "PROP_RTF_PAPER_SIZE";
/// `text` or `xml`; absent returns nothing.
pub const PROP_RTF_OUTPUT_RETURN_TEXT: &str = "PROP_RTF_OUTPUT_RETURN_TEXT";

pub const RETURN_TEXT_FORMAT_PLAINTEXT: &str = "text";
pub const RETURN_TEXT_FORMAT_XML: &str = "xml";

/// Page layout hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Auto,
    SingleBlock,
    SingleColumn,
    SingleLine,
    SingleWord,
    SingleChar,
    Scattered,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::SingleBlock => "single_block",
            Self::SingleColumn => "single_column",
            Self::SingleLine => "single_line",
            Self::SingleWord => "single_word",
            Self::SingleChar => "single_char",
            Self::Scattered => "scattered",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "single_block" => Ok(Self::SingleBlock),
            "single_column" => Ok(Self::SingleColumn),
            "single_line" => Ok(Self::SingleLine),
            "single_word" => Ok(Self::SingleWord),
            "single_char" => Ok(Self::SingleChar),
            "scattered" => Ok(Self::Scattered),
            other => Err(OcrError::argument(format!("unknown page type: {other:?}"))),
        }
    }
}

/// Image pre-processing mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePreprocessing {
    Default,
    DefaultWithOrientationDetection,
    /// Engine-specific command string.
    Custom(String),
}

impl ImagePreprocessing {
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::DefaultWithOrientationDetection => "default_with_orientation_detection",
            Self::Custom(_) => "custom",
        }
    }
}

/// Typed construction of a [`PropertySet`].
///
/// ```
/// use aocr_core::props::{PageType, PropertyBuilder};
///
/// let props = PropertyBuilder::new()
///     .page_type(PageType::SingleBlock)
///     .pdf_output_file("/tmp/out.pdf")
///     .pdf_text_visible(true)
///     .pdf_return_xml()
///     .build();
/// assert_eq!(props.get("PROP_PAGE_TYPE"), Some("single_block"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PropertyBuilder {
    props: PropertySet,
}

impl PropertyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set any option by name.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key, value);
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.props.remove(key);
        self
    }

    pub fn build(self) -> PropertySet {
        self.props
    }

    // dictionary

    pub fn dict_skip_built_in_default(self, skip: bool) -> Self {
        self.set(START_PROP_DICT_SKIP_BUILT_IN_DEFAULT, bool_str(skip))
    }

    pub fn dict_skip_built_in_all(self, skip: bool) -> Self {
        self.set(START_PROP_DICT_SKIP_BUILT_IN_ALL, bool_str(skip))
    }

    /// `None` clears a previously set file.
    pub fn dict_custom_dict_file(self, file: Option<&Path>) -> Self {
        match file {
            Some(path) => self.set(START_PROP_DICT_CUSTOM_DICT_FILE, absolute_string(path)),
            None => self.remove(START_PROP_DICT_CUSTOM_DICT_FILE),
        }
    }

    /// `None` clears a previously set file.
    pub fn dict_custom_templates_file(self, file: Option<&Path>) -> Self {
        match file {
            Some(path) => self.set(START_PROP_DICT_CUSTOM_TEMPLATES_FILE, absolute_string(path)),
            None => self.remove(START_PROP_DICT_CUSTOM_TEMPLATES_FILE),
        }
    }

    /// Importance percentage, clamped to 0–100.
    pub fn dict_importance(self, importance: u32) -> Self {
        self.set(PROP_DICT_DICT_IMPORTANCE, importance.min(100).to_string())
    }

    // general

    pub fn page_type(self, page_type: PageType) -> Self {
        self.set(PROP_PAGE_TYPE, page_type.as_str())
    }

    /// # Errors
    /// `OcrError::InvalidArgument` for an unknown page type name.
    pub fn page_type_str(self, page_type: &str) -> Result<Self> {
        Ok(self.page_type(page_type.parse()?))
    }

    pub fn limit_to_charset(self, chars: impl Into<String>) -> Self {
        self.set(PROP_LIMIT_TO_CHARSET, chars)
    }

    pub fn limit_to_digits(self) -> Self {
        self.limit_to_charset("0123456789")
    }

    pub fn output_separate_words(self, enable: bool) -> Self {
        self.set(PROP_OUTPUT_SEPARATE_WORDS, bool_str(enable))
    }

    /// # Errors
    /// `OcrError::InvalidArgument` when `dpi` is zero.
    pub fn input_pdf_dpi(self, dpi: u32) -> Result<Self> {
        if dpi == 0 {
            return Err(OcrError::argument(
                "DPI must be greater than 0; suggested values: 300, 350, 400",
            ));
        }
        Ok(self.set(PROP_INPUT_PDF_DPI, dpi.to_string()))
    }

    // image pre-processing

    pub fn image_preprocessing(self, mode: ImagePreprocessing) -> Self {
        let builder = self.set(PROP_IMG_PREPROCESS_TYPE, mode.type_str());
        match mode {
            ImagePreprocessing::Custom(cmds) => builder.set(PROP_IMG_PREPROCESS_CUSTOM_CMDS, cmds),
            _ => builder.remove(PROP_IMG_PREPROCESS_CUSTOM_CMDS),
        }
    }

    // tables

    pub fn skip_table_detection(self, skip: bool) -> Self {
        self.set(PROP_TABLE_SKIP_DETECTION, bool_str(skip))
    }

    pub fn table_min_side_length(self, length: u32) -> Self {
        self.set(PROP_TABLE_MIN_SIDE_LENGTH, length.to_string())
    }

    /// `None` disables the debug dump.
    pub fn save_intermediate_images_to(self, dir: Option<&Path>) -> Self {
        let value = dir.map(|d| d.display().to_string()).unwrap_or_default();
        self.set(PROP_SAVE_INTERMEDIATE_IMAGES_TO_DIR, value)
    }

    // PDF output

    pub fn pdf_output_file(self, file: impl AsRef<Path>) -> Self {
        self.set(PROP_PDF_OUTPUT_FILE, absolute_string(file.as_ref()))
    }

    pub fn pdf_output_image_dpi(self, dpi: u32) -> Self {
        self.set(PROP_PDF_OUTPUT_IMAGE_DPI, dpi.to_string())
    }

    /// `true` selects sans; `false` leaves the engine default (serif).
    pub fn pdf_font_sans(self, sans: bool) -> Self {
        self.set(PROP_PDF_OUTPUT_FONT, if sans { "sans" } else { "" })
    }

    pub fn pdf_text_visible(self, visible: bool) -> Self {
        self.set(PROP_PDF_OUTPUT_TEXT_VISIBLE, bool_str(visible))
    }

    pub fn pdf_image_force_black_white(self, enable: bool) -> Self {
        self.set(PROP_PDF_OUTPUT_IMAGE_FORCE_BW, bool_str(enable))
    }

    pub fn pdf_confidence_threshold(self, threshold: u32) -> Self {
        self.set(PROP_PDF_OUTPUT_CONF_THRESHOLD, threshold.min(100).to_string())
    }

    pub fn pdf_return_plain_text(self) -> Self {
        self.set(PROP_PDF_OUTPUT_RETURN_TEXT, RETURN_TEXT_FORMAT_PLAINTEXT)
    }

    pub fn pdf_return_xml(self) -> Self {
        self.set(PROP_PDF_OUTPUT_RETURN_TEXT, RETURN_TEXT_FORMAT_XML)
    }

    pub fn pdf_return_nothing(self) -> Self {
        self.remove(PROP_PDF_OUTPUT_RETURN_TEXT)
    }

    // RTF output

    pub fn rtf_output_file(self, file: impl AsRef<Path>) -> Self {
        self.set(PROP_RTF_OUTPUT_FILE, absolute_string(file.as_ref()))
    }

    pub fn rtf_paper_size(self, size: impl Into<String>) -> Self {
        self.set(PROP_RTF_PAPER_SIZE, size)
    }

    pub fn rtf_return_plain_text(self) -> Self {
        self.set(PROP_RTF_OUTPUT_RETURN_TEXT, RETURN_TEXT_FORMAT_PLAINTEXT)
    }

    pub fn rtf_return_xml(self) -> Self {
        self.set(PROP_RTF_OUTPUT_RETURN_TEXT, RETURN_TEXT_FORMAT_XML)
    }

    pub fn rtf_return_nothing(self) -> Self {
        self.remove(PROP_RTF_OUTPUT_RETURN_TEXT)
    }
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

fn absolute_string(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
