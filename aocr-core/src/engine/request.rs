//! Recognition request and result types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;
use crate::props::PropertySpec;

/// Engine speed tier chosen at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    #[default]
    Fastest,
    Fast,
    Slow,
}

impl Speed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fastest => "fastest",
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speed {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(Self::Fastest),
            "fast" => Ok(Self::Fast),
            "slow" => Ok(Self::Slow),
            other => Err(OcrError::argument(format!(
                "unsupported speed {other:?}; expected fastest, fast or slow"
            ))),
        }
    }
}

/// What to look for on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizeType {
    Text,
    Barcode,
    #[default]
    All,
}

impl RecognizeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Barcode => "barcode",
            Self::All => "all",
        }
    }
}

impl fmt::Display for RecognizeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecognizeType {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "barcode" => Ok(Self::Barcode),
            "all" => Ok(Self::All),
            other => Err(OcrError::argument(format!(
                "unsupported recognize type {other:?}; expected text, barcode or all"
            ))),
        }
    }
}

/// Shape of the recognition output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Xml,
    Pdf,
    Rtf,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Rtf => "rtf",
        }
    }

    /// True for formats that write a document file.
    pub fn is_document(self) -> bool {
        matches!(self, Self::Pdf | Self::Rtf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "xml" => Ok(Self::Xml),
            "pdf" => Ok(Self::Pdf),
            "rtf" => Ok(Self::Rtf),
            other => Err(OcrError::argument(format!(
                "unsupported output format {other:?}; expected text, xml, pdf or rtf"
            ))),
        }
    }
}

/// Page and rectangle to recognise. `-1` in any field means "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub page_index: i32,
    pub start_x: i32,
    pub start_y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// Every page, whole image.
    pub const WHOLE: Region = Region {
        page_index: -1,
        start_x: -1,
        start_y: -1,
        width: -1,
        height: -1,
    };

    pub fn page(page_index: i32) -> Self {
        Self {
            page_index,
            ..Self::WHOLE
        }
    }

    pub fn rect(start_x: i32, start_y: i32, width: i32, height: i32) -> Self {
        Self {
            page_index: -1,
            start_x,
            start_y,
            width,
            height,
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::WHOLE
    }
}

/// Where the pixels come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Local files (images or PDFs).
    Files(Vec<PathBuf>),
    /// Remote files, downloaded for the duration of the call.
    Urls(Vec<String>),
    /// An in-memory image, written to a temporary PNG for the call.
    Image(DynamicImage),
}

/// One synchronous recognition call.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub source: Source,
    pub region: Region,
    pub recognize_type: RecognizeType,
    pub output_format: OutputFormat,
    pub properties: PropertySpec,
}

impl RecognitionRequest {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            region: Region::WHOLE,
            recognize_type: RecognizeType::All,
            output_format: OutputFormat::Text,
            properties: PropertySpec::None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Source::Files(vec![path.into()]))
    }

    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(Source::Files(paths.into_iter().map(Into::into).collect()))
    }

    pub fn urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Source::Urls(urls.into_iter().map(Into::into).collect()))
    }

    pub fn image(image: DynamicImage) -> Self {
        Self::new(Source::Image(image))
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn recognize_type(mut self, recognize_type: RecognizeType) -> Self {
        self.recognize_type = recognize_type;
        self
    }

    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn properties(mut self, properties: impl Into<PropertySpec>) -> Self {
        self.properties = properties.into();
        self
    }
}

/// Outcome of one recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub format: OutputFormat,
    /// Text or XML returned by the engine. For `pdf`/`rtf` only present when
    /// the matching `*_OUTPUT_RETURN_TEXT` option asked for it.
    pub payload: Option<String>,
    /// Document written by the engine (`pdf`/`rtf`).
    pub document: Option<PathBuf>,
}

impl RecognitionResult {
    /// Payload or the empty string.
    pub fn text(&self) -> &str {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Stopped,
    Idle,
    Busy,
}
