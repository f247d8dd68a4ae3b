//! `StubBackend` — placeholder backend that echoes call metadata without real recognition.
//!
//! Lets the CLI, the pool and the tests exercise the whole binding without the
//! prebuilt engine. Output is deterministic:
//!
//! - `text` → `"[stub: <N> file(s), type=<type>, page=<page>]"`
//! - `xml`  → `<ocr stub="true" files="<N>" type="<type>" page="<page>"/>`
//! - `pdf`/`rtf` → the `text` or `xml` echo when the matching
//!   `*_OUTPUT_RETURN_TEXT` option asks for it, otherwise nothing.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;

use super::{NativeBackend, NativeCall, NativeContext};
use crate::config::Separators;
use crate::props::{self, builder};

const STUB_LANGUAGES: &str = "eng,spa,por,deu,fra";

/// Echo-style stub backend.
pub struct StubBackend {
    next_context: AtomicI64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            next_context: AtomicI64::new(1),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend for StubBackend {
    fn version(&self) -> String {
        format!("aocr stub backend {}", env!("CARGO_PKG_VERSION"))
    }

    fn build_info(&self) -> String {
        "in-process echo; no recognition performed".into()
    }

    fn setup(&self, _query_only: bool) -> i32 {
        1
    }

    fn supported_languages(&self) -> Option<String> {
        Some(STUB_LANGUAGES.into())
    }

    fn start(
        &self,
        lang: &str,
        speed: &str,
        properties: &str,
        _separators: Separators,
    ) -> Result<NativeContext, String> {
        if !STUB_LANGUAGES.split(',').any(|l| l == lang) {
            return Err(format!("language not available: {lang}"));
        }
        let ctx = NativeContext(self.next_context.fetch_add(1, Ordering::Relaxed));
        debug!(?ctx, lang, speed, properties, "StubBackend::start");
        Ok(ctx)
    }

    fn recognize(
        &self,
        ctx: NativeContext,
        call: &NativeCall<'_>,
    ) -> Result<Option<String>, String> {
        let file_count = call.files.split(',').filter(|f| !f.is_empty()).count();
        debug!(?ctx, file_count, "StubBackend::recognize");

        let echo_text = format!(
            "[stub: {} file(s), type={}, page={}]",
            file_count, call.recognize_type, call.page_index
        );
        let echo_xml = format!(
            "<ocr stub=\"true\" files=\"{}\" type=\"{}\" page=\"{}\"/>",
            file_count, call.recognize_type, call.page_index
        );

        let return_option = match call.output_format {
            "text" => return Ok(Some(echo_text)),
            "xml" => return Ok(Some(echo_xml)),
            "pdf" => builder::PROP_PDF_OUTPUT_RETURN_TEXT,
            "rtf" => builder::PROP_RTF_OUTPUT_RETURN_TEXT,
            other => return Err(format!("unsupported output format: {other}")),
        };

        let props = props::decode(call.properties, call.separators);
        Ok(match props.get(return_option) {
            Some(builder::RETURN_TEXT_FORMAT_PLAINTEXT) => Some(echo_text),
            Some(builder::RETURN_TEXT_FORMAT_XML) => Some(echo_xml),
            _ => None,
        })
    }

    fn stop(&self, ctx: NativeContext) {
        debug!(?ctx, "StubBackend::stop");
    }
}
