//! `OcrEngine` — one native recognition context and its lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! OcrLibrary::new_engine()          → Stopped
//!     └─► start(lang, speed, props) → Idle    (no-op when already running)
//!         └─► recognize(request)*   → Busy while the native call runs
//!             └─► stop()            → Stopped (idempotent; also on Drop)
//! ```
//!
//! ## Threading
//!
//! The native engine must only ever be driven by one caller at a time. The
//! handle is `Send + Sync` so it can be moved or shared, but `recognize` takes
//! an atomic busy flag first: a second concurrent call fails immediately with
//! `OcrError::EngineBusy` instead of queueing. The context mutex is held for
//! the duration of the native call, so `stop()` from another thread waits for
//! the in-flight recognition to return.

pub mod request;
pub(crate) mod sources;

pub use request::{
    EngineStatus, OutputFormat, RecognitionRequest, RecognitionResult, RecognizeType, Region,
    Source, Speed,
};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{OcrError, Result};
use crate::native::{NativeCall, NativeContext, OcrLibrary};
use crate::props::{self, builder, PropertySpec};

#[derive(Debug, Clone)]
struct ActiveSettings {
    lang: String,
    speed: Speed,
}

/// Handle to one native engine context.
pub struct OcrEngine {
    library: OcrLibrary,
    config: EngineConfig,
    /// Native context; locked for the duration of every native call.
    context: Mutex<Option<NativeContext>>,
    /// Language and speed of the running context.
    active: Mutex<Option<ActiveSettings>>,
    busy: AtomicBool,
    /// Thread currently inside `recognize`.
    owner: Mutex<Option<String>>,
}

impl OcrEngine {
    /// Create a stopped engine. Usually reached via [`OcrLibrary::new_engine`].
    pub fn new(library: OcrLibrary, config: EngineConfig) -> Self {
        Self {
            library,
            config,
            context: Mutex::new(None),
            active: Mutex::new(None),
            busy: AtomicBool::new(false),
            owner: Mutex::new(None),
        }
    }

    /// Start the native context.
    ///
    /// Does nothing if the engine is already running.
    ///
    /// # Errors
    /// - `OcrError::InvalidArgument` for an empty, NUL-carrying or unsupported
    ///   language, or properties containing NUL.
    /// - `OcrError::InvalidConfiguration` for malformed properties.
    /// - `OcrError::EngineStartFailure` with the native diagnostic.
    pub fn start(
        &self,
        lang: &str,
        speed: Speed,
        properties: impl Into<PropertySpec>,
    ) -> Result<()> {
        let mut context = self.context.lock();
        if context.is_some() {
            debug!(lang, "engine already running; start ignored");
            return Ok(());
        }

        let lang = lang.trim();
        if lang.is_empty() {
            return Err(OcrError::argument("language must be specified"));
        }
        if lang.contains('\0') {
            return Err(OcrError::argument(format!("language must not contain NUL: {lang:?}")));
        }

        let seps = self.config.separators;
        let encoded = props::encode(&properties.into().normalize(seps)?, seps)?;

        if self.config.validate_language {
            let supported = self.library.supported_languages();
            if !supported.is_empty() && !supported.iter().any(|l| l == lang) {
                return Err(OcrError::argument(format!(
                    "language {lang:?} is not supported; available: {}",
                    supported.join(", ")
                )));
            }
        }

        let ctx = self
            .library
            .backend()
            .start(lang, speed.as_str(), &encoded, seps)
            .map_err(OcrError::EngineStartFailure)?;

        *context = Some(ctx);
        *self.active.lock() = Some(ActiveSettings {
            lang: lang.to_string(),
            speed,
        });
        info!(lang, %speed, "OCR engine started");
        Ok(())
    }

    /// Release the native context. No-op when stopped.
    pub fn stop(&self) {
        let mut context = self.context.lock();
        if let Some(ctx) = context.take() {
            self.library.backend().stop(ctx);
            *self.active.lock() = None;
            info!("OCR engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Language of the running context.
    pub fn language(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.lang.clone())
    }

    /// Speed of the running context.
    pub fn speed(&self) -> Option<Speed> {
        self.active.lock().as_ref().map(|a| a.speed)
    }

    pub fn status(&self) -> EngineStatus {
        if self.busy.load(Ordering::Acquire) {
            EngineStatus::Busy
        } else if self.is_running() {
            EngineStatus::Idle
        } else {
            EngineStatus::Stopped
        }
    }

    pub fn library(&self) -> &OcrLibrary {
        &self.library
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one recognition synchronously.
    ///
    /// # Errors
    /// - `OcrError::EngineBusy` if another caller is inside `recognize`.
    /// - `OcrError::NotRunning` if the engine has not been started.
    /// - `OcrError::InvalidConfiguration` / `OcrError::InvalidArgument` for
    ///   bad properties, a PDF request without `PROP_PDF_OUTPUT_FILE`, a comma
    ///   in a path or no existing input file.
    /// - `OcrError::Download` / `OcrError::Image` when a source can not be
    ///   materialised.
    /// - `OcrError::RecognitionFailure` with the native error.
    pub fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResult> {
        let _busy = self.acquire()?;

        let context = self.context.lock();
        let ctx = (*context).ok_or(OcrError::NotRunning)?;

        let seps = self.config.separators;
        let props = request
            .properties
            .normalize(seps)?
            .layered_over(&self.config.call_defaults);

        let format = request.output_format;
        let document = match format {
            OutputFormat::Pdf => {
                let Some(file) = props.get_non_empty(builder::PROP_PDF_OUTPUT_FILE) else {
                    return Err(OcrError::argument(format!(
                        "pdf output requires {}",
                        builder::PROP_PDF_OUTPUT_FILE
                    )));
                };
                Some(PathBuf::from(file))
            }
            OutputFormat::Rtf => props
                .get_non_empty(builder::PROP_RTF_OUTPUT_FILE)
                .map(PathBuf::from),
            OutputFormat::Text | OutputFormat::Xml => None,
        };

        let encoded = props::encode(&props, seps)?;
        let temp_dir = self
            .config
            .temp_dir
            .as_deref()
            .or_else(|| self.library.temp_dir());
        let inputs = sources::materialize(&request.source, temp_dir)?;

        let region = request.region;
        let call = NativeCall {
            files: &inputs.files,
            page_index: region.page_index,
            start_x: region.start_x,
            start_y: region.start_y,
            width: region.width,
            height: region.height,
            recognize_type: request.recognize_type.as_str(),
            output_format: format.as_str(),
            properties: &encoded,
            separators: seps,
        };

        debug!(files = %inputs.files, %format, "recognize");
        let payload = self
            .library
            .backend()
            .recognize(ctx, &call)
            .map_err(OcrError::RecognitionFailure)?;

        Ok(RecognitionResult {
            format,
            payload,
            document,
        })
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let owner = self
                .owner
                .lock()
                .clone()
                .unwrap_or_else(|| "another thread".into());
            debug!(%owner, "engine busy; rejecting concurrent recognition");
            return Err(OcrError::EngineBusy { owner });
        }
        *self.owner.lock() = Some(current_thread_label());
        Ok(BusyGuard { engine: self })
    }
}

impl Drop for OcrEngine {
    fn drop(&mut self) {
        if self.context.get_mut().is_some() {
            warn!("OCR engine dropped while running; stopping");
            self.stop();
        }
    }
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("status", &self.status())
            .field("language", &self.language())
            .finish_non_exhaustive()
    }
}

/// Releases the busy flag on every exit path, including unwinding.
struct BusyGuard<'a> {
    engine: &'a OcrEngine,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.engine.owner.lock().take();
        self.engine.busy.store(false, Ordering::Release);
    }
}

fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => format!("thread '{name}'"),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;
    use crate::config::Separators;
    use crate::native::{NativeBackend, StubBackend};
    use crate::props::{PropertyBuilder, PropertySet};

    /// Backend that records every call and can be told to fail.
    #[derive(Default)]
    struct Recording {
        starts: AtomicUsize,
        stops: AtomicUsize,
        recognitions: AtomicUsize,
        last_start_props: Mutex<String>,
        last_call: Mutex<Option<(String, String, String)>>,
        fail_start: bool,
        fail_recognize: bool,
    }

    impl NativeBackend for Recording {
        fn version(&self) -> String {
            "rec".into()
        }
        fn build_info(&self) -> String {
            String::new()
        }
        fn setup(&self, _query_only: bool) -> i32 {
            1
        }
        fn supported_languages(&self) -> Option<String> {
            Some("eng,deu".into())
        }
        fn start(
            &self,
            _lang: &str,
            _speed: &str,
            properties: &str,
            _separators: Separators,
        ) -> std::result::Result<NativeContext, String> {
            if self.fail_start {
                return Err("license file missing".into());
            }
            *self.last_start_props.lock() = properties.to_string();
            let n = self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(NativeContext(n as i64 + 100))
        }
        fn recognize(
            &self,
            _ctx: NativeContext,
            call: &NativeCall<'_>,
        ) -> std::result::Result<Option<String>, String> {
            self.recognitions.fetch_add(1, Ordering::SeqCst);
            *self.last_call.lock() = Some((
                call.files.to_string(),
                call.output_format.to_string(),
                call.properties.to_string(),
            ));
            if self.fail_recognize {
                return Err("page 3 is unreadable".into());
            }
            Ok(Some("hello".into()))
        }
        fn stop(&self, _ctx: NativeContext) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine_with(rec: &Arc<Recording>, config: EngineConfig) -> OcrEngine {
        OcrLibrary::from_arc(rec.clone()).new_engine(config)
    }

    fn scratch_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"not really a png").expect("write input");
        (dir, path)
    }

    #[test]
    fn start_twice_creates_one_native_context() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        engine.start("eng", Speed::Fast, PropertySpec::None).expect("first start");
        engine.start("deu", Speed::Slow, PropertySpec::None).expect("second start is a no-op");
        assert_eq!(rec.starts.load(Ordering::SeqCst), 1);
        assert_eq!(engine.language().as_deref(), Some("eng"));
        assert_eq!(engine.speed(), Some(Speed::Fast));
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn stopped_engine_reports_not_running() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        let (_dir, path) = scratch_file();
        let err = engine
            .recognize(&RecognitionRequest::file(path))
            .expect_err("stopped engine");
        assert!(matches!(err, OcrError::NotRunning));
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn empty_language_is_rejected() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        assert!(matches!(
            engine.start("  ", Speed::Fastest, PropertySpec::None),
            Err(OcrError::InvalidArgument(_))
        ));
        assert_eq!(rec.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsupported_language_never_starts() {
        let engine = OcrLibrary::new(StubBackend::new()).new_engine(EngineConfig::default());
        let err = engine
            .start("zz", Speed::Fastest, PropertySpec::None)
            .expect_err("zz is not a language");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert!(!engine.is_running());

        // Without pre-validation the native layer rejects it instead.
        let unchecked = OcrLibrary::new(StubBackend::new()).new_engine(EngineConfig {
            validate_language: false,
            ..EngineConfig::default()
        });
        let err = unchecked
            .start("zz", Speed::Fastest, PropertySpec::None)
            .expect_err("zz is not a language");
        assert!(matches!(err, OcrError::EngineStartFailure(_)));
        assert!(!unchecked.is_running());
    }

    #[test]
    fn native_start_failure_keeps_engine_stopped() {
        let rec = Arc::new(Recording {
            fail_start: true,
            ..Recording::default()
        });
        let engine = engine_with(&rec, EngineConfig::default());
        match engine.start("eng", Speed::Fastest, PropertySpec::None) {
            Err(OcrError::EngineStartFailure(msg)) => assert_eq!(msg, "license file missing"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn start_properties_are_encoded() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        engine
            .start(
                "eng",
                Speed::Fastest,
                PropertySpec::pairs(["START_PROP_DICT_SKIP_BUILT_IN_ALL", "true"]),
            )
            .expect("start");
        assert_eq!(
            rec.last_start_props.lock().as_str(),
            "START_PROP_DICT_SKIP_BUILT_IN_ALL=true"
        );
    }

    #[test]
    fn malformed_start_properties_never_reach_native() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        let err = engine
            .start("eng", Speed::Fastest, PropertySpec::pairs(["only-a-key"]))
            .expect_err("odd pairs");
        assert!(matches!(err, OcrError::InvalidConfiguration(_)));
        assert_eq!(rec.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pdf_without_destination_is_rejected_before_native() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let (_dir, path) = scratch_file();
        let err = engine
            .recognize(&RecognitionRequest::file(path).output_format(OutputFormat::Pdf))
            .expect_err("missing pdf destination");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert_eq!(rec.recognitions.load(Ordering::SeqCst), 0);
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn comma_path_is_rejected_before_native() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(&rec, EngineConfig::default());
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let err = engine
            .recognize(&RecognitionRequest::file("/scans/a,b.png"))
            .expect_err("comma path");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert_eq!(rec.recognitions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn call_defaults_sit_under_request_properties() {
        let rec = Arc::new(Recording::default());
        let defaults: PropertySet = [
            (builder::PROP_PAGE_TYPE, "auto"),
            (builder::PROP_INPUT_PDF_DPI, "300"),
        ]
        .into_iter()
        .collect();
        let engine = engine_with(
            &rec,
            EngineConfig {
                call_defaults: defaults,
                ..EngineConfig::default()
            },
        );
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let (_dir, path) = scratch_file();

        let request = RecognitionRequest::file(&path)
            .output_format(OutputFormat::Xml)
            .properties(PropertyBuilder::new().page_type(props::PageType::SingleLine));
        let result = engine.recognize(&request).expect("recognize");
        assert_eq!(result.payload.as_deref(), Some("hello"));
        assert_eq!(result.document, None);

        let (files, format, encoded) = rec.last_call.lock().clone().expect("native call recorded");
        assert_eq!(files, path.to_string_lossy());
        assert_eq!(format, "xml");
        assert_eq!(encoded, "PROP_INPUT_PDF_DPI=300|PROP_PAGE_TYPE=single_line");
    }

    #[test]
    fn native_recognition_error_is_surfaced_verbatim() {
        let rec = Arc::new(Recording {
            fail_recognize: true,
            ..Recording::default()
        });
        let engine = engine_with(&rec, EngineConfig::default());
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let (_dir, path) = scratch_file();
        match engine.recognize(&RecognitionRequest::file(path)) {
            Err(OcrError::RecognitionFailure(msg)) => assert_eq!(msg, "page 3 is unreadable"),
            other => panic!("unexpected: {other:?}"),
        }
        // The busy flag is released on the error path.
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    fn leftover_inputs(dir: &std::path::Path, prefix: &str) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .expect("read temp dir")
            .map(|entry| entry.expect("dir entry").path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .collect()
    }

    #[test]
    fn image_inputs_go_to_the_configured_temp_dir() {
        let rec = Arc::new(Recording::default());
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = engine_with(
            &rec,
            EngineConfig {
                temp_dir: Some(temp.path().to_path_buf()),
                ..EngineConfig::default()
            },
        );
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");

        let request = RecognitionRequest::image(image::DynamicImage::new_luma8(4, 4));
        engine.recognize(&request).expect("recognize image");
        let (files, _, _) = rec.last_call.lock().clone().expect("native call recorded");
        assert!(PathBuf::from(&files).starts_with(temp.path()), "files: {files}");
        assert!(leftover_inputs(temp.path(), "aocr-image-").is_empty());
    }

    #[test]
    fn library_temp_dir_is_used_when_engine_sets_none() {
        let rec = Arc::new(Recording::default());
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = OcrLibrary::from_arc(rec.clone())
            .with_temp_dir(temp.path())
            .new_engine(EngineConfig::default());
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");

        engine
            .recognize(&RecognitionRequest::image(image::DynamicImage::new_luma8(4, 4)))
            .expect("recognize image");
        let (files, _, _) = rec.last_call.lock().clone().expect("native call recorded");
        assert!(PathBuf::from(&files).starts_with(temp.path()), "files: {files}");
    }

    #[test]
    fn image_input_is_removed_when_recognition_fails() {
        let rec = Arc::new(Recording {
            fail_recognize: true,
            ..Recording::default()
        });
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = engine_with(
            &rec,
            EngineConfig {
                temp_dir: Some(temp.path().to_path_buf()),
                ..EngineConfig::default()
            },
        );
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");

        let err = engine
            .recognize(&RecognitionRequest::image(image::DynamicImage::new_luma8(4, 4)))
            .expect_err("native failure");
        assert!(matches!(err, OcrError::RecognitionFailure(_)));
        assert_eq!(rec.recognitions.load(Ordering::SeqCst), 1);
        assert!(leftover_inputs(temp.path(), "aocr-image-").is_empty());
    }

    /// Serves `body` to a single HTTP request and returns its URL.
    #[cfg(feature = "remote")]
    fn serve_once(body: &'static [u8]) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
        });
        format!("http://{addr}/page.png")
    }

    #[cfg(feature = "remote")]
    #[test]
    fn downloaded_inputs_are_removed_when_a_later_url_fails() {
        let rec = Arc::new(Recording::default());
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = engine_with(
            &rec,
            EngineConfig {
                temp_dir: Some(temp.path().to_path_buf()),
                ..EngineConfig::default()
            },
        );
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");

        let reachable = serve_once(b"png bytes");
        let unreachable = {
            let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            let addr = closed.local_addr().expect("local addr");
            format!("http://{addr}/missing.png")
        };

        let err = engine
            .recognize(&RecognitionRequest::urls([reachable, unreachable]))
            .expect_err("second download fails");
        assert!(matches!(err, OcrError::Download { .. }), "got {err:?}");
        assert_eq!(rec.recognitions.load(Ordering::SeqCst), 0);
        assert!(leftover_inputs(temp.path(), "aocr-url-").is_empty());
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn nul_never_reaches_the_native_layer() {
        let rec = Arc::new(Recording::default());
        let engine = engine_with(
            &rec,
            EngineConfig {
                validate_language: false,
                ..EngineConfig::default()
            },
        );
        let err = engine
            .start("en\0g", Speed::Fastest, PropertySpec::None)
            .expect_err("NUL language");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert_eq!(rec.starts.load(Ordering::SeqCst), 0);

        let err = engine
            .start("eng", Speed::Fastest, PropertySpec::pairs(["PROP_PAGE_TYPE", "au\0to"]))
            .expect_err("NUL start property");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert_eq!(rec.starts.load(Ordering::SeqCst), 0);

        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let (_dir, path) = scratch_file();
        let request = RecognitionRequest::file(&path)
            .properties(PropertySpec::pairs(["PROP_LIMIT_TO_CHARSET", "a\0b"]));
        let err = engine.recognize(&request).expect_err("NUL call property");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert!(err.is_local());
        assert_eq!(rec.recognitions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pdf_result_names_the_document() {
        let engine = OcrLibrary::new(StubBackend::new()).new_engine(EngineConfig::default());
        engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
        let (dir, path) = scratch_file();
        let out = dir.path().join("out.pdf");

        let result = engine
            .recognize(
                &RecognitionRequest::file(&path)
                    .output_format(OutputFormat::Pdf)
                    .properties(PropertyBuilder::new().pdf_output_file(&out)),
            )
            .expect("pdf recognize");
        assert_eq!(result.document.as_deref(), Some(out.as_path()));
        assert_eq!(result.payload, None);

        let with_text = engine
            .recognize(
                &RecognitionRequest::file(&path)
                    .output_format(OutputFormat::Pdf)
                    .properties(
                        PropertyBuilder::new()
                            .pdf_output_file(&out)
                            .pdf_return_plain_text(),
                    ),
            )
            .expect("pdf recognize with text");
        assert!(with_text.text().starts_with("[stub: 1 file(s)"));
    }

    #[test]
    fn stop_is_idempotent_and_drop_stops() {
        let rec = Arc::new(Recording::default());
        {
            let engine = engine_with(&rec, EngineConfig::default());
            engine.start("eng", Speed::Fastest, PropertySpec::None).expect("start");
            engine.stop();
            engine.stop();
            assert_eq!(rec.stops.load(Ordering::SeqCst), 1);
            assert!(!engine.is_running());

            engine.start("deu", Speed::Slow, PropertySpec::None).expect("restart");
            assert_eq!(engine.language().as_deref(), Some("deu"));
        }
        assert_eq!(rec.starts.load(Ordering::SeqCst), 2);
        assert_eq!(rec.stops.load(Ordering::SeqCst), 2);
    }
}
