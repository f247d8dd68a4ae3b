//! `DylibBackend` — the prebuilt engine library behind a C ABI.
//!
//! ## Exported symbols
//!
//! ```text
//! aocr_get_version, aocr_get_build_info, aocr_list_supported_langs  → static strings
//! aocr_setup(query_only)                                            → 1 on success
//! aocr_start(lang, speed, props, sep, kv_sep, *handle_out)          → NULL or error string
//! aocr_recognize(handle, files, page, x, y, w, h, type, format,
//!                props, sep, kv_sep, *error_out)                     → result string or NULL
//! aocr_stop(handle)
//! aocr_free_string(s)                                               (optional)
//! ```
//!
//! Strings returned by `aocr_start`/`aocr_recognize` (including `error_out`)
//! belong to the library and are handed back through `aocr_free_string` when
//! it is exported. The static strings are never freed.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use super::{NativeBackend, NativeCall, NativeContext};
use crate::config::Separators;

type StaticStrFn = unsafe extern "C" fn() -> *const c_char;
type SetupFn = unsafe extern "C" fn(c_int) -> c_int;
type StartFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *mut i64,
) -> *const c_char;
type RecognizeFn = unsafe extern "C" fn(
    i64,
    *const c_char,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *mut *const c_char,
) -> *const c_char;
type StopFn = unsafe extern "C" fn(i64);
type FreeFn = unsafe extern "C" fn(*const c_char);

/// Dynamically loaded engine library.
pub struct DylibBackend {
    get_version: StaticStrFn,
    get_build_info: StaticStrFn,
    list_langs: StaticStrFn,
    setup: SetupFn,
    start: StartFn,
    recognize: RecognizeFn,
    stop: StopFn,
    free_string: Option<FreeFn>,
    path: PathBuf,
    // Keeps the code behind the function pointers mapped.
    _lib: Library,
}

impl DylibBackend {
    /// Map the library at `path` and resolve every symbol.
    ///
    /// # Errors
    /// The loader error, e.g. missing file, wrong architecture or missing symbol.
    pub fn open(path: &Path) -> Result<Self, libloading::Error> {
        // SAFETY: loading runs the library's initialisers; the engine library
        // is trusted code shipped with this binding.
        let lib = unsafe { Library::new(path)? };

        // SAFETY: the signatures below match the documented C ABI.
        unsafe {
            let get_version = *lib.get::<StaticStrFn>(b"aocr_get_version\0")?;
            let get_build_info = *lib.get::<StaticStrFn>(b"aocr_get_build_info\0")?;
            let list_langs = *lib.get::<StaticStrFn>(b"aocr_list_supported_langs\0")?;
            let setup = *lib.get::<SetupFn>(b"aocr_setup\0")?;
            let start = *lib.get::<StartFn>(b"aocr_start\0")?;
            let recognize = *lib.get::<RecognizeFn>(b"aocr_recognize\0")?;
            let stop = *lib.get::<StopFn>(b"aocr_stop\0")?;
            let free_string = lib.get::<FreeFn>(b"aocr_free_string\0").ok().map(|s| *s);

            debug!(path = ?path, has_free = free_string.is_some(), "resolved engine symbols");

            Ok(Self {
                get_version,
                get_build_info,
                list_langs,
                setup,
                start,
                recognize,
                stop,
                free_string,
                path: path.to_path_buf(),
                _lib: lib,
            })
        }
    }

    /// File the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn static_string(&self, f: StaticStrFn) -> Option<String> {
        // SAFETY: static-string getters take no arguments and return either
        // NULL or a NUL-terminated string that lives as long as the library.
        let ptr = unsafe { f() };
        if ptr.is_null() {
            return None;
        }
        // SAFETY: checked non-null above.
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    /// Copy an owned library string and release it.
    fn take_string(&self, ptr: *const c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        // SAFETY: non-null strings from start/recognize are NUL-terminated and
        // stay valid until handed to aocr_free_string.
        let s = unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() };
        if let Some(free) = self.free_string {
            // SAFETY: ptr came from this library and is released exactly once.
            unsafe { free(ptr) };
        }
        Some(s)
    }
}

fn c_string(what: &str, s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| format!("{what} contains an interior NUL byte"))
}

impl NativeBackend for DylibBackend {
    fn version(&self) -> String {
        self.static_string(self.get_version).unwrap_or_default()
    }

    fn build_info(&self) -> String {
        self.static_string(self.get_build_info).unwrap_or_default()
    }

    fn setup(&self, query_only: bool) -> i32 {
        // SAFETY: plain integer call.
        unsafe { (self.setup)(c_int::from(query_only)) }
    }

    fn supported_languages(&self) -> Option<String> {
        self.static_string(self.list_langs)
    }

    fn start(
        &self,
        lang: &str,
        speed: &str,
        properties: &str,
        separators: Separators,
    ) -> Result<NativeContext, String> {
        let lang = c_string("language", lang)?;
        let speed = c_string("speed", speed)?;
        let props = c_string("properties", properties)?;
        let sep = c_string("separator", &separators.pair_str())?;
        let kv_sep = c_string("separator", &separators.key_value_str())?;
        let mut handle: i64 = 0;

        // SAFETY: every pointer refers to a live CString for the duration of
        // the call; handle_out points at a local i64.
        let err = unsafe {
            (self.start)(
                lang.as_ptr(),
                speed.as_ptr(),
                props.as_ptr(),
                sep.as_ptr(),
                kv_sep.as_ptr(),
                &mut handle,
            )
        };

        match self.take_string(err) {
            Some(message) => Err(message),
            None if handle == 0 => Err("engine returned no context handle".into()),
            None => Ok(NativeContext(handle)),
        }
    }

    fn recognize(
        &self,
        ctx: NativeContext,
        call: &NativeCall<'_>,
    ) -> Result<Option<String>, String> {
        let files = c_string("file list", call.files)?;
        let recognize_type = c_string("recognize type", call.recognize_type)?;
        let output_format = c_string("output format", call.output_format)?;
        let props = c_string("properties", call.properties)?;
        let sep = c_string("separator", &call.separators.pair_str())?;
        let kv_sep = c_string("separator", &call.separators.key_value_str())?;
        let mut error: *const c_char = std::ptr::null();

        // SAFETY: all pointers refer to live CStrings; error_out points at a
        // local the library may fill with an owned string.
        let result = unsafe {
            (self.recognize)(
                ctx.0,
                files.as_ptr(),
                call.page_index,
                call.start_x,
                call.start_y,
                call.width,
                call.height,
                recognize_type.as_ptr(),
                output_format.as_ptr(),
                props.as_ptr(),
                sep.as_ptr(),
                kv_sep.as_ptr(),
                &mut error,
            )
        };

        let result = self.take_string(result);
        match self.take_string(error) {
            Some(message) => Err(message),
            None => Ok(result),
        }
    }

    fn stop(&self, ctx: NativeContext) {
        // SAFETY: ctx was issued by aocr_start and is stopped once.
        unsafe { (self.stop)(ctx.0) }
    }
}

impl std::fmt::Debug for DylibBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
