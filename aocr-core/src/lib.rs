//! # aocr-core
//!
//! Binding for the prebuilt aocr OCR engine library.
//!
//! ## Architecture
//!
//! ```text
//! LoaderConfig ──► native::loader (once per process) ──► OcrLibrary
//!                                                            │ new_engine()
//!                                                            ▼
//!         PropertySpec ──► props::encode ──►  OcrEngine  ◄── RecognitionRequest
//!                                               │ start / recognize / stop
//!                                               ▼
//!                                   NativeBackend (DylibBackend | StubBackend)
//!
//! OcrWorkerPool: N threads, each owning one OcrEngine, draining one queue.
//! ```
//!
//! All image processing and recognition happens behind [`native::NativeBackend`].
//! This crate validates, encodes and marshals; it enforces the one-caller-per-engine
//! rule with a busy flag rather than a lock.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod native;
pub mod pool;
pub mod props;

// Convenience re-exports for downstream crates
pub use config::{BackendKind, EngineConfig, LoaderConfig, Separators};
pub use engine::{
    EngineStatus, OcrEngine, OutputFormat, RecognitionRequest, RecognitionResult, RecognizeType,
    Region, Source, Speed,
};
pub use error::{OcrError, Result};
pub use native::{NativeBackend, OcrLibrary, StubBackend};
pub use pool::{OcrWorkerPool, PoolConfig, PoolSnapshot, TaskHandle};
pub use props::{PropertyBuilder, PropertySet, PropertySpec};

#[cfg(feature = "native")]
pub use native::DylibBackend;
