//! `OcrWorkerPool` — fixed-size thread pool with one engine per worker.
//!
//! ## Thread affinity
//!
//! ```text
//! submit()/execute() ──► crossbeam queue ──► aocr-worker-N (loop)
//!                                               │ first task: new_engine + start
//!                                               │ later tasks: reuse
//!                                               ▼
//!                                         returns its engine on exit
//! shutdown() ── close queue, join workers, stop each returned engine here
//! ```
//!
//! Engines never leave their worker while it runs. At shutdown each worker
//! hands its engine back through its `JoinHandle` and the thread calling
//! `shutdown()` stops it, exactly once. Calling `shutdown()` from inside a
//! pool task would join the calling worker with itself; it panics instead.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::{OcrEngine, RecognitionRequest, RecognitionResult, Speed};
use crate::error::{OcrError, Result};
use crate::native::OcrLibrary;
use crate::props::PropertySet;

thread_local! {
    static IN_POOL_WORKER: Cell<bool> = const { Cell::new(false) };
}

type Job = Box<dyn FnOnce(&mut Worker) + Send + 'static>;

/// Pool settings. Every worker starts its engine with the same language,
/// speed and start properties.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker count. Default: available parallelism.
    pub threads: usize,
    pub lang: String,
    pub speed: Speed,
    pub start_properties: PropertySet,
    pub engine: EngineConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            lang: "eng".into(),
            speed: Speed::Fastest,
            start_properties: PropertySet::new(),
            engine: EngineConfig::default(),
        }
    }
}

/// Shared pool counters.
#[derive(Debug, Default)]
pub struct PoolDiagnostics {
    pub tasks_submitted: AtomicUsize,
    pub tasks_completed: AtomicUsize,
    pub tasks_failed: AtomicUsize,
    pub engines_started: AtomicUsize,
    pub engines_stopped: AtomicUsize,
}

impl PoolDiagnostics {
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            engines_started: self.engines_started.load(Ordering::Relaxed),
            engines_stopped: self.engines_stopped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub tasks_submitted: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub engines_started: usize,
    pub engines_stopped: usize,
}

/// Result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    fn ready(outcome: Result<T>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// Block until the task has run.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(OcrError::Other(anyhow::anyhow!(
                "pool task panicked before producing a result"
            )))
        })
    }
}

/// Per-thread state: the lazily started engine.
struct Worker {
    library: OcrLibrary,
    config: Arc<PoolConfig>,
    diagnostics: Arc<PoolDiagnostics>,
    engine: Option<OcrEngine>,
}

impl Worker {
    fn engine(&mut self) -> Result<&OcrEngine> {
        if self.engine.is_none() {
            let engine = self.library.new_engine(self.config.engine.clone());
            engine.start(
                &self.config.lang,
                self.config.speed,
                self.config.start_properties.clone(),
            )?;
            self.diagnostics
                .engines_started
                .fetch_add(1, Ordering::Relaxed);
            info!(
                worker = std::thread::current().name().unwrap_or("?"),
                lang = %self.config.lang,
                "pool worker engine started"
            );
            self.engine = Some(engine);
        }
        self.engine.as_ref().ok_or(OcrError::NotRunning)
    }
}

/// Fixed-size pool of engine-owning worker threads.
pub struct OcrWorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<Option<OcrEngine>>>>,
    diagnostics: Arc<PoolDiagnostics>,
    threads: usize,
}

impl OcrWorkerPool {
    /// Spawn the workers. Engines are created on each worker's first task.
    ///
    /// # Errors
    /// `OcrError::InvalidArgument` for zero threads or an empty language;
    /// `OcrError::Setup` if one-time library setup fails;
    /// `OcrError::Io` if a thread can not be spawned.
    pub fn new(library: OcrLibrary, config: PoolConfig) -> Result<Self> {
        if config.threads == 0 {
            return Err(OcrError::argument("pool needs at least one thread"));
        }
        if config.lang.trim().is_empty() {
            return Err(OcrError::argument("language must be specified"));
        }
        library.setup()?;

        let threads = config.threads;
        let config = Arc::new(config);
        let diagnostics = Arc::new(PoolDiagnostics::default());
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let worker = Worker {
                library: library.clone(),
                config: Arc::clone(&config),
                diagnostics: Arc::clone(&diagnostics),
                engine: None,
            };
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("aocr-worker-{i}"))
                .spawn(move || worker_loop(rx, worker))?;
            workers.push(handle);
        }
        info!(threads, lang = %config.lang, speed = %config.speed, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            diagnostics,
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn diagnostics(&self) -> PoolSnapshot {
        self.diagnostics.snapshot()
    }

    /// Queue one recognition on the next free worker's engine.
    pub fn submit(&self, request: RecognitionRequest) -> TaskHandle<RecognitionResult> {
        self.execute(move |engine| engine.recognize(&request))
    }

    /// Queue arbitrary work against the executing worker's engine.
    ///
    /// After shutdown the handle resolves to `OcrError::PoolShutdown`.
    pub fn execute<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&OcrEngine) -> Result<T> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return TaskHandle::ready(Err(OcrError::PoolShutdown));
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move |worker: &mut Worker| {
            let outcome = worker.engine().and_then(task);
            let counter = if outcome.is_ok() {
                &worker.diagnostics.tasks_completed
            } else {
                &worker.diagnostics.tasks_failed
            };
            counter.fetch_add(1, Ordering::Relaxed);
            let _ = tx.send(outcome);
        });

        if sender.send(job).is_err() {
            return TaskHandle::ready(Err(OcrError::PoolShutdown));
        }
        self.diagnostics
            .tasks_submitted
            .fetch_add(1, Ordering::Relaxed);
        TaskHandle { rx }
    }

    /// Drain the queue, join every worker and stop their engines on this
    /// thread. Returns how many engines were stopped. Idempotent.
    ///
    /// # Panics
    /// When called from inside a pool task.
    pub fn shutdown(&self) -> usize {
        if IN_POOL_WORKER.with(Cell::get) {
            panic!(
                "OcrWorkerPool::shutdown called from inside a pool task; \
                 shut the pool down from the thread that owns it"
            );
        }

        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return 0;
        }

        let mut stopped = 0;
        for handle in workers {
            let name = handle.thread().name().unwrap_or("?").to_string();
            match handle.join() {
                Ok(Some(engine)) => {
                    engine.stop();
                    stopped += 1;
                    self.diagnostics
                        .engines_stopped
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(worker = %name, "stopped worker engine");
                }
                Ok(None) => debug!(worker = %name, "worker never started an engine"),
                Err(_) => error!(worker = %name, "pool worker panicked; its engine is lost"),
            }
        }
        info!(stopped, "worker pool shut down");
        stopped
    }
}

impl Drop for OcrWorkerPool {
    fn drop(&mut self) {
        if IN_POOL_WORKER.with(Cell::get) {
            error!("OcrWorkerPool dropped inside a pool task; workers are detached");
            return;
        }
        self.shutdown();
    }
}

impl std::fmt::Debug for OcrWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrWorkerPool")
            .field("threads", &self.threads)
            .field("diagnostics", &self.diagnostics.snapshot())
            .finish_non_exhaustive()
    }
}

fn worker_loop(rx: Receiver<Job>, mut worker: Worker) -> Option<OcrEngine> {
    IN_POOL_WORKER.with(|flag| flag.set(true));

    while let Ok(job) = rx.recv() {
        if panic::catch_unwind(AssertUnwindSafe(|| job(&mut worker))).is_err() {
            worker
                .diagnostics
                .tasks_failed
                .fetch_add(1, Ordering::Relaxed);
            warn!("pool task panicked");
        }
    }

    worker.engine.take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Separators;
    use crate::native::{NativeBackend, NativeCall, NativeContext, StubBackend};

    fn stub_pool(threads: usize) -> OcrWorkerPool {
        OcrWorkerPool::new(
            OcrLibrary::new(StubBackend::new()),
            PoolConfig {
                threads,
                ..PoolConfig::default()
            },
        )
        .expect("pool")
    }

    #[test]
    fn tasks_run_on_started_engines() {
        let pool = stub_pool(2);
        let handles: Vec<_> = (0..6)
            .map(|_| pool.execute(|engine| Ok(engine.language())))
            .collect();
        for handle in handles {
            assert_eq!(handle.wait().expect("task").as_deref(), Some("eng"));
        }

        let stopped = pool.shutdown();
        let snap = pool.diagnostics();
        assert_eq!(snap.tasks_submitted, 6);
        assert_eq!(snap.tasks_completed, 6);
        assert_eq!(snap.tasks_failed, 0);
        assert!(snap.engines_started >= 1 && snap.engines_started <= 2);
        assert_eq!(snap.engines_stopped, stopped);
        assert_eq!(snap.engines_started, stopped);
    }

    #[test]
    fn submit_after_shutdown_fails_fast() {
        let pool = stub_pool(1);
        assert_eq!(pool.shutdown(), 0);
        assert_eq!(pool.shutdown(), 0);
        let handle = pool.submit(RecognitionRequest::file("/tmp/none.png"));
        assert!(matches!(handle.wait(), Err(OcrError::PoolShutdown)));
    }

    #[test]
    fn engine_start_failure_fails_the_task() {
        let pool = OcrWorkerPool::new(
            OcrLibrary::new(StubBackend::new()),
            PoolConfig {
                threads: 1,
                lang: "zz".into(),
                ..PoolConfig::default()
            },
        )
        .expect("pool");
        let err = pool
            .execute(|_engine| Ok(()))
            .wait()
            .expect_err("engine can not start");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
        assert_eq!(pool.shutdown(), 0);
        assert_eq!(pool.diagnostics().tasks_failed, 1);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let err = OcrWorkerPool::new(
            OcrLibrary::new(StubBackend::new()),
            PoolConfig {
                threads: 0,
                ..PoolConfig::default()
            },
        )
        .expect_err("zero threads");
        assert!(matches!(err, OcrError::InvalidArgument(_)));
    }

    /// Library whose one-time setup never succeeds.
    struct NeedsSetup {
        setups: AtomicUsize,
    }

    impl NativeBackend for NeedsSetup {
        fn version(&self) -> String {
            "needs-setup".into()
        }
        fn build_info(&self) -> String {
            String::new()
        }
        fn setup(&self, query_only: bool) -> i32 {
            if !query_only {
                self.setups.fetch_add(1, Ordering::SeqCst);
            }
            -2
        }
        fn supported_languages(&self) -> Option<String> {
            None
        }
        fn start(
            &self,
            _lang: &str,
            _speed: &str,
            _properties: &str,
            _separators: Separators,
        ) -> std::result::Result<NativeContext, String> {
            Err("not set up".into())
        }
        fn recognize(
            &self,
            _ctx: NativeContext,
            _call: &NativeCall<'_>,
        ) -> std::result::Result<Option<String>, String> {
            Err("not set up".into())
        }
        fn stop(&self, _ctx: NativeContext) {}
    }

    #[test]
    fn failed_library_setup_fails_pool_creation() {
        let backend = Arc::new(NeedsSetup {
            setups: AtomicUsize::new(0),
        });
        let err = OcrWorkerPool::new(OcrLibrary::from_arc(backend.clone()), PoolConfig::default())
            .expect_err("setup fails");
        assert!(matches!(err, OcrError::Setup { code: -2 }));
        assert_eq!(backend.setups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_from_inside_a_task_panics_and_pool_survives() {
        let pool = Arc::new(stub_pool(1));
        let inner = Arc::clone(&pool);
        let handle = pool.execute(move |_engine| {
            inner.shutdown();
            Ok(())
        });
        assert!(handle.wait().is_err());

        // The worker is still serving tasks.
        let lang = pool
            .execute(|engine| Ok(engine.language()))
            .wait()
            .expect("worker alive");
        assert_eq!(lang.as_deref(), Some("eng"));
        assert_eq!(pool.shutdown(), 1);
    }
}
