//! Shared helpers for the integration tests

#![allow(dead_code)]

use futures::future::FutureObj;
use futures::task::{Spawn, SpawnError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use statebox::{Merge, MemoryStorage, PersistError, StateStorage, Thenable};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
}

impl Counter {
    pub fn new(count: i64) -> Self {
        Self { count }
    }
}

#[derive(Default)]
pub struct CounterPatch {
    pub count: Option<i64>,
}

impl Merge for Counter {
    type Partial = CounterPatch;

    fn merge(&mut self, patch: CounterPatch) {
        if let Some(count) = patch.count {
            self.count = count;
        }
    }
}

/// Log sink shared with a `tracing-subscriber` fmt layer.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every tracing event on this thread captured as text.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture.contents())
}

/// Storage whose every operation completes only when polled.
///
/// Backed by a `MemoryStorage` so tests can inspect what actually landed.
pub struct DeferredStorage {
    pub backing: Arc<MemoryStorage>,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl DeferredStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            backing: Arc::new(MemoryStorage::new()),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl StateStorage for DeferredStorage {
    fn get_item(&self, name: &str) -> Thenable<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let backing = self.backing.clone();
        let name = name.to_string();
        Thenable::from_future(async move { Ok(backing.get(&name)) })
    }

    fn set_item(&self, name: &str, value: String) -> Thenable<()> {
        let backing = self.backing.clone();
        let name = name.to_string();
        let fail = self.fail_writes.load(Ordering::SeqCst);
        Thenable::from_future(async move {
            if fail {
                return Err(PersistError::storage("disk full"));
            }
            backing.set(name, value);
            Ok(())
        })
    }

    fn remove_item(&self, name: &str) -> Thenable<()> {
        let backing = self.backing.clone();
        let name = name.to_string();
        Thenable::from_future(async move { backing.remove_item(&name).await })
    }
}

/// Executor that queues spawned tasks until `run_all` is called.
#[derive(Default)]
pub struct CollectingSpawner {
    tasks: Mutex<Vec<FutureObj<'static, ()>>>,
}

impl CollectingSpawner {
    pub fn queued(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run queued tasks to completion, including tasks they queue.
    pub fn run_all(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                futures::executor::block_on(task);
            }
        }
    }
}

/// Executor that refuses every task.
pub struct RejectingSpawner;

impl Spawn for RejectingSpawner {
    fn spawn_obj(&self, _future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}

impl Spawn for CollectingSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.tasks.lock().push(future);
        Ok(())
    }
}
