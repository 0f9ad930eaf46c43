//! Execution contexts: the background frame worker and the consumer queue

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A context that runs posted tasks one at a time, in posting order
pub trait Executor: Send + Sync {
    /// Queue `task`; returns false if the context no longer accepts work
    fn post(&self, task: Task) -> bool;
}

/// Dedicated background thread draining a FIFO task queue
pub struct WorkerThread {
    tx: Option<Sender<Task>>,
    executed: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn(name: &str) -> Self {
        Self::spawn_inner(name, None)
    }

    /// Spawn a worker pinned to core `core` (falls back to unpinned)
    pub fn spawn_pinned(name: &str, core: usize) -> Self {
        Self::spawn_inner(name, Some(core))
    }

    fn spawn_inner(name: &str, core: Option<usize>) -> Self {
        let (tx, rx) = channel::unbounded::<Task>();
        let executed = Arc::new(AtomicU64::new(0));
        let counter = executed.clone();

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if let Some(core) = core {
                    pin_current_thread(core);
                }

                // Exits once every sender is gone
                for task in rx.iter() {
                    task();
                    counter.fetch_add(1, Ordering::Relaxed);
                }

                log::info!("Worker thread exiting");
            })
            .expect("Failed to spawn worker thread");

        WorkerThread {
            tx: Some(tx),
            executed,
            thread_handle: Some(thread_handle),
        }
    }

    /// Tasks run so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Stop accepting work, finish queued tasks and join the thread
    pub fn shutdown(&mut self) {
        self.tx.take();

        if let Some(handle) = self.thread_handle.take() {
            // Dropped from its own thread: the loop ends on its own
            if handle.thread().id() != thread::current().id() {
                handle.join().ok();
            }
        }
    }
}

fn pin_current_thread(core: usize) {
    let Some(core_id) = core_affinity::get_core_ids().and_then(|ids| ids.into_iter().nth(core))
    else {
        log::warn!("core {core} not available, worker left unpinned");
        return;
    };

    if !core_affinity::set_for_current(core_id) {
        log::warn!("failed to pin worker to core {core}");
    }
}

impl Executor for WorkerThread {
    fn post(&self, task: Task) -> bool {
        match &self.tx {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Task queue owned by the consumer thread, drained explicitly
///
/// Stands in for the platform's main loop: results are posted here from
/// the worker and run wherever the owner calls `run_*`.
pub struct MainQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Handle other threads use to post to this queue
    pub fn handle(&self) -> MainHandle {
        MainHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every task queued so far; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it
    pub fn run_one_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[derive(Clone)]
pub struct MainHandle {
    tx: Sender<Task>,
}

impl Executor for MainHandle {
    fn post(&self, task: Task) -> bool {
        self.tx.send(task).is_ok()
    }
}

/// Runs tasks immediately on the posting thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Executor for Immediate {
    fn post(&self, task: Task) -> bool {
        task();
        true
    }
}
