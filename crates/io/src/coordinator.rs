//! Background persistence with debounced coalescing.
//!
//! Every mutation notification records (or overwrites) a single pending
//! snapshot per document; only the latest one is ever written. A document
//! flushes after an inactivity window since its last change, or as soon as
//! the number of distinct pending documents reaches a threshold. Flushes run
//! on a bounded worker pool; per document, at most one flush is in flight at
//! a time, and a change arriving mid-flight is retained as the next pending
//! snapshot.
//!
//! The interactive edit path never blocks on storage: `notify_changed` takes
//! a lock for a map insert and returns. Failed writes are retried on the
//! next scheduler tick; after `retry_warn_threshold` consecutive failures
//! for a document a warning is logged once and the document is reported by
//! `failing_documents` until a write succeeds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use landforge_config::settings::AutosaveSettings;
use landforge_engine::document::DocumentState;

use crate::projection;
use crate::store::{DocumentId, StorageBackend};

/// Tuning for the flush pipeline.
#[derive(Debug, Clone)]
pub struct FlushSettings {
    /// Inactivity window before a changed document flushes.
    pub debounce: Duration,
    /// Distinct pending documents that force an immediate flush of all.
    pub pending_threshold: usize,
    /// Worker threads = maximum simultaneous flushes.
    pub max_in_flight: usize,
    /// Consecutive failures before the persistent warning fires.
    pub retry_warn_threshold: u32,
    /// Scheduler granularity.
    pub tick: Duration,
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            pending_threshold: 50,
            max_in_flight: 16,
            retry_warn_threshold: 5,
            tick: Duration::from_millis(250),
        }
    }
}

impl FlushSettings {
    pub fn from_config(config: &AutosaveSettings) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            pending_threshold: config.pending_threshold.max(1),
            max_in_flight: config.max_parallel_flushes.max(1),
            retry_warn_threshold: config.retry_warn_threshold.max(1),
            ..Self::default()
        }
    }
}

struct PendingFlush {
    state: DocumentState,
    last_change: Instant,
    /// Skip the debounce window (threshold trigger, retry, explicit flush).
    due_now: bool,
}

#[derive(Default)]
struct CoordState {
    pending: HashMap<DocumentId, PendingFlush>,
    /// Due documents waiting for a worker, plus a membership set.
    queue: VecDeque<DocumentId>,
    queued: HashSet<DocumentId>,
    in_flight: HashSet<DocumentId>,
    /// Consecutive save failures per document.
    failures: HashMap<DocumentId, u32>,
    warned: HashSet<DocumentId>,
}

struct Shared {
    backend: Arc<dyn StorageBackend>,
    settings: FlushSettings,
    shutdown: AtomicBool,
    state: Mutex<CoordState>,
    /// Signals workers that the queue has entries.
    work_ready: Condvar,
    /// Signals drain() that a flush completed.
    flush_done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CoordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move due pending entries into the worker queue. Returns how many were
    /// queued. In-flight documents are skipped; their follow-up is queued
    /// after the current flush completes.
    fn promote_due(&self, st: &mut CoordState) -> usize {
        let mut promoted = 0;
        let due: Vec<DocumentId> = st
            .pending
            .iter()
            .filter(|(id, p)| {
                (p.due_now || p.last_change.elapsed() >= self.settings.debounce)
                    && !st.in_flight.contains(*id)
                    && !st.queued.contains(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in due {
            st.queued.insert(id.clone());
            st.queue.push_back(id);
            promoted += 1;
        }
        promoted
    }
}

/// Dirty-tracking, debounced, bounded-concurrency flusher.
pub struct PersistenceCoordinator {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl PersistenceCoordinator {
    pub fn new(backend: Arc<dyn StorageBackend>, settings: FlushSettings) -> Self {
        let shared = Arc::new(Shared {
            backend,
            settings,
            shutdown: AtomicBool::new(false),
            state: Mutex::new(CoordState::default()),
            work_ready: Condvar::new(),
            flush_done: Condvar::new(),
        });

        let ticker = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || run_ticker(shared))
        };

        let workers = (0..shared.settings.max_in_flight)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || run_worker(shared))
            })
            .collect();

        Self { shared, ticker: Some(ticker), workers }
    }

    /// Record a change: the snapshot supersedes any pending one for this
    /// document. Cheap and non-blocking; encoding happens on worker threads.
    pub fn notify_changed(&self, id: DocumentId, state: DocumentState) {
        let mut st = self.shared.lock();
        st.pending.insert(
            id,
            PendingFlush { state, last_change: Instant::now(), due_now: false },
        );

        // Backlog pressure: once enough distinct documents are waiting,
        // flush them all without waiting out the debounce window.
        if st.pending.len() >= self.shared.settings.pending_threshold {
            for p in st.pending.values_mut() {
                p.due_now = true;
            }
            if self.shared.promote_due(&mut st) > 0 {
                self.shared.work_ready.notify_all();
            }
        }
    }

    /// Make a document's pending flush due immediately.
    pub fn flush_now(&self, id: &DocumentId) {
        let mut st = self.shared.lock();
        if let Some(p) = st.pending.get_mut(id) {
            p.due_now = true;
        }
        if self.shared.promote_due(&mut st) > 0 {
            self.shared.work_ready.notify_all();
        }
    }

    /// Force all pending work due and wait until nothing is pending or in
    /// flight. Returns false on timeout (e.g. storage failing persistently).
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.shared.lock();
        loop {
            for p in st.pending.values_mut() {
                p.due_now = true;
            }
            if self.shared.promote_due(&mut st) > 0 {
                self.shared.work_ready.notify_all();
            }
            if st.pending.is_empty() && st.in_flight.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = (deadline - now).min(Duration::from_millis(50));
            let (guard, _) = self
                .shared
                .flush_done
                .wait_timeout(st, wait)
                .unwrap_or_else(PoisonError::into_inner);
            st = guard;
        }
    }

    /// Number of documents with a pending (unflushed) change.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_idle(&self) -> bool {
        let st = self.shared.lock();
        st.pending.is_empty() && st.in_flight.is_empty()
    }

    /// Documents past the retry warning threshold, still failing to save.
    pub fn failing_documents(&self) -> Vec<DocumentId> {
        let st = self.shared.lock();
        let mut failing: Vec<DocumentId> = st.warned.iter().cloned().collect();
        failing.sort();
        failing
    }
}

impl Drop for PersistenceCoordinator {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.work_ready.notify_all();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn run_ticker(shared: Arc<Shared>) {
    while !shared.shutdown.load(Ordering::SeqCst) {
        thread::sleep(shared.settings.tick);
        let mut st = shared.lock();
        if shared.promote_due(&mut st) > 0 {
            shared.work_ready.notify_all();
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        // Claim the next due document
        let (id, state) = {
            let mut st = shared.lock();
            loop {
                if shared.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(id) = st.queue.pop_front() {
                    st.queued.remove(&id);
                    // The pending entry moved into this flush; a change
                    // arriving from here on re-populates pending and becomes
                    // the follow-up flush.
                    match st.pending.remove(&id) {
                        Some(p) => {
                            st.in_flight.insert(id.clone());
                            break (id, p.state);
                        }
                        None => continue,
                    }
                }
                st = shared
                    .work_ready
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let result = projection::encode(&state)
            .and_then(|bytes| shared.backend.save_projection(&id, &bytes));

        let mut st = shared.lock();
        st.in_flight.remove(&id);
        match result {
            Ok(()) => {
                st.failures.remove(&id);
                if st.warned.remove(&id) {
                    log::info!("autosave for {id} recovered");
                }
            }
            Err(err) => {
                let attempts = st.failures.entry(id.clone()).or_insert(0);
                *attempts += 1;
                let attempts = *attempts;
                log::debug!("autosave for {id} failed (attempt {attempts}): {err}");
                if attempts >= shared.settings.retry_warn_threshold && !st.warned.contains(&id) {
                    st.warned.insert(id.clone());
                    log::warn!("autosave for {id} keeps failing after {attempts} attempts: {err}");
                }
                // Keep the unsaved snapshot for the next tick, unless a
                // newer change already superseded it mid-flight.
                st.pending.entry(id.clone()).or_insert(PendingFlush {
                    state,
                    last_change: Instant::now(),
                    due_now: true,
                });
            }
        }
        shared.flush_done.notify_all();
    }
}
