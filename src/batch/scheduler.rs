//! Bounded-concurrency batch runner for slide cleanup.
//!
//! A fixed set of workers shares an atomic cursor over the selected item
//! list, so the number of in-flight remote calls can never exceed the worker
//! count and every completion refills the pool by claiming the next index.
//! Replacing the work list bumps a generation counter; workers re-check it
//! under the scheduler lock before every mutation, which makes completions
//! from a superseded list silent no-ops.

use crate::annotate::model::PixelBuffer;
use crate::batch::item::{BatchEvent, Progress, SlidePage, WorkItem, WorkStatus};
use crate::error::{Result, RetouchError};
use crate::service::{EditRequest, EditService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug)]
struct SchedulerState {
    items: Vec<WorkItem>,
    generation: u64,
    progress: Option<Progress>,
    running: bool,
}

pub struct BatchScheduler {
    state: Arc<Mutex<SchedulerState>>,
    service: Arc<dyn EditService>,
    events: UnboundedSender<BatchEvent>,
    max_concurrent: usize,
    timeout: Duration,
}

impl BatchScheduler {
    pub fn new(service: Arc<dyn EditService>) -> (Self, UnboundedReceiver<BatchEvent>) {
        Self::with_limits(
            service,
            DEFAULT_MAX_CONCURRENT,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_limits(
        service: Arc<dyn EditService>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> (Self, UnboundedReceiver<BatchEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            state: Arc::new(Mutex::new(SchedulerState {
                items: Vec::new(),
                generation: 0,
                progress: None,
                running: false,
            })),
            service,
            events,
            max_concurrent: max_concurrent.max(1),
            timeout,
        };
        (scheduler, receiver)
    }

    /// Replaces the work list. The generation bump invalidates every
    /// completion still in flight for the previous list.
    pub async fn set_items(&self, pages: Vec<SlidePage>) {
        let mut st = self.state.lock().await;
        st.items = pages.into_iter().map(WorkItem::from_page).collect();
        st.generation += 1;
        st.progress = None;
        st.running = false;
        tracing::info!(
            generation = st.generation,
            count = st.items.len(),
            "work list replaced"
        );
        let _ = self.events.send(BatchEvent::Progress {
            generation: st.generation,
            progress: None,
        });
    }

    pub async fn items(&self) -> Vec<WorkItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn progress(&self) -> Option<Progress> {
        self.state.lock().await.progress
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Runs every item that is not already completed or in flight through
    /// the remote clean call, at most `max_concurrent` at a time. Resolves
    /// when the batch has drained; failures stay local to their item.
    pub async fn run_all(&self) -> Result<()> {
        let (generation, selected) = {
            let mut st = self.state.lock().await;
            if st.running {
                tracing::warn!("batch run already active; ignoring run_all");
                return Ok(());
            }
            let selected: Vec<usize> = st
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| {
                    !matches!(item.status, WorkStatus::Completed | WorkStatus::Processing)
                })
                .map(|(index, _)| index)
                .collect();
            if selected.is_empty() {
                return Ok(());
            }

            st.running = true;
            let generation = st.generation;
            for &index in &selected {
                let item = &mut st.items[index];
                item.status = WorkStatus::Queued;
                let _ = self.events.send(BatchEvent::Status {
                    generation,
                    index,
                    id: item.id.clone(),
                    status: WorkStatus::Queued,
                    result: None,
                    error: None,
                });
            }
            let progress = Progress {
                done: 0,
                total: selected.len(),
            };
            st.progress = Some(progress);
            let _ = self.events.send(BatchEvent::Progress {
                generation,
                progress: Some(progress),
            });
            (generation, selected)
        };

        tracing::info!(total = selected.len(), generation, "batch run started");

        let selected = Arc::new(selected);
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.max_concurrent.min(selected.len());
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(tokio::spawn(worker(
                Arc::clone(&self.state),
                Arc::clone(&self.service),
                self.events.clone(),
                Arc::clone(&selected),
                Arc::clone(&cursor),
                generation,
                self.timeout,
            )));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let mut st = self.state.lock().await;
        if st.generation == generation {
            st.progress = None;
            st.running = false;
            let _ = self.events.send(BatchEvent::Progress {
                generation,
                progress: None,
            });
            tracing::info!(generation, "batch run complete");
        }
        Ok(())
    }

    /// Processes one item immediately, bypassing the worker pool: a
    /// user-initiated retry must not wait behind the batch queue. Batch
    /// progress is not touched.
    pub async fn run_single(&self, id: &str) -> Result<PixelBuffer> {
        let (generation, index, source) = {
            let mut st = self.state.lock().await;
            let index = st
                .items
                .iter()
                .position(|item| item.id == id)
                .ok_or_else(|| RetouchError::Validation(format!("unknown work item: {id}")))?;
            let generation = st.generation;
            let item = &mut st.items[index];
            item.status = WorkStatus::Processing;
            item.error = None;
            let _ = self.events.send(BatchEvent::Status {
                generation,
                index,
                id: item.id.clone(),
                status: WorkStatus::Processing,
                result: None,
                error: None,
            });
            (generation, index, item.source.clone())
        };

        let outcome = process(&*self.service, source, self.timeout).await;

        let mut st = self.state.lock().await;
        if st.generation != generation {
            tracing::debug!(id, "dropping single completion for superseded work list");
            return Err(RetouchError::StaleSession);
        }
        let item = &mut st.items[index];
        match outcome {
            Ok(image) => {
                item.status = WorkStatus::Completed;
                item.result = Some(image.clone());
                item.error = None;
                let _ = self.events.send(BatchEvent::Status {
                    generation,
                    index,
                    id: item.id.clone(),
                    status: WorkStatus::Completed,
                    result: item.result.clone(),
                    error: None,
                });
                Ok(image)
            }
            Err(err) => {
                tracing::error!(id, error = %err, "single item failed");
                item.status = WorkStatus::Error;
                item.result = None;
                item.error = Some(err.to_string());
                let _ = self.events.send(BatchEvent::Status {
                    generation,
                    index,
                    id: item.id.clone(),
                    status: WorkStatus::Error,
                    result: None,
                    error: item.error.clone(),
                });
                Err(err)
            }
        }
    }
}

async fn process(
    service: &dyn EditService,
    source: Vec<u8>,
    timeout: Duration,
) -> Result<PixelBuffer> {
    match tokio::time::timeout(timeout, service.edit(EditRequest::clean(source))).await {
        Ok(outcome) => outcome,
        // Dropping the future cancels the underlying request.
        Err(_) => Err(RetouchError::Timeout),
    }
}

async fn worker(
    state: Arc<Mutex<SchedulerState>>,
    service: Arc<dyn EditService>,
    events: UnboundedSender<BatchEvent>,
    selected: Arc<Vec<usize>>,
    cursor: Arc<AtomicUsize>,
    generation: u64,
    timeout: Duration,
) {
    loop {
        let slot = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(&index) = selected.get(slot) else {
            return;
        };

        let source = {
            let mut st = state.lock().await;
            if st.generation != generation {
                tracing::debug!(generation, "work list superseded; worker exiting");
                return;
            }
            if st.items[index].status != WorkStatus::Queued {
                // Resolved out of band by a single retry; it still counts
                // toward this run's progress.
                bump_progress(&mut st, &events, generation);
                continue;
            }
            let item = &mut st.items[index];
            item.status = WorkStatus::Processing;
            let _ = events.send(BatchEvent::Status {
                generation,
                index,
                id: item.id.clone(),
                status: WorkStatus::Processing,
                result: None,
                error: None,
            });
            item.source.clone()
        };

        let outcome = process(&*service, source, timeout).await;

        let mut st = state.lock().await;
        if st.generation != generation {
            // Stale session: the result is discarded without an event.
            tracing::debug!(index, "dropping completion for superseded work list");
            return;
        }
        let item = &mut st.items[index];
        match outcome {
            Ok(image) => {
                item.status = WorkStatus::Completed;
                item.result = Some(image);
                item.error = None;
            }
            Err(err) => {
                tracing::error!(id = %item.id, error = %err, "batch item failed");
                item.status = WorkStatus::Error;
                item.result = None;
                item.error = Some(err.to_string());
            }
        }
        let _ = events.send(BatchEvent::Status {
            generation,
            index,
            id: item.id.clone(),
            status: item.status,
            result: item.result.clone(),
            error: item.error.clone(),
        });
        bump_progress(&mut st, &events, generation);
    }
}

fn bump_progress(st: &mut SchedulerState, events: &UnboundedSender<BatchEvent>, generation: u64) {
    if let Some(progress) = st.progress.as_mut() {
        progress.done += 1;
        let snapshot = *progress;
        let _ = events.send(BatchEvent::Progress {
            generation,
            progress: Some(snapshot),
        });
    }
}
