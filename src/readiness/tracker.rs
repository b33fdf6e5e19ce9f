// Readiness tracker: one context object per page session, create -> init -> settlements -> completed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::progress::{label, percent, ProgressSnapshot};
use super::traits::{Document, ProgressDisplay, ReadyHook, Resource, ResourceId};
use crate::config::{PageConfig, DEFAULT_RESOURCE_KIND, LOAD_TIMEOUT_MS};

const IMAGE_KIND: &str = "image";
const IMAGE_TIMEOUT_KIND: &str = "image timeout";
const COMPLETE_KIND: &str = "complete";

/// Terminal state of a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Watching,
    Completed,
}

struct TrackerState {
    total: usize,
    settled: usize,
    registration_open: bool,
    phase: Phase,
    display: Option<Arc<dyn ProgressDisplay>>,
    /// Settlement per watched resource; dropped at completion.
    resources: HashMap<ResourceId, Settlement>,
    on_ready: Option<ReadyHook>,
}

pub struct ReadinessTracker {
    state: Mutex<TrackerState>,
    load_timeout: Duration,
    ready_tx: watch::Sender<bool>,
}

impl ReadinessTracker {
    pub fn new(on_ready: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Self::with_timeout(on_ready, Duration::from_millis(LOAD_TIMEOUT_MS))
    }

    pub fn from_config(config: &PageConfig, on_ready: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Self::with_timeout(on_ready, config.load_timeout())
    }

    pub fn with_timeout(on_ready: impl FnOnce() + Send + 'static, load_timeout: Duration) -> Arc<Self> {
        let (ready_tx, _) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(TrackerState {
                total: 0,
                settled: 0,
                registration_open: true,
                phase: Phase::Created,
                display: None,
                resources: HashMap::new(),
                on_ready: Some(Box::new(on_ready)),
            }),
            load_timeout,
            ready_tx,
        })
    }

    /// Count one more resource to wait for. No-op once registration has closed.
    pub fn register(&self) -> bool {
        let mut state = self.state.lock();
        if !state.registration_open {
            debug!("registration closed, resource not tracked");
            return false;
        }
        state.total += 1;
        true
    }

    fn register_resource(state: &mut TrackerState, id: ResourceId) -> bool {
        if !state.registration_open || state.resources.contains_key(&id) {
            return false;
        }
        state.total += 1;
        state.resources.insert(id, Settlement::Pending);
        true
    }

    /// Register every resource in `document`, close registration and start watching.
    ///
    /// Fires the ready hook before returning when the display is missing or nothing is
    /// left to wait for. Otherwise returns the handle of the task driving the watches,
    /// which ends once every watched resource has settled. Must run inside a tokio runtime.
    pub fn init(self: &Arc<Self>, document: &dyn Document) -> Option<JoinHandle<()>> {
        let resources = document.resources();
        let display = document.progress_display();

        let mut watched: Vec<Arc<dyn Resource>> = Vec::with_capacity(resources.len());
        let hook = {
            let mut state = self.state.lock();
            if state.phase != Phase::Created {
                warn!("readiness tracker already initialized");
                return None;
            }

            for resource in resources {
                if Self::register_resource(&mut state, resource.id()) {
                    watched.push(resource);
                }
            }
            state.registration_open = false;

            match display {
                None => {
                    warn!("progress display missing, skipping readiness tracking");
                    self.finish(&mut state)
                }
                Some(display) => {
                    display.show();
                    state.display = Some(display);
                    state.phase = Phase::Watching;
                    info!(
                        "readiness tracking {} resources ({} watched)",
                        state.total,
                        watched.len()
                    );
                    if state.settled >= state.total {
                        self.finish(&mut state)
                    } else {
                        None
                    }
                }
            }
        };

        if hook.is_some() {
            self.fire(hook);
            return None;
        }
        if watched.is_empty() {
            return None;
        }

        let tracker = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut watches = JoinSet::new();
            for resource in watched {
                watches.spawn(Arc::clone(&tracker).watch(resource));
            }
            // Wait for every watch; a failed resource does not cut the others short.
            while let Some(joined) = watches.join_next().await {
                if let Err(e) = joined {
                    warn!("resource watch aborted: {}", e);
                }
            }
            debug!("all resource watches finished");
        }))
    }

    async fn watch(self: Arc<Self>, resource: Arc<dyn Resource>) {
        let id = resource.id();

        if let Some((width, height)) = resource.natural_size() {
            self.settle_resource(id, IMAGE_KIND, !(width > 0 && height > 0));
            return;
        }

        match tokio::time::timeout(self.load_timeout, resource.loaded()).await {
            Ok(Ok(())) => {
                self.settle_resource(id, IMAGE_KIND, false);
            }
            Ok(Err(e)) => {
                debug!("resource {:?} failed to load: {}", id, e);
                self.settle_resource(id, IMAGE_KIND, true);
            }
            Err(_) => {
                warn!("resource {:?} timed out after {:?}", id, self.load_timeout);
                self.settle_resource(id, IMAGE_TIMEOUT_KIND, true);
            }
        }
    }

    /// Record the outcome of a watched resource. Only the first call per resource counts.
    pub fn settle_resource(&self, id: ResourceId, kind: &str, is_error: bool) -> bool {
        let hook = {
            let mut state = self.state.lock();
            match state.resources.get(&id).copied() {
                Some(Settlement::Pending) => {
                    let outcome = if is_error {
                        Settlement::Failed
                    } else {
                        Settlement::Loaded
                    };
                    state.resources.insert(id, outcome);
                }
                Some(_) => {
                    debug!("resource {:?} already settled", id);
                    return false;
                }
                None => {
                    debug!("resource {:?} not tracked", id);
                    return false;
                }
            }
            self.settle_locked(&mut state, kind, is_error)
        };
        self.fire(hook);
        true
    }

    /// Count one settlement without identity tracking.
    pub fn settle(&self, kind: &str, is_error: bool) {
        let hook = {
            let mut state = self.state.lock();
            self.settle_locked(&mut state, kind, is_error)
        };
        self.fire(hook);
    }

    /// Report a resource the tracker does not watch itself as loaded.
    pub fn complete(&self, kind: Option<&str>) {
        self.settle(kind.unwrap_or(DEFAULT_RESOURCE_KIND), false);
    }

    /// Report a resource the tracker does not watch itself as failed.
    pub fn invalid(&self, kind: Option<&str>) {
        self.settle(kind.unwrap_or(DEFAULT_RESOURCE_KIND), true);
    }

    fn settle_locked(&self, state: &mut TrackerState, kind: &str, is_error: bool) -> Option<ReadyHook> {
        if state.phase == Phase::Completed {
            debug!("settlement of {} after completion ignored", kind);
            return None;
        }
        if state.settled >= state.total {
            warn!(
                "settlement of {} exceeds registered population {}",
                kind, state.total
            );
            return None;
        }

        state.settled += 1;
        if let Some(display) = &state.display {
            display.set_fill(percent(state.settled, state.total));
            display.set_label(&label(kind, is_error, state.settled, state.total));
            if is_error {
                display.set_alarm();
            }
        }
        debug!(
            "settled {} error={} ({}/{})",
            kind, is_error, state.settled, state.total
        );

        if !state.registration_open && state.settled >= state.total {
            return self.finish(state);
        }
        None
    }

    fn finish(&self, state: &mut TrackerState) -> Option<ReadyHook> {
        state.phase = Phase::Completed;
        state.registration_open = false;
        if let Some(display) = &state.display {
            display.set_fill(percent(state.settled, state.total));
            display.set_label(&label(COMPLETE_KIND, false, state.settled, state.total));
        }
        state.resources.clear();
        info!("page ready ({}/{} settled)", state.settled, state.total);
        state.on_ready.take()
    }

    fn fire(&self, hook: Option<ReadyHook>) {
        if let Some(hook) = hook {
            hook();
            self.ready_tx.send_replace(true);
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Resolve once the ready hook has run.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock();
        ProgressSnapshot {
            total: state.total,
            settled: state.settled,
            percent: percent(state.settled, state.total),
            registration_open: state.registration_open,
            completed: state.phase == Phase::Completed,
        }
    }
}
