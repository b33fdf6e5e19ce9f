use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Stable identity of a tracked resource, used as the settlement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// A document-embedded asset whose load outcome is awaited (concretely, an image).
#[async_trait]
pub trait Resource: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Natural dimensions when the resource is already fully loaded, `None` while pending.
    fn natural_size(&self) -> Option<(u32, u32)>;

    /// Resolves on the load event (`Ok`) or the error event (`Err`).
    async fn loaded(&self) -> Result<()>;
}

/// Progress readout and fill bar. Implementations must not call back into the tracker.
pub trait ProgressDisplay: Send + Sync {
    fn show(&self);
    fn set_fill(&self, percent: f64);
    fn set_label(&self, text: &str);
    /// Recolor the bar to signal that at least one resource failed.
    fn set_alarm(&self);
}

/// The page as seen by the tracker at initialization time.
pub trait Document: Send + Sync {
    /// Every trackable resource present right now.
    fn resources(&self) -> Vec<Arc<dyn Resource>>;

    /// `None` when either the readout or the bar element is missing.
    fn progress_display(&self) -> Option<Arc<dyn ProgressDisplay>>;
}

/// Entry point into the page's main content, run once the page is ready.
pub type ReadyHook = Box<dyn FnOnce() + Send + 'static>;
