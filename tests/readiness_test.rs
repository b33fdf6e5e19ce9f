// Readiness tracker against fake documents, on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use event_page_engine::readiness::tracker::ReadinessTracker;
use event_page_engine::readiness::traits::{Document, ProgressDisplay, Resource, ResourceId};

enum Behavior {
    Load(Duration),
    Fail(Duration),
    Stall,
    Cached(u32, u32),
}

struct FakeImage {
    id: u64,
    behavior: Behavior,
}

impl FakeImage {
    fn new(id: u64, behavior: Behavior) -> Arc<dyn Resource> {
        Arc::new(Self { id, behavior })
    }
}

#[async_trait]
impl Resource for FakeImage {
    fn id(&self) -> ResourceId {
        ResourceId(self.id)
    }

    fn natural_size(&self) -> Option<(u32, u32)> {
        match self.behavior {
            Behavior::Cached(w, h) => Some((w, h)),
            _ => None,
        }
    }

    async fn loaded(&self) -> Result<()> {
        match self.behavior {
            Behavior::Load(after) => {
                tokio::time::sleep(after).await;
                Ok(())
            }
            Behavior::Fail(after) => {
                tokio::time::sleep(after).await;
                Err(anyhow!("error event"))
            }
            Behavior::Stall => std::future::pending().await,
            Behavior::Cached(..) => Ok(()),
        }
    }
}

#[derive(Default)]
struct RecordingDisplay {
    shown: Mutex<bool>,
    alarm: Mutex<bool>,
    fills: Mutex<Vec<f64>>,
    labels: Mutex<Vec<String>>,
}

impl ProgressDisplay for RecordingDisplay {
    fn show(&self) {
        *self.shown.lock() = true;
    }

    fn set_fill(&self, percent: f64) {
        self.fills.lock().push(percent);
    }

    fn set_label(&self, text: &str) {
        self.labels.lock().push(text.to_string());
    }

    fn set_alarm(&self) {
        *self.alarm.lock() = true;
    }
}

struct FakeDocument {
    images: Vec<Arc<dyn Resource>>,
    display: Option<Arc<RecordingDisplay>>,
}

impl Document for FakeDocument {
    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        self.images.clone()
    }

    fn progress_display(&self) -> Option<Arc<dyn ProgressDisplay>> {
        self.display
            .clone()
            .map(|d| d as Arc<dyn ProgressDisplay>)
    }
}

fn counting_tracker() -> (Arc<ReadinessTracker>, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let tracker = ReadinessTracker::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (tracker, fired)
}

#[tokio::test(start_paused = true)]
async fn test_empty_page_ready_during_init() {
    let (tracker, fired) = counting_tracker();
    let display = Arc::new(RecordingDisplay::default());
    let doc = FakeDocument {
        images: Vec::new(),
        display: Some(display.clone()),
    };

    assert!(tracker.init(&doc).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(tracker.is_ready());
    assert!(*display.shown.lock());
    assert_eq!(
        display.labels.lock().last().unwrap(),
        "Loading complete (0/0) [100%]"
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_display_fires_immediately() {
    let (tracker, fired) = counting_tracker();
    let doc = FakeDocument {
        images: vec![FakeImage::new(1, Behavior::Stall)],
        display: None,
    };

    assert!(tracker.init(&doc).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(tracker.snapshot().completed);
}

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_complete_once() {
    let (tracker, fired) = counting_tracker();
    let display = Arc::new(RecordingDisplay::default());
    let doc = FakeDocument {
        images: vec![
            FakeImage::new(1, Behavior::Load(Duration::from_millis(300))),
            FakeImage::new(2, Behavior::Fail(Duration::from_millis(100))),
            FakeImage::new(3, Behavior::Cached(640, 480)),
            FakeImage::new(4, Behavior::Cached(0, 0)),
        ],
        display: Some(display.clone()),
    };

    let handle = tracker.init(&doc).unwrap();
    handle.await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let snap = tracker.snapshot();
    assert_eq!(snap.total, 4);
    assert_eq!(snap.settled, 4);
    assert_eq!(snap.percent, 100.0);
    assert!(!snap.registration_open);

    assert!(*display.alarm.lock());
    let fills = display.fills.lock().clone();
    assert!(fills.windows(2).all(|w| w[0] <= w[1]));
    assert!(fills.iter().all(|f| *f <= 100.0));
    assert_eq!(
        display.labels.lock().last().unwrap(),
        "Loading complete (4/4) [100%]"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_resource_times_out() {
    let (tracker, fired) = counting_tracker();
    let display = Arc::new(RecordingDisplay::default());
    let doc = FakeDocument {
        images: vec![
            FakeImage::new(1, Behavior::Stall),
            FakeImage::new(2, Behavior::Load(Duration::from_secs(1))),
        ],
        display: Some(display.clone()),
    };

    let start = Instant::now();
    tracker.init(&doc).unwrap();
    tracker.wait_ready().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(display
        .labels
        .lock()
        .iter()
        .any(|l| l == "Error loading image timeout (2/2) [100%]"));
}

#[tokio::test(start_paused = true)]
async fn test_second_settlement_is_ignored() {
    let (tracker, fired) = counting_tracker();
    let doc = FakeDocument {
        images: vec![
            FakeImage::new(1, Behavior::Load(Duration::from_secs(1))),
            FakeImage::new(2, Behavior::Load(Duration::from_secs(5))),
        ],
        display: Some(Arc::new(RecordingDisplay::default())),
    };

    let handle = tracker.init(&doc).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(tracker.snapshot().settled, 1);

    // A late timeout for an image that already loaded changes nothing.
    assert!(!tracker.settle_resource(ResourceId(1), "image timeout", true));
    assert_eq!(tracker.snapshot().settled, 1);
    assert!(!tracker.snapshot().completed);

    handle.await.unwrap();
    assert_eq!(tracker.snapshot().settled, 2);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pre_registered_asset_reported_externally() {
    let (tracker, fired) = counting_tracker();
    assert!(tracker.register());

    let doc = FakeDocument {
        images: vec![FakeImage::new(1, Behavior::Load(Duration::from_millis(50)))],
        display: Some(Arc::new(RecordingDisplay::default())),
    };

    tracker.init(&doc).unwrap().await.unwrap();
    assert!(!tracker.register());
    assert_eq!(tracker.snapshot().total, 2);
    assert_eq!(tracker.snapshot().settled, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tracker.complete(Some("audio"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(tracker.is_ready());

    // Nothing left to report: settled never exceeds total.
    tracker.invalid(None);
    assert_eq!(tracker.snapshot().settled, 2);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_identity_registered_once() {
    let (tracker, fired) = counting_tracker();
    let image = FakeImage::new(9, Behavior::Load(Duration::from_millis(10)));
    let doc = FakeDocument {
        images: vec![image.clone(), image],
        display: Some(Arc::new(RecordingDisplay::default())),
    };

    tracker.init(&doc).unwrap().await.unwrap();
    assert_eq!(tracker.snapshot().total, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_init_is_rejected() {
    let (tracker, fired) = counting_tracker();
    let doc = FakeDocument {
        images: Vec::new(),
        display: Some(Arc::new(RecordingDisplay::default())),
    };

    tracker.init(&doc);
    assert!(tracker.init(&doc).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_configured_load_timeout() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let config = event_page_engine::config::PageConfig::new("http://invite.test")
        .with_load_timeout(Duration::from_secs(2));
    let tracker = ReadinessTracker::from_config(&config, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let doc = FakeDocument {
        images: vec![FakeImage::new(1, Behavior::Stall)],
        display: Some(Arc::new(RecordingDisplay::default())),
    };

    let start = Instant::now();
    tracker.init(&doc).unwrap().await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
