use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lodestone_core::{
    AddContent, ContentEngine, ContentHandle, ContentSnapshot, EngineError, EngineJob,
    FileSnapshot, HandleEvent,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine double that records requests and hands out scriptable handles.
#[derive(Default)]
pub struct StubEngine {
    requests: Mutex<Vec<AddContent>>,
    handles: Mutex<Vec<Arc<StubHandle>>>,
    fail_next: Mutex<Option<String>>,
}

impl StubEngine {
    /// Build an engine with no recorded activity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `add_content` call fail with `reason`.
    pub fn fail_next_add(&self, reason: impl Into<String>) {
        *lock(&self.fail_next) = Some(reason.into());
    }

    /// Number of `add_content` calls, failed ones included.
    #[must_use]
    pub fn add_calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<AddContent> {
        lock(&self.requests).clone()
    }

    /// Handles created so far, oldest first.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<StubHandle>> {
        lock(&self.handles).clone()
    }

    /// Most recently created handle.
    #[must_use]
    pub fn last_handle(&self) -> Option<Arc<StubHandle>> {
        lock(&self.handles).last().cloned()
    }
}

impl ContentEngine for StubEngine {
    fn add_content(&self, request: AddContent) -> Result<EngineJob, EngineError> {
        lock(&self.requests).push(request.clone());
        if let Some(reason) = lock(&self.fail_next).take() {
            return Err(EngineError::Rejected { reason });
        }
        let (handle, events) = StubHandle::new(request);
        lock(&self.handles).push(Arc::clone(&handle));
        Ok(EngineJob { handle, events })
    }
}

/// Handle whose state is driven explicitly by the test.
pub struct StubHandle {
    request: AddContent,
    snapshot: Mutex<ContentSnapshot>,
    sender: Mutex<Option<UnboundedSender<HandleEvent>>>,
    destroyed: AtomicUsize,
}

impl StubHandle {
    /// Build a handle for `request` along with its notification receiver.
    #[must_use]
    pub fn new(request: AddContent) -> (Arc<Self>, UnboundedReceiver<HandleEvent>) {
        let (sender, events) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            request,
            snapshot: Mutex::new(ContentSnapshot::default()),
            sender: Mutex::new(Some(sender)),
            destroyed: AtomicUsize::new(0),
        });
        (handle, events)
    }

    /// Locator passed to the engine.
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.request.locator
    }

    /// Storage directory assigned by the registry.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.request.storage_path
    }

    /// Whether uploads were allowed for this transfer.
    #[must_use]
    pub const fn upload_enabled(&self) -> bool {
        self.request.upload_enabled
    }

    /// Publish metadata: content name and item list.
    pub fn emit_metadata(&self, name: &str, files: Vec<FileSnapshot>) -> bool {
        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.name = Some(name.to_string());
            snapshot.files = files;
        }
        self.notify(HandleEvent::Metadata)
    }

    /// Set the aggregate fraction and spread it over every item.
    pub fn update_progress(&self, fraction: f64) -> bool {
        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.aggregate_fraction = fraction;
            for file in &mut snapshot.files {
                file.fraction_done = fraction.clamp(0.0, 1.0);
            }
        }
        self.notify(HandleEvent::Progress { fraction })
    }

    /// Adjust transfer statistics without notifying.
    pub fn update_snapshot(&self, update: impl FnOnce(&mut ContentSnapshot)) {
        update(&mut lock(&self.snapshot));
    }

    /// Mark every item finished and signal completion.
    pub fn complete(&self) -> bool {
        {
            let mut snapshot = lock(&self.snapshot);
            snapshot.aggregate_fraction = 1.0;
            snapshot.is_done = true;
            snapshot.rate_bytes_per_sec = 0;
            snapshot.estimated_seconds_remaining = Some(0.0);
            for file in &mut snapshot.files {
                file.fraction_done = 1.0;
            }
        }
        self.notify(HandleEvent::Done)
    }

    /// Signal an unrecoverable error.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.notify(HandleEvent::Error {
            message: message.into(),
        })
    }

    /// How many times `destroy` was called.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Whether `destroy` has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroy_count() > 0
    }

    /// Send a notification; `false` once the handle is destroyed or unobserved.
    fn notify(&self, event: HandleEvent) -> bool {
        lock(&self.sender)
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }
}

impl ContentHandle for StubHandle {
    fn snapshot(&self) -> ContentSnapshot {
        lock(&self.snapshot).clone()
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        lock(&self.sender).take();
    }
}
