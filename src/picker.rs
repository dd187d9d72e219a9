//! One background-picker session: resolver, cache and renderer owned together.
//!
//! A session is created when the picker UI is constructed and disposed when
//! it is torn down. Every `open`/`refresh`/`close` advances the render token,
//! so results and slices belonging to an earlier pass are dropped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::cache::{SourceCache, WARMUP_TIMEOUT};
use crate::host::{checked_bridge, linked_context, LinkedBridge, Subscription};
use crate::models::{BackdropSettings, ImageEntry, LinkedContext, ResolutionResult};
use crate::render::{IdleScheduler, ProgressiveRenderer, RenderConfig, TaskId, TileSink};
use crate::settings::{sync_linked_entry, SettingsStore};
use crate::source::SourceResolver;

/// How an `open` or `refresh` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Rendered { count: usize },
    Empty,
    Failed(String),
    /// A later open, refresh or close started before this one finished.
    Superseded,
}

pub struct PickerSession {
    settings: RefCell<BackdropSettings>,
    store: Option<Rc<dyn SettingsStore>>,
    bridge: Option<Arc<dyn LinkedBridge>>,
    cache: SourceCache,
    renderer: ProgressiveRenderer,
    scheduler: Rc<dyn IdleScheduler>,
    result: RefCell<Option<ResolutionResult>>,
    warmup: Cell<Option<TaskId>>,
    bridge_dirty: Arc<AtomicBool>,
    subscription: RefCell<Option<Subscription>>,
}

impl PickerSession {
    pub fn new(
        resolver: SourceResolver,
        scheduler: Rc<dyn IdleScheduler>,
        sink: Rc<dyn TileSink>,
        settings: BackdropSettings,
    ) -> Self {
        Self::with_config(resolver, scheduler, sink, settings, RenderConfig::default())
    }

    pub fn with_config(
        resolver: SourceResolver,
        scheduler: Rc<dyn IdleScheduler>,
        sink: Rc<dyn TileSink>,
        settings: BackdropSettings,
        config: RenderConfig,
    ) -> Self {
        Self {
            settings: RefCell::new(settings),
            store: None,
            bridge: None,
            cache: SourceCache::new(resolver),
            renderer: ProgressiveRenderer::new(scheduler.clone(), sink, config),
            scheduler,
            result: RefCell::new(None),
            warmup: Cell::new(None),
            bridge_dirty: Arc::new(AtomicBool::new(true)),
            subscription: RefCell::new(None),
        }
    }

    /// Persists selection and linked-entry changes through `store`.
    pub fn with_store(mut self, store: Rc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attaches the linked-server bridge. A bridge with an unknown interface
    /// version is ignored.
    pub fn with_bridge(mut self, bridge: Option<Arc<dyn LinkedBridge>>) -> Self {
        self.bridge = checked_bridge(bridge);
        if let Some(bridge) = &self.bridge {
            let dirty = Arc::clone(&self.bridge_dirty);
            let subscription = bridge.subscribe(Box::new(move || {
                dirty.store(true, Ordering::Release);
            }));
            self.subscription.replace(Some(subscription));
        }
        self
    }

    pub fn settings(&self) -> BackdropSettings {
        self.settings.borrow().clone()
    }

    /// Applies `change` and persists the result. The next open picks it up.
    pub fn update_settings(&self, change: impl FnOnce(&mut BackdropSettings)) -> Result<()> {
        change(&mut self.settings.borrow_mut());
        self.bridge_dirty.store(true, Ordering::Release);
        self.persist()
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    pub fn renderer(&self) -> &ProgressiveRenderer {
        &self.renderer
    }

    /// Last result shown by this session.
    pub fn result(&self) -> Option<ResolutionResult> {
        self.result.borrow().clone()
    }

    pub async fn open(&self) -> OpenOutcome {
        self.load(false).await
    }

    /// Like `open`, but bypasses the cache.
    pub async fn refresh(&self) -> OpenOutcome {
        self.load(true).await
    }

    async fn load(&self, force_refresh: bool) -> OpenOutcome {
        let token = self.renderer.advance_token();
        self.renderer.show_loading(token);
        self.cancel_warmup();
        self.sync_linked();

        let settings = self.settings();
        let linked = self.linked(&settings);
        let result = self
            .cache
            .get_or_resolve(&settings, linked.as_ref(), force_refresh)
            .await;

        if !self.renderer.is_current(token) {
            debug!(token, "Picker pass superseded, dropping result");
            return OpenOutcome::Superseded;
        }

        self.renderer.set_selected(settings.selected_image.clone());
        self.renderer.present(&result, token);
        let outcome = match &result.error {
            Some(message) => OpenOutcome::Failed(message.clone()),
            None if result.is_empty() => OpenOutcome::Empty,
            None => OpenOutcome::Rendered {
                count: result.len(),
            },
        };
        self.result.replace(Some(result));
        outcome
    }

    /// Stops any render in flight. Pending results are dropped when they land.
    pub fn close(&self) {
        let token = self.renderer.cancel();
        debug!(token, "Picker closed");
    }

    /// Tears the session down: cancels rendering and warmup and detaches
    /// from the bridge.
    pub fn dispose(&self) {
        self.close();
        self.cancel_warmup();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.result.replace(None);
    }

    /// Resolves into the cache without rendering. Returns false for remote
    /// sources, which are never warmed.
    pub async fn prime(&self) -> bool {
        self.sync_linked();
        let settings = self.settings();
        let linked = self.linked(&settings);
        self.cache.prime(&settings, linked.as_ref()).await
    }

    /// Queues a `prime` for the next idle period, bounded by [`WARMUP_TIMEOUT`].
    ///
    /// The warmup is spawned on the current `LocalSet`.
    pub fn schedule_warmup(self: &Rc<Self>) -> bool {
        let settings = self.settings();
        if settings.effective_source(self.linked(&settings).as_ref()).is_remote() {
            debug!("Remote source, no warmup scheduled");
            return false;
        }

        self.cancel_warmup();
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.scheduler.schedule(
            WARMUP_TIMEOUT,
            Box::new(move || {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                session.warmup.set(None);
                tokio::task::spawn_local(async move {
                    session.prime().await;
                });
            }),
        );
        self.warmup.set(Some(id));
        true
    }

    /// Marks `relative_path` as the chosen background and persists it.
    /// Returns false when the path is not in the current result.
    pub fn select(&self, relative_path: &str) -> Result<bool> {
        let known = self
            .result
            .borrow()
            .as_ref()
            .is_some_and(|r| r.find(relative_path).is_some());
        if !known {
            debug!(path = relative_path, "Ignoring selection of unknown image");
            return Ok(false);
        }

        self.settings.borrow_mut().selected_image = Some(relative_path.to_string());
        self.renderer.set_selected(Some(relative_path.to_string()));
        self.persist()?;
        Ok(true)
    }

    /// The selected image as resolved by the last pass.
    pub fn selected_entry(&self) -> Option<ImageEntry> {
        let selected = self.settings.borrow().selected_image.clone()?;
        self.result.borrow().as_ref()?.find(&selected).cloned()
    }

    fn linked(&self, settings: &BackdropSettings) -> Option<LinkedContext> {
        let bridge = self.bridge.as_ref()?;
        let id = settings.linked_entry_id.as_deref()?;
        linked_context(bridge.as_ref(), id)
    }

    fn sync_linked(&self) {
        let Some(bridge) = &self.bridge else {
            return;
        };
        if !self.bridge_dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let entries = bridge.list_entries();
        let outcome = sync_linked_entry(&mut self.settings.borrow_mut(), &entries);
        if outcome.changed() {
            if let Err(e) = self.persist() {
                warn!("Failed to persist linked server settings: {:#}", e);
            }
        }
    }

    fn cancel_warmup(&self) {
        if let Some(id) = self.warmup.take() {
            self.scheduler.cancel(id);
        }
    }

    fn persist(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.settings.borrow()),
            None => Ok(()),
        }
    }
}

impl Drop for PickerSession {
    fn drop(&mut self) {
        self.renderer.cancel();
        self.cancel_warmup();
    }
}
