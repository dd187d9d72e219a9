//! Progressive rendering of a resolved image list into the picker grid.
//!
//! Tiles are appended in bounded slices, one slice per idle callback, so a
//! large folder never blocks the UI thread. Every pass carries the render
//! token it was started with; a slice whose token is no longer current does
//! nothing.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use super::scheduler::{IdleScheduler, TaskId};
use crate::models::{ImageEntry, ResolutionResult};

/// Tiles appended per idle slice.
pub const BATCH_SIZE: usize = 24;

/// Tiles that load their image eagerly; the rest load lazily.
pub const EAGER_TILES: usize = 12;

/// Upper bound on how long a slice may wait for an idle period.
pub const BATCH_IDLE_TIMEOUT: Duration = Duration::from_millis(120);

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub batch_size: usize,
    pub eager_count: usize,
    pub idle_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            eager_count: EAGER_TILES,
            idle_timeout: BATCH_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPriority {
    Eager,
    Lazy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub index: usize,
    pub entry: ImageEntry,
    pub priority: LoadPriority,
    pub selected: bool,
}

/// What the status line under the grid should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    Loading,
    Progress { rendered: usize, total: usize },
    /// Pass finished; the indicator is cleared.
    Complete,
    /// Resolution succeeded but found nothing.
    Empty,
    Failed(String),
}

/// The grid the renderer draws into.
pub trait TileSink {
    fn clear(&self);
    fn append(&self, tiles: Vec<Tile>);
    fn set_status(&self, status: RenderStatus);
}

struct RenderQueue {
    items: Rc<[ImageEntry]>,
    cursor: usize,
    token: u64,
}

struct RendererState {
    scheduler: Rc<dyn IdleScheduler>,
    sink: Rc<dyn TileSink>,
    config: RenderConfig,
    token: Cell<u64>,
    queue: RefCell<Option<RenderQueue>>,
    pending: Cell<Option<TaskId>>,
    selected: RefCell<Option<String>>,
}

pub struct ProgressiveRenderer {
    state: Rc<RendererState>,
}

impl ProgressiveRenderer {
    pub fn new(
        scheduler: Rc<dyn IdleScheduler>,
        sink: Rc<dyn TileSink>,
        config: RenderConfig,
    ) -> Self {
        Self {
            state: Rc::new(RendererState {
                scheduler,
                sink,
                config,
                token: Cell::new(0),
                queue: RefCell::new(None),
                pending: Cell::new(None),
                selected: RefCell::new(None),
            }),
        }
    }

    pub fn token(&self) -> u64 {
        self.state.token.get()
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.state.token.get() == token
    }

    /// Invalidates every pass started so far and returns the new token.
    pub fn advance_token(&self) -> u64 {
        let token = self.state.token.get() + 1;
        self.state.token.set(token);
        token
    }

    pub fn is_rendering(&self) -> bool {
        self.state.queue.borrow().is_some()
    }

    pub fn set_selected(&self, relative_path: Option<String>) {
        *self.state.selected.borrow_mut() = relative_path;
    }

    pub fn show_loading(&self, token: u64) {
        if self.is_current(token) {
            self.state.sink.set_status(RenderStatus::Loading);
        }
    }

    /// Shows a resolution result: the error, the empty state, or the tiles.
    pub fn present(&self, result: &ResolutionResult, token: u64) -> bool {
        if !self.is_current(token) {
            trace!(token, "Ignoring result for superseded pass");
            return false;
        }
        if let Some(message) = &result.error {
            self.state.queue.replace(None);
            self.state.sink.clear();
            self.state.sink.set_status(RenderStatus::Failed(message.clone()));
            return true;
        }
        self.start_render(result.items.clone(), token)
    }

    /// Installs a new render queue and schedules its first slice.
    pub fn start_render(&self, items: Vec<ImageEntry>, token: u64) -> bool {
        if !self.is_current(token) {
            trace!(token, current = self.token(), "Ignoring stale render request");
            return false;
        }
        let state = &self.state;
        state.sink.clear();
        if items.is_empty() {
            state.queue.replace(None);
            state.sink.set_status(RenderStatus::Empty);
            return true;
        }

        let total = items.len();
        debug!(total, token, "Starting progressive render");
        state.queue.replace(Some(RenderQueue {
            items: items.into(),
            cursor: 0,
            token,
        }));
        state.sink.set_status(RenderStatus::Progress { rendered: 0, total });
        schedule_slice(state, token);
        true
    }

    /// Stops the current pass. Returns the new token.
    pub fn cancel(&self) -> u64 {
        let token = self.advance_token();
        self.state.queue.replace(None);
        if let Some(id) = self.state.pending.take() {
            self.state.scheduler.cancel(id);
        }
        token
    }
}

fn schedule_slice(state: &Rc<RendererState>, token: u64) {
    let weak: Weak<RendererState> = Rc::downgrade(state);
    let id = state.scheduler.schedule(
        state.config.idle_timeout,
        Box::new(move || {
            if let Some(state) = weak.upgrade() {
                run_slice(&state, token);
            }
        }),
    );
    state.pending.set(Some(id));
}

fn run_slice(state: &Rc<RendererState>, token: u64) {
    if state.token.get() != token {
        trace!(token, "Dropping slice of superseded pass");
        let mut queue = state.queue.borrow_mut();
        if queue.as_ref().is_some_and(|q| q.token == token) {
            *queue = None;
        }
        return;
    }
    state.pending.set(None);

    let (tiles, rendered, total) = {
        let mut guard = state.queue.borrow_mut();
        let Some(queue) = guard.as_mut().filter(|q| q.token == token) else {
            return;
        };
        let selected = state.selected.borrow();
        let end = (queue.cursor + state.config.batch_size.max(1)).min(queue.items.len());
        let tiles: Vec<Tile> = (queue.cursor..end)
            .map(|index| {
                let entry = queue.items[index].clone();
                Tile {
                    index,
                    selected: selected.as_deref() == Some(entry.relative_path.as_str()),
                    priority: if index < state.config.eager_count {
                        LoadPriority::Eager
                    } else {
                        LoadPriority::Lazy
                    },
                    entry,
                }
            })
            .collect();
        queue.cursor = end;
        let total = queue.items.len();
        if end >= total {
            *guard = None;
        }
        (tiles, end, total)
    };

    trace!(rendered, total, "Rendered slice");
    state.sink.append(tiles);
    if rendered >= total {
        state.sink.set_status(RenderStatus::Complete);
    } else {
        state.sink.set_status(RenderStatus::Progress { rendered, total });
        schedule_slice(state, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scheduler::IdleQueue;

    #[derive(Default)]
    struct RecordingSink {
        tiles: RefCell<Vec<Tile>>,
        statuses: RefCell<Vec<RenderStatus>>,
        appends: Cell<usize>,
    }

    impl TileSink for RecordingSink {
        fn clear(&self) {
            self.tiles.borrow_mut().clear();
        }

        fn append(&self, tiles: Vec<Tile>) {
            self.appends.set(self.appends.get() + 1);
            self.tiles.borrow_mut().extend(tiles);
        }

        fn set_status(&self, status: RenderStatus) {
            self.statuses.borrow_mut().push(status);
        }
    }

    impl RecordingSink {
        fn last_status(&self) -> Option<RenderStatus> {
            self.statuses.borrow().last().cloned()
        }

        fn paths(&self) -> Vec<String> {
            self.tiles
                .borrow()
                .iter()
                .map(|t| t.entry.relative_path.clone())
                .collect()
        }
    }

    fn items(prefix: &str, n: usize) -> Vec<ImageEntry> {
        (0..n)
            .map(|i| {
                let name = format!("{}{:03}.png", prefix, i);
                ImageEntry::new(name.clone(), name.clone(), format!("app://{}", name))
            })
            .collect()
    }

    fn setup() -> (ProgressiveRenderer, Rc<IdleQueue>, Rc<RecordingSink>) {
        let queue = Rc::new(IdleQueue::new());
        let sink = Rc::new(RecordingSink::default());
        let renderer = ProgressiveRenderer::new(queue.clone(), sink.clone(), RenderConfig::default());
        (renderer, queue, sink)
    }

    #[test]
    fn test_renders_in_batches() {
        let (renderer, queue, sink) = setup();
        let token = renderer.advance_token();
        assert!(renderer.start_render(items("a", 60), token));
        assert!(sink.tiles.borrow().is_empty());

        queue.run_idle();
        assert_eq!(sink.tiles.borrow().len(), 24);
        assert_eq!(sink.last_status(), Some(RenderStatus::Progress { rendered: 24, total: 60 }));

        queue.run_idle();
        queue.run_idle();
        assert_eq!(sink.tiles.borrow().len(), 60);
        assert_eq!(sink.appends.get(), 3);
        assert_eq!(sink.last_status(), Some(RenderStatus::Complete));
        assert!(!renderer.is_rendering());
        assert!(queue.is_empty());

        let expected: Vec<String> = items("a", 60).into_iter().map(|e| e.relative_path).collect();
        assert_eq!(sink.paths(), expected);
    }

    #[test]
    fn test_first_tiles_load_eagerly() {
        let (renderer, queue, sink) = setup();
        let token = renderer.advance_token();
        renderer.start_render(items("a", 30), token);
        queue.run_idle();
        queue.run_idle();

        let tiles = sink.tiles.borrow();
        assert!(tiles[..12].iter().all(|t| t.priority == LoadPriority::Eager));
        assert!(tiles[12..].iter().all(|t| t.priority == LoadPriority::Lazy));
    }

    #[test]
    fn test_new_pass_supersedes_old_slices() {
        let (renderer, queue, sink) = setup();
        let first = renderer.advance_token();
        renderer.start_render(items("old", 60), first);
        queue.run_idle();
        assert_eq!(sink.tiles.borrow().len(), 24);

        // The old pass's next slice is still queued.
        let second = renderer.advance_token();
        renderer.start_render(items("new", 5), second);
        assert_eq!(queue.len(), 2);

        queue.run_idle();
        assert_eq!(sink.paths(), items("new", 5).into_iter().map(|e| e.relative_path).collect::<Vec<_>>());
        assert_eq!(sink.last_status(), Some(RenderStatus::Complete));
        queue.run_idle();
        assert_eq!(sink.tiles.borrow().len(), 5);
    }

    #[test]
    fn test_stale_start_is_ignored() {
        let (renderer, queue, sink) = setup();
        let stale = renderer.advance_token();
        renderer.advance_token();
        assert!(!renderer.start_render(items("a", 3), stale));
        assert!(queue.is_empty());
        assert!(sink.statuses.borrow().is_empty());
    }

    #[test]
    fn test_token_advances_by_exactly_n() {
        let (renderer, _, _) = setup();
        let start = renderer.token();
        for _ in 0..7 {
            renderer.advance_token();
        }
        renderer.cancel();
        assert_eq!(renderer.token(), start + 8);
    }

    #[test]
    fn test_cancel_drops_pending_slice() {
        let (renderer, queue, sink) = setup();
        let token = renderer.advance_token();
        renderer.start_render(items("a", 30), token);
        renderer.cancel();
        assert!(queue.is_empty());
        assert!(!renderer.is_rendering());
        queue.run_idle();
        assert!(sink.tiles.borrow().is_empty());
    }

    #[test]
    fn test_present_distinguishes_empty_and_error() {
        let (renderer, _, sink) = setup();
        let token = renderer.advance_token();
        renderer.present(&ResolutionResult::found(Vec::new()), token);
        assert_eq!(sink.last_status(), Some(RenderStatus::Empty));

        renderer.present(&ResolutionResult::failed("Folder not found: w"), token);
        assert_eq!(
            sink.last_status(),
            Some(RenderStatus::Failed("Folder not found: w".into()))
        );
        assert!(!renderer.is_rendering());
    }

    #[test]
    fn test_selected_tile_is_marked() {
        let (renderer, queue, sink) = setup();
        renderer.set_selected(Some("a001.png".into()));
        let token = renderer.advance_token();
        renderer.start_render(items("a", 3), token);
        queue.run_idle();
        let selected: Vec<bool> = sink.tiles.borrow().iter().map(|t| t.selected).collect();
        assert_eq!(selected, vec![false, true, false]);
    }
}
