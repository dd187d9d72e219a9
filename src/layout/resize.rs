//! Collapses bursts of resize notifications into one layout pass per frame.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;

use super::grid::{best_layout, GridLayout};
use crate::render::{IdleScheduler, TaskId};

/// One display refresh at 60Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Tile shape the picker grid targets.
#[derive(Debug, Clone, Copy)]
pub struct GridParams {
    /// Width / height of a tile.
    pub aspect: f32,
    pub gap: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            aspect: 16.0 / 9.0,
            gap: 8.0,
        }
    }
}

type LayoutCallback = Box<dyn Fn(GridLayout)>;

struct BatcherState {
    scheduler: Rc<dyn IdleScheduler>,
    params: GridParams,
    size: Cell<(f32, f32)>,
    count: Cell<usize>,
    pending: Cell<Option<TaskId>>,
    last: Cell<Option<GridLayout>>,
    on_layout: LayoutCallback,
}

pub struct ResizeBatcher {
    state: Rc<BatcherState>,
}

impl ResizeBatcher {
    pub fn new(
        scheduler: Rc<dyn IdleScheduler>,
        params: GridParams,
        on_layout: impl Fn(GridLayout) + 'static,
    ) -> Self {
        Self {
            state: Rc::new(BatcherState {
                scheduler,
                params,
                size: Cell::new((0.0, 0.0)),
                count: Cell::new(0),
                pending: Cell::new(None),
                last: Cell::new(None),
                on_layout: Box::new(on_layout),
            }),
        }
    }

    pub fn notify_resize(&self, width: f32, height: f32) {
        self.state.size.set((width, height));
        request(&self.state);
    }

    pub fn set_count(&self, count: usize) {
        if self.state.count.replace(count) != count {
            request(&self.state);
        }
    }

    /// Recomputes right away, dropping any queued pass.
    pub fn flush(&self) -> GridLayout {
        if let Some(id) = self.state.pending.take() {
            self.state.scheduler.cancel(id);
        }
        recompute(&self.state)
    }

    pub fn last_layout(&self) -> Option<GridLayout> {
        self.state.last.get()
    }

    pub fn cancel(&self) {
        if let Some(id) = self.state.pending.take() {
            self.state.scheduler.cancel(id);
        }
    }
}

fn request(state: &Rc<BatcherState>) {
    if state.pending.get().is_some() {
        return;
    }
    let weak: Weak<BatcherState> = Rc::downgrade(state);
    let id = state.scheduler.schedule(
        FRAME_INTERVAL,
        Box::new(move || {
            if let Some(state) = weak.upgrade() {
                state.pending.set(None);
                recompute(&state);
            }
        }),
    );
    state.pending.set(Some(id));
}

fn recompute(state: &BatcherState) -> GridLayout {
    let (width, height) = state.size.get();
    let layout = best_layout(
        state.count.get(),
        width,
        height,
        state.params.aspect,
        state.params.gap,
    );
    trace!(columns = layout.columns, row_height = layout.row_height, "Grid layout");
    state.last.set(Some(layout));
    (state.on_layout)(layout);
    layout
}
