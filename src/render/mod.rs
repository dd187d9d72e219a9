//! Incremental grid rendering.
//!
//! This module provides:
//! - `IdleScheduler` - deferred work, idle-priority or fixed-delay
//! - `ProgressiveRenderer` - token-guarded batch rendering into a `TileSink`

pub mod progressive;
pub mod scheduler;

pub use progressive::{
    LoadPriority, ProgressiveRenderer, RenderConfig, RenderStatus, Tile, TileSink,
};
pub use scheduler::{
    select_scheduler, FixedDelayScheduler, IdleQueue, IdleScheduler, IdleTask, TaskId,
};
