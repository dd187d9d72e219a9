pub mod grid;
pub mod resize;

pub use grid::{best_layout, GridLayout};
pub use resize::{GridParams, ResizeBatcher};
