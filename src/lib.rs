//! Image source resolution for a vault background picker.
//!
//! Finds candidate background images in a vault folder, an HTTP image server
//! or a linked server, caches the result, and feeds it to the picker grid in
//! idle-time batches.

pub mod cache;
pub mod host;
pub mod layout;
pub mod models;
pub mod picker;
pub mod render;
pub mod settings;
pub mod source;

#[cfg(test)]
mod testing;

pub use picker::{OpenOutcome, PickerSession};
