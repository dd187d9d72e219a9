pub mod image_entry;
pub mod linked;
pub mod settings;

pub use image_entry::*;
pub use linked::*;
pub use settings::*;
