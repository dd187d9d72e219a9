pub mod store;
pub mod sync;

pub use store::{SettingsStore, SqliteSettingsStore};
pub use sync::{sync_linked_entry, SyncOutcome};
