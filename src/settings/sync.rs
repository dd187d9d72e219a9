use tracing::{debug, info};

use crate::models::{BackdropSettings, LinkedServerEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Updated,
    /// The linked entry disappeared and the link was cleared.
    Unlinked,
}

impl SyncOutcome {
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }
}

/// Copies the linked entry's connection details into `settings`.
///
/// The stored base URL and token mirror the entry so the picker keeps working
/// with the last known server if the bridge goes away.
pub fn sync_linked_entry(
    settings: &mut BackdropSettings,
    entries: &[LinkedServerEntry],
) -> SyncOutcome {
    let Some(id) = settings.linked_entry_id.clone() else {
        return SyncOutcome::Unchanged;
    };

    let Some(entry) = entries.iter().find(|e| e.id == id) else {
        info!(id = %id, "Linked server entry removed, unlinking");
        settings.linked_entry_id = None;
        return SyncOutcome::Unlinked;
    };

    let base_url = entry.base_url();
    let token = entry.auth_token.trim().to_string();
    if settings.remote_base_url == base_url && settings.auth_token == token {
        return SyncOutcome::Unchanged;
    }

    debug!(id = %id, base_url = %base_url, "Linked server entry changed");
    settings.remote_base_url = base_url;
    settings.auth_token = token;
    SyncOutcome::Updated
}
