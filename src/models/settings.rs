use serde::{Deserialize, Serialize};

use super::linked::{LinkedContext, Whitelist};

/// User configuration for the background picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackdropSettings {
    /// Vault-relative or absolute folder holding the images.
    pub image_folder: String,
    /// Base URL of a standalone HTTP image server.
    pub remote_base_url: String,
    pub auth_token: String,
    /// Ask the server for `__index.json` (falling back to an HTML listing).
    pub use_remote_index: bool,
    /// Resolve tiles against the server even when files exist locally.
    pub prefer_remote: bool,
    pub recursive_index: bool,
    /// Id of the linked server entry, if any.
    pub linked_entry_id: Option<String>,
    /// Relative path of the chosen image.
    pub selected_image: Option<String>,
    /// Whitelist overlay used when not linked.
    pub whitelist_enabled: bool,
    pub whitelist_files: Vec<String>,
}

impl Default for BackdropSettings {
    fn default() -> Self {
        Self {
            image_folder: String::new(),
            remote_base_url: String::new(),
            auth_token: String::new(),
            use_remote_index: false,
            prefer_remote: false,
            recursive_index: true,
            linked_entry_id: None,
            selected_image: None,
            whitelist_enabled: false,
            whitelist_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Local,
    Remote,
}

impl SourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Settings folded together with the linked context: everything the resolver
/// and the cache key look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSource {
    pub mode: SourceMode,
    pub base_url: String,
    pub auth_token: String,
    pub folder: String,
    pub whitelist: Whitelist,
    pub linked: bool,
    pub use_remote_index: bool,
    pub recursive: bool,
}

impl EffectiveSource {
    pub fn is_remote(&self) -> bool {
        self.mode == SourceMode::Remote
    }

    /// Base URL to build tile URLs from, only when remote URLs are wanted.
    pub fn remote_base(&self) -> Option<&str> {
        (self.is_remote() && !self.base_url.is_empty()).then_some(self.base_url.as_str())
    }
}

impl BackdropSettings {
    pub fn effective_source(&self, linked: Option<&LinkedContext>) -> EffectiveSource {
        let (base_url, auth_token, whitelist) = match linked {
            Some(ctx) => (
                ctx.base_url.trim().to_string(),
                ctx.auth_token.trim().to_string(),
                ctx.whitelist.clone(),
            ),
            None => (
                self.remote_base_url.trim().to_string(),
                self.auth_token.trim().to_string(),
                Whitelist::new(self.whitelist_enabled, self.whitelist_files.clone()),
            ),
        };

        // Any of these signals tips the picker into remote URLs.
        let remote = self.prefer_remote
            || linked.is_some()
            || !auth_token.is_empty()
            || self.use_remote_index;

        EffectiveSource {
            mode: if remote { SourceMode::Remote } else { SourceMode::Local },
            base_url,
            auth_token,
            folder: self.image_folder.trim().to_string(),
            whitelist,
            linked: linked.is_some(),
            use_remote_index: self.use_remote_index,
            recursive: self.recursive_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_by_default() {
        let settings = BackdropSettings {
            image_folder: " wallpapers ".into(),
            remote_base_url: "http://h".into(),
            ..Default::default()
        };
        let source = settings.effective_source(None);
        assert_eq!(source.mode, SourceMode::Local);
        assert_eq!(source.folder, "wallpapers");
        assert!(source.remote_base().is_none());
    }

    #[test]
    fn test_remote_signals() {
        let token = BackdropSettings {
            auth_token: "abc".into(),
            ..Default::default()
        };
        assert!(token.effective_source(None).is_remote());

        let index = BackdropSettings {
            use_remote_index: true,
            ..Default::default()
        };
        assert!(index.effective_source(None).is_remote());

        let ctx = LinkedContext {
            base_url: "http://nas:1".into(),
            auth_token: String::new(),
            whitelist: Whitelist::disabled(),
        };
        let linked = BackdropSettings::default().effective_source(Some(&ctx));
        assert!(linked.is_remote() && linked.linked);
        assert_eq!(linked.remote_base(), Some("http://nas:1"));
    }

    #[test]
    fn test_linked_whitelist_overrides_overlay() {
        let settings = BackdropSettings {
            whitelist_enabled: true,
            whitelist_files: vec!["a.png".into()],
            ..Default::default()
        };
        let ctx = LinkedContext {
            base_url: "http://nas:1".into(),
            auth_token: String::new(),
            whitelist: Whitelist::disabled(),
        };
        assert!(settings.effective_source(None).whitelist.enabled);
        assert!(!settings.effective_source(Some(&ctx)).whitelist.enabled);
    }

    #[test]
    fn test_settings_json_uses_defaults_for_missing_fields() {
        let parsed: BackdropSettings = serde_json::from_str(r#"{"imageFolder":"w"}"#).unwrap();
        assert_eq!(parsed.image_folder, "w");
        assert!(parsed.recursive_index);
        assert!(parsed.linked_entry_id.is_none());
    }
}
