//! SQLite-backed persistence for picker settings.
//!
//! Settings live in a small key/value table; each value is a JSON document.
//! The database sits in the platform config directory unless a path is given.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::models::BackdropSettings;

/// Key the picker settings are stored under.
pub const SETTINGS_KEY: &str = "backdrop";

const DB_FILE: &str = "settings.db";

/// Load/save seam for the picker's configuration.
pub trait SettingsStore {
    fn load(&self) -> Result<BackdropSettings>;

    fn save(&self, settings: &BackdropSettings) -> Result<()>;
}

pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Opens or creates the settings database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open settings database at {:?}", path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
            ",
        )
        .context("Failed to initialize settings database")?;

        info!("Opened settings store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens the store in the platform config directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "vault-backdrop")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join(DB_FILE))
    }

    /// Raw JSON stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read setting {}", key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("Failed to write setting {}", key))?;
        Ok(())
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<BackdropSettings> {
        match self.get(SETTINGS_KEY)? {
            Some(json) => serde_json::from_str(&json).context("Failed to parse stored settings"),
            None => {
                debug!("No stored settings, using defaults");
                Ok(BackdropSettings::default())
            }
        }
    }

    fn save(&self, settings: &BackdropSettings) -> Result<()> {
        let json = serde_json::to_string(settings).context("Failed to serialize settings")?;
        self.set(SETTINGS_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_settings_are_defaults() {
        let dir = tempdir().unwrap();
        let store = SqliteSettingsStore::open(&dir.path().join("s.db")).unwrap();
        assert_eq!(store.load().unwrap(), BackdropSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("s.db");
        let settings = BackdropSettings {
            image_folder: "wallpapers".into(),
            remote_base_url: "http://nas:9000".into(),
            selected_image: Some("sub/a.png".into()),
            whitelist_enabled: true,
            whitelist_files: vec!["a.png".into()],
            ..Default::default()
        };

        {
            let store = SqliteSettingsStore::open(&path).unwrap();
            store.save(&settings).unwrap();
            store.save(&settings).unwrap();
        }

        let store = SqliteSettingsStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let dir = tempdir().unwrap();
        let store = SqliteSettingsStore::open(&dir.path().join("s.db")).unwrap();
        store
            .set(SETTINGS_KEY, r#"{"imageFolder":"bg","preferRemote":true}"#)
            .unwrap();

        let settings = store.load().unwrap();
        assert_eq!(settings.image_folder, "bg");
        assert!(settings.prefer_remote);
        assert!(settings.recursive_index);
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let dir = tempdir().unwrap();
        let store = SqliteSettingsStore::open(&dir.path().join("s.db")).unwrap();
        store.set(SETTINGS_KEY, "not json").unwrap();
        assert!(store.load().is_err());
    }
}
