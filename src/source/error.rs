use thiserror::Error;

/// Why a source could not produce images. The `Display` text is what the
/// picker shows to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Image folder path is empty.")]
    EmptyFolderPath,

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Absolute folder paths must be inside the vault.")]
    OutsideVault,

    #[error("Absolute folder paths require a desktop environment.")]
    RequiresDesktop,

    #[error("Remote base URL is not configured.")]
    MissingBaseUrl,

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Failed to fetch the directory listing.")]
    ListingFetch,

    #[error("Failed to fetch the JSON index.")]
    IndexFetch,
}

impl ResolveError {
    /// Missing or invalid local folders let a linked source fall back to its server.
    pub fn is_local_folder_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyFolderPath | Self::FolderNotFound(_) | Self::OutsideVault | Self::RequiresDesktop
        )
    }
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
