use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::task::LocalSet;
use tracing::{debug, info};

use vault_backdrop::host::{LocalVault, ReqwestClient};
use vault_backdrop::layout::{best_layout, GridParams};
use vault_backdrop::models::BackdropSettings;
use vault_backdrop::render::scheduler::FALLBACK_DELAY;
use vault_backdrop::render::{select_scheduler, RenderStatus, Tile, TileSink};
use vault_backdrop::settings::{SettingsStore, SqliteSettingsStore};
use vault_backdrop::source::SourceResolver;
use vault_backdrop::{OpenOutcome, PickerSession};

#[derive(Parser, Debug)]
#[command(author, version, about = "List the background images a vault folder resolves to", long_about = None)]
struct Cli {
    /// Vault root directory
    vault: PathBuf,

    /// Image folder, relative to the vault or absolute inside it
    #[arg(short, long)]
    folder: Option<String>,

    /// Base URL of an HTTP image server
    #[arg(long)]
    base_url: Option<String>,

    /// Ask the server for its JSON index instead of scanning
    #[arg(long)]
    remote_index: bool,

    /// Only list the top level of the index
    #[arg(long)]
    flat: bool,

    /// Bearer token for the image server
    #[arg(long)]
    token: Option<String>,

    /// Use server URLs even for local files
    #[arg(long)]
    prefer_remote: bool,

    /// Mark this relative path as the selected background
    #[arg(long)]
    select: Option<String>,

    /// Grid container size used for the layout summary
    #[arg(long, default_value_t = 1280.0)]
    width: f32,

    #[arg(long, default_value_t = 720.0)]
    height: f32,

    /// Start from the stored settings instead of defaults
    #[arg(long)]
    stored: bool,

    /// Write the resulting settings back to the store
    #[arg(long)]
    save: bool,

    /// Settings database (defaults to the platform config directory)
    #[arg(long)]
    settings_db: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut BackdropSettings) {
        if let Some(folder) = &self.folder {
            settings.image_folder = folder.clone();
        }
        if let Some(base_url) = &self.base_url {
            settings.remote_base_url = base_url.clone();
        }
        if let Some(token) = &self.token {
            settings.auth_token = token.clone();
        }
        settings.use_remote_index |= self.remote_index;
        settings.prefer_remote |= self.prefer_remote;
        if self.flat {
            settings.recursive_index = false;
        }
    }
}

/// Prints tiles as the renderer appends them.
struct PrintSink;

impl TileSink for PrintSink {
    fn clear(&self) {}

    fn append(&self, tiles: Vec<Tile>) {
        for tile in tiles {
            let marker = if tile.selected { "*" } else { " " };
            println!(
                "{}{:>4}  {}  {}",
                marker, tile.index, tile.entry.relative_path, tile.entry.resolved_url
            );
        }
    }

    fn set_status(&self, status: RenderStatus) {
        debug!(?status, "Render status");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault_backdrop=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    LocalSet::new().block_on(&runtime, run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let store = if cli.stored || cli.save {
        let store = match &cli.settings_db {
            Some(path) => SqliteSettingsStore::open(path)?,
            None => SqliteSettingsStore::open_default()?,
        };
        Some(Rc::new(store))
    } else {
        None
    };

    let mut settings = match (&store, cli.stored) {
        (Some(store), true) => store.load()?,
        _ => BackdropSettings::default(),
    };
    cli.apply(&mut settings);

    let vault = Arc::new(LocalVault::open(&cli.vault)?);
    let http = Arc::new(ReqwestClient::new()?);
    let resolver = SourceResolver::new(vault, http);

    let mut session =
        PickerSession::new(resolver, select_scheduler(None), Rc::new(PrintSink), settings);
    if let (Some(store), true) = (&store, cli.save) {
        session = session.with_store(store.clone());
    }

    let count = match session.open().await {
        OpenOutcome::Rendered { count } => count,
        OpenOutcome::Empty => {
            info!("No images found");
            0
        }
        OpenOutcome::Failed(message) => return Err(anyhow!(message)),
        OpenOutcome::Superseded => 0,
    };
    while session.renderer().is_rendering() {
        tokio::time::sleep(FALLBACK_DELAY).await;
    }

    if let Some(path) = &cli.select {
        if !session.select(path)? {
            return Err(anyhow!("Not among the resolved images: {}", path));
        }
        if let Some(entry) = session.selected_entry() {
            println!("selected: {}", entry.resolved_url);
        }
    }

    let params = GridParams::default();
    let layout = best_layout(count, cli.width, cli.height, params.aspect, params.gap);
    println!(
        "{} images, {} columns, row height {:.1}px",
        count, layout.columns, layout.row_height
    );

    if let (Some(store), true) = (&store, cli.save) {
        store.save(&session.settings())?;
        info!("Settings saved");
    }
    session.dispose();
    Ok(())
}
