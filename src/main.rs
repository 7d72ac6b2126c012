mod app;
mod components;
mod event;
mod handler;
mod theme;
mod tui;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use ratatui::layout::Rect;
use tracing::info;
use tracing_subscriber::EnvFilter;

use collection_tree::config::{AppConfig, FilterConfig, GeneralConfig, TreeConfig};
use collection_tree::error::{AppError, Result};
use collection_tree::tree::NameScope;

use crate::app::App;
use crate::event::{Event, EventHandler};
use crate::theme::Palette;
use crate::tui::{install_panic_hook, Tui};

/// Browse and reorganize a collection of folders in the terminal.
#[derive(Parser, Debug)]
#[command(name = "ctree", version, about)]
struct Cli {
    /// Library file to open (created on save if missing)
    library: Option<PathBuf>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Match the filter case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Container-name uniqueness: "global" or "sibling"
    #[arg(long, value_name = "SCOPE")]
    name_scope: Option<String>,
}

impl Cli {
    /// Config overrides from flags. Unset flags leave the files in charge.
    fn overrides(&self) -> Result<AppConfig> {
        if let Some(scope) = &self.name_scope {
            if NameScope::parse(scope).is_none() {
                return Err(AppError::InvalidOperation(format!(
                    "unknown name scope '{scope}', expected global or sibling"
                )));
            }
        }
        Ok(AppConfig {
            general: GeneralConfig {
                library_path: self
                    .library
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                ..Default::default()
            },
            tree: TreeConfig {
                name_scope: self.name_scope.clone(),
                ..Default::default()
            },
            filter: FilterConfig {
                case_sensitive: self.case_sensitive.then_some(true),
            },
            ..Default::default()
        })
    }
}

/// Send logs to the configured file. The terminal belongs to the UI, so
/// without a file nothing is logged.
fn init_logging(config: &AppConfig) -> Result<()> {
    let Some(path) = config.log_file() else {
        return Ok(());
    };
    let file = File::options().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| AppError::Terminal(format!("cannot install logger: {e}")))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()?));
    init_logging(&config)?;

    let library = config.library_path().map(PathBuf::from);
    let mut app = App::from_config(&config, library.as_deref())?;
    info!(
        library = ?library,
        scope = config.name_scope().as_str(),
        "starting"
    );

    install_panic_hook();
    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let palette = Palette::default();
    let mut tree_area = Rect::default();

    loop {
        tui.terminal_mut().draw(|frame| {
            tree_area = ui::render(&mut app, frame, &palette);
        })?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(&mut app, mouse, tree_area),
            Event::Tick => app.clear_expired_status(),
            Event::Resize(_, _) => {}
        }

        if app.should_quit {
            break;
        }
    }

    tui.restore()?;
    info!("bye");
    Ok(())
}
