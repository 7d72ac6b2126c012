//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--case-sensitive`, `--name-scope`, positional library path)
//! 2. `--config PATH`
//! 3. `$CTREE_CONFIG` environment variable (path to config file)
//! 4. Project-local `.ctree.toml` in the current working directory
//! 5. Global `~/.config/ctree/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::tree::sorter::Sorter;
use crate::tree::store::NameScope;
use crate::view::cache::FilterCase;

// ── Section configs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Library file opened when none is given on the command line.
    pub library_path: Option<String>,
    /// Enable mouse capture.
    pub mouse: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// "global" or "sibling".
    pub name_scope: Option<String>,
    /// Comparator chain for new containers, e.g. "kind,name" or "-created".
    pub sort_by: Option<String>,
    /// Whether newly created groups and folders start open.
    pub open_new_groups: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SelectionConfig {
    pub allow_multi: Option<bool>,
    pub allow_range: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "collection_tree=debug".
    pub level: Option<String>,
    /// Log file. Nothing is logged when unset.
    pub file: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tree: TreeConfig,
    pub filter: FilterConfig,
    pub selection: SelectionConfig,
    pub logging: LoggingConfig,
}

pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, without `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("CTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".ctree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ctree").join("config.toml"));
    }

    paths
}

/// Read and parse a config file. Returns `None` if the file doesn't exist or
/// can't be parsed (with a warning on stderr; logging is not up yet).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match AppConfig::from_toml(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<AppConfig> {
        Ok(toml::from_str(content)?)
    }

    // ── Merge logic ─────────────────────────────────────────────────────────

    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                library_path: other
                    .general
                    .library_path
                    .clone()
                    .or(self.general.library_path),
                mouse: other.general.mouse.or(self.general.mouse),
            },
            tree: TreeConfig {
                name_scope: other.tree.name_scope.clone().or(self.tree.name_scope),
                sort_by: other.tree.sort_by.clone().or(self.tree.sort_by),
                open_new_groups: other.tree.open_new_groups.or(self.tree.open_new_groups),
            },
            filter: FilterConfig {
                case_sensitive: other.filter.case_sensitive.or(self.filter.case_sensitive),
            },
            selection: SelectionConfig {
                allow_multi: other.selection.allow_multi.or(self.selection.allow_multi),
                allow_range: other.selection.allow_range.or(self.selection.allow_range),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
                file: other.logging.file.clone().or(self.logging.file),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn library_path(&self) -> Option<&str> {
        self.general.library_path.as_deref()
    }

    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(false)
    }

    /// Name-uniqueness scope. Unknown values fall back to global.
    pub fn name_scope(&self) -> NameScope {
        self.tree
            .name_scope
            .as_deref()
            .and_then(NameScope::parse)
            .unwrap_or_default()
    }

    /// Comparator chain for new containers. Empty means by name.
    pub fn default_sorter(&self) -> Sorter {
        self.tree
            .sort_by
            .as_deref()
            .map(Sorter::parse)
            .unwrap_or_default()
    }

    pub fn open_new_groups(&self) -> bool {
        self.tree.open_new_groups.unwrap_or(false)
    }

    pub fn filter_case(&self) -> FilterCase {
        if self.filter.case_sensitive.unwrap_or(false) {
            FilterCase::Sensitive
        } else {
            FilterCase::Insensitive
        }
    }

    pub fn allow_multi_select(&self) -> bool {
        self.selection.allow_multi.unwrap_or(true)
    }

    pub fn allow_range_select(&self) -> bool {
        self.selection.allow_range.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Option<&str> {
        self.logging.file.as_deref()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
