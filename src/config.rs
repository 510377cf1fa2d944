//! JSON configuration and command-line resolution.
//!
//! Settings come from two sources: an optional `config.json` file and
//! `-name=value` flags on the command line. For every field the file value
//! wins when it is present and non-empty, otherwise the flag is used,
//! otherwise the documented default. A missing or malformed file is never
//! fatal: it behaves exactly like an empty file.
//!
//! ## Config file search order
//!
//! 1. `KIOSKSHELL_CONFIG` environment variable (explicit override)
//! 2. Current working directory (`./config.json`)
//! 3. Next to the executable (`<exe_dir>/config.json`)
//! 4. No file found → empty [`FileConfig`]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// File name looked up in the working directory and next to the executable.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "KIOSKSHELL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw sources
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of `config.json`. Every field is optional; unknown fields are kept
/// so they can be handed back to the front-end through `get-app-config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Comma-separated list of hidden features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileConfig {
    /// Loads the config file from the standard locations. Never fails —
    /// returns an empty config if no file is found or if parsing fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Invalid config file, using empty configuration");
                    Self::default()
                }
            },
            None => {
                info!("No config file found, using command-line flags only");
                Self::default()
            }
        }
    }

    /// Reads and parses one specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the record exposed to content through `get-app-config`: the
    /// file as written, with `theme` and `hide` replaced by the startup
    /// overrides when those are set.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> FileConfig {
        let mut view = self.clone();
        if overrides.theme.is_some() {
            view.theme = overrides.theme.clone();
        }
        if overrides.hide.is_some() {
            view.hide = overrides.hide.clone();
        }
        view
    }
}

/// Recognized `-name=value` command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliFlags {
    pub link: Option<String>,
    pub mode: Option<String>,
    pub window: Option<String>,
    pub page: Option<String>,
    pub hide: Option<String>,
    pub bg: Option<String>,
    pub theme: Option<String>,
}

impl CliFlags {
    /// Parses flags out of user arguments (program name already removed).
    /// The first occurrence of a flag wins; the value is everything after the
    /// first `=`, so URLs with query strings survive intact.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = CliFlags::default();
        for arg in args {
            let Some((name, value)) = arg.as_ref().split_once('=') else {
                continue;
            };
            let slot = match name {
                "-link" => &mut flags.link,
                "-mode" => &mut flags.mode,
                "-window" => &mut flags.window,
                "-page" => &mut flags.page,
                "-hide" => &mut flags.hide,
                "-bg" => &mut flags.bg,
                "-theme" => &mut flags.theme,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        flags
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved settings
// ─────────────────────────────────────────────────────────────────────────────

/// Set of feature names suppressed with `hide` (`control`, `mouse`, `scroll`,
/// or one of the panel button names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenFeatures(BTreeSet<String>);

impl HiddenFeatures {
    /// Splits a comma-separated list, trimming tokens and dropping empty ones.
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Comma-joined form, as written in the config file.
    pub fn to_list(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for HiddenFeatures {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Immutable settings for one process lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub start_url: Option<String>,
    pub fullscreen: bool,
    pub pinned: bool,
    pub single_page_mode: bool,
    pub hidden_features: HiddenFeatures,
    pub background_path: Option<String>,
    pub theme: Option<String>,
    /// The file record the settings were merged from.
    pub file: FileConfig,
}

impl Settings {
    /// Loads the config file and merges it over the process arguments.
    pub fn load(argv: &[String], is_packaged: bool) -> Self {
        let file = FileConfig::load();
        resolve(argv, is_packaged, file)
    }

    /// Override layer exposed to content (`get-app-config`).
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            theme: self.theme.clone(),
            hide: (!self.hidden_features.is_empty()).then(|| self.hidden_features.to_list()),
        }
    }
}

/// Mutable `theme` / `hide` layer applied on top of the file record when the
/// front-end asks for its configuration. Set once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub hide: Option<String>,
}

/// Merges a config file record over the command-line flags in `argv`.
///
/// `argv[0]` is the program. An unpackaged launch carries one extra launcher
/// argument before the user flags, which is skipped as well.
pub fn resolve(argv: &[String], is_packaged: bool, file: FileConfig) -> Settings {
    let skip = if is_packaged { 1 } else { 2 };
    let cli = CliFlags::parse(argv.iter().skip(skip));

    let pick = |from_file: &Option<String>, from_cli: &Option<String>| -> Option<String> {
        non_empty(from_file).or_else(|| non_empty(from_cli))
    };

    let mode = pick(&file.mode, &cli.mode);
    let window = pick(&file.window, &cli.window);
    let page = pick(&file.page, &cli.page);
    let hide = pick(&file.hide, &cli.hide);

    let settings = Settings {
        start_url: pick(&file.link, &cli.link),
        fullscreen: mode.as_deref() == Some("fullscreen"),
        pinned: window.as_deref() == Some("top"),
        single_page_mode: page.as_deref() == Some("single"),
        hidden_features: hide.as_deref().map(HiddenFeatures::parse).unwrap_or_default(),
        background_path: pick(&file.bg, &cli.bg),
        theme: pick(&file.theme, &cli.theme),
        file,
    };

    info!(
        start_url = ?settings.start_url,
        fullscreen = settings.fullscreen,
        pinned = settings.pinned,
        single_page_mode = settings.single_page_mode,
        hidden = %settings.hidden_features.to_list(),
        "Settings resolved"
    );

    settings
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Resolves the configured background image to an absolute `file://` URL.
///
/// Relative paths are taken from `base_dir`. Returns `None` when no path is
/// configured or the file does not exist.
pub fn resolve_background_path(bg: Option<&str>, base_dir: &Path) -> Option<String> {
    let bg = bg?.trim();
    if bg.is_empty() {
        return None;
    }

    let candidate = Path::new(bg);
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    if !absolute.is_file() {
        warn!(path = %absolute.display(), "Background image not found");
        return None;
    }

    let canonical = absolute.canonicalize().ok()?;
    Url::from_file_path(&canonical).ok().map(String::from)
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let p = cwd.join(CONFIG_FILE_NAME);
        if p.is_file() {
            return Some(p);
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join(CONFIG_FILE_NAME);
        if p.is_file() {
            return Some(p);
        }
    }

    None
}
