//! Config file discovery and loading for `folio.toml`.
//!
//! An explicitly named file must exist and parse. Without one, `./folio.toml` is
//! used when present; if it cannot be read or parsed the defaults apply.

use std::path::{Path, PathBuf};

use super::{ConfigError, Settings};

pub const CONFIG_FILENAME: &str = "folio.toml";

/// Settings ready to use, plus the reason the discovered config file was ignored.
///
/// Loading happens before logging is set up, so a rejected `./folio.toml` is
/// reported back here for the caller to log once a subscriber exists.
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub fallback: Option<ConfigError>,
}

/// Load settings from `explicit`, else from the discovered file, else defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<LoadedSettings, ConfigError> {
    load_from(explicit, find_config_file())
}

fn load_from(
    explicit: Option<&Path>,
    discovered: Option<PathBuf>,
) -> Result<LoadedSettings, ConfigError> {
    if let Some(path) = explicit {
        return read_settings(path).map(|settings| LoadedSettings {
            settings,
            fallback: None,
        });
    }

    let Some(path) = discovered else {
        return Ok(LoadedSettings {
            settings: Settings::default(),
            fallback: None,
        });
    };

    Ok(match read_settings(&path) {
        Ok(settings) => LoadedSettings {
            settings,
            fallback: None,
        },
        Err(e) => LoadedSettings {
            settings: Settings::default(),
            fallback: Some(e),
        },
    })
}

/// Project-local `folio.toml`, if present.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    local.is_file().then_some(local)
}

fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let settings = Settings::from_toml_str(&contents, path)?;
    tracing::debug!(?path, "Loaded config");

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(settings.rooted_at(base))
}
