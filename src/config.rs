use crate::keys::VirtualKey;
use crate::overlay::Opacity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

/// Settings stored in `settings.json` next to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Image to show, relative to the working directory unless absolute
    pub image_name: String,
    /// Overlay opacity in percent (0-100)
    pub image_transparency: u8,
    pub key_for_show: VirtualKey,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_name: "hint.png".into(),
            image_transparency: 90,
            key_for_show: VirtualKey::F8,
        }
    }
}

impl Settings {
    pub fn image_path(&self) -> PathBuf {
        PathBuf::from(&self.image_name)
    }

    pub fn opacity(&self) -> Opacity {
        Opacity::saturating(self.image_transparency)
    }

    fn validate(&self, path: &Path) -> Result<(), SettingsError> {
        if Opacity::from_percent(self.image_transparency).is_none() {
            return Err(SettingsError::Invalid {
                path: path.to_path_buf(),
                reason: format!(
                    "image_transparency must be between 0 and 100, got {}",
                    self.image_transparency
                ),
            });
        }
        if self.image_name.trim().is_empty() {
            return Err(SettingsError::Invalid {
                path: path.to_path_buf(),
                reason: "image_name is empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{} is not valid settings JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{} contains an invalid value: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("could not save {}: {source}", .path.display())]
    Save { path: PathBuf, source: io::Error },
}

impl SettingsError {
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn is_save(&self) -> bool {
        matches!(self, SettingsError::Save { .. })
    }
}

/// Result of the startup load: the settings to run with plus anything the
/// user should be warned about.
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub warnings: Vec<SettingsError>,
}

pub fn settings_path() -> PathBuf {
    PathBuf::from(SETTINGS_FILE)
}

/// Read settings from `path`. Returns `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<Settings>, SettingsError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let settings: Settings =
        serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    settings.validate(path)?;
    Ok(Some(settings))
}

pub fn save(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let save_err = |source: io::Error| SettingsError::Save {
        path: path.to_path_buf(),
        source,
    };
    let data = serde_json::to_string_pretty(settings).map_err(|e| save_err(e.into()))?;
    fs::write(path, data + "\n").map_err(save_err)
}

/// Load settings for this run. A missing file is created with the defaults;
/// a broken file is left untouched and the defaults are used instead.
pub fn load_or_init(path: &Path) -> LoadedSettings {
    match load(path) {
        Ok(Some(settings)) => {
            tracing::info!(path = %path.display(), "settings loaded");
            LoadedSettings {
                settings,
                warnings: Vec::new(),
            }
        }
        Ok(None) => {
            let settings = Settings::default();
            let warnings = match save(path, &settings) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "wrote default settings");
                    Vec::new()
                }
                Err(err) => vec![err],
            };
            LoadedSettings { settings, warnings }
        }
        Err(err) => LoadedSettings {
            settings: Settings::default(),
            warnings: vec![err],
        },
    }
}
