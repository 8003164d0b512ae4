//! User settings persisted as RON next to the downloads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use picker_engine::{AtomicFileWriter, ConflictAction, PersistError, UserSettings};
use picker_logging::{picker_info, picker_warn};

pub const SETTINGS_FILENAME: &str = ".media_picker.ron";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings from {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed settings in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error("cannot write settings: {0}")]
    Write(#[from] PersistError),
}

/// Missing file means defaults.
pub fn load_settings(path: &Path) -> Result<UserSettings, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            picker_warn!("no settings at {path:?}, using defaults");
            return Ok(UserSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let settings = ron::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    picker_info!("loaded settings from {path:?}");
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &UserSettings) -> Result<PathBuf, SettingsError> {
    let content = ron::ser::to_string_pretty(settings, ron::ser::PrettyConfig::new())?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| SETTINGS_FILENAME.to_string());
    let writer = AtomicFileWriter::new(dir).with_conflict_action(ConflictAction::Overwrite);
    Ok(writer.write(&filename, content.as_bytes())?)
}
