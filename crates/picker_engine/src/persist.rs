use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid target filename {0:?}")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// What to do when the target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAction {
    /// Pick `name (1).ext`, `name (2).ext`, ...
    #[default]
    Uniquify,
    Overwrite,
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Writes whole files into one directory via temp file and rename, so a
/// reader never sees a partial download.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
    conflict: ConflictAction,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            conflict: ConflictAction::default(),
        }
    }

    pub fn with_conflict_action(mut self, conflict: ConflictAction) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(PersistError::InvalidName(filename.to_string()));
        }
        ensure_output_dir(&self.dir)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        match self.conflict {
            ConflictAction::Overwrite => {
                let target = self.dir.join(filename);
                tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
                Ok(target)
            }
            ConflictAction::Uniquify => {
                let mut tmp = tmp;
                let mut attempt = 0usize;
                loop {
                    let target = self.dir.join(uniquified(filename, attempt));
                    match tmp.persist_noclobber(&target) {
                        Ok(_) => return Ok(target),
                        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                            tmp = err.file;
                            attempt += 1;
                        }
                        Err(err) => return Err(PersistError::Io(err.error)),
                    }
                }
            }
        }
    }
}

fn uniquified(filename: &str, attempt: usize) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{filename} ({attempt})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniquified_names_keep_extension() {
        assert_eq!(uniquified("a.jpg", 0), "a.jpg");
        assert_eq!(uniquified("a.jpg", 2), "a (2).jpg");
        assert_eq!(uniquified("README", 1), "README (1)");
    }
}
