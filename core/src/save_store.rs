use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Extension appended to the ROM file name for its save slot
pub const SAVE_EXTENSION: &str = "sav";

#[derive(Debug, thiserror::Error)]
pub enum SaveStoreError {
    #[error("I/O error on save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt save file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Single durable save slot holding one JSON-encoded snapshot
#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Slot for `rom` inside `saves_dir`: `<saves_dir>/<rom file name>.sav`
    pub fn for_rom(saves_dir: &Path, rom: &Path) -> Self {
        let mut name = rom
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("rom"));
        name.push(".");
        name.push(SAVE_EXTENSION);
        Self::new(saves_dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the slot. A missing file is `Ok(None)`; anything unreadable is an error.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, SaveStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SaveStoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Overwrite the slot with `snapshot`.
    ///
    /// Written to a sibling `.tmp` file first and renamed over the slot, so a
    /// crash mid-write leaves the previous save intact.
    pub fn save<T: Serialize>(&self, snapshot: &T) -> Result<(), SaveStoreError> {
        let out = serde_json::to_vec(snapshot).map_err(|source| SaveStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        self.write_atomic(&out).map_err(|e| self.io_error(e))
    }

    fn write_atomic(&self, out: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = match self.path.file_name() {
            Some(name) => {
                let mut tmp_name = OsString::from(name);
                tmp_name.push(".tmp");
                self.path.with_file_name(tmp_name)
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "save store path has no file name",
                ));
            }
        };

        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(out)?;
            f.sync_all()?;
        }

        #[cfg(windows)]
        {
            if self.path.exists() {
                // Windows rename fails if destination exists.
                fs::remove_file(&self.path)?;
            }
        }

        fs::rename(&tmp_path, &self.path)
    }

    fn io_error(&self, source: io::Error) -> SaveStoreError {
        SaveStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
