// src/store/atomic.rs
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Pretty JSON written to `<path>.tmp`, synced, then renamed over `path`.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = tmp_path(path);

    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|source| {
        let _ = fs::remove_file(&tmp);
        PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;
    counter!("store_writes_total").increment(1);
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| PersistenceError::Decode {
            path: path.to_path_buf(),
            source,
        })
}
