//! Unpacking of multi-operation aggregation payloads

use crate::error::{ExplorerError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Entries of a zip archive keyed by file stem (`mean.gri` -> `mean`)
pub fn unpack(payload: &Bytes) -> Result<HashMap<String, Bytes>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(payload.as_ref()))?;
    let mut entries = HashMap::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let stem = file_stem(file.name()).to_string();
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;
        if entries.insert(stem.clone(), Bytes::from(contents)).is_some() {
            return Err(ExplorerError::Archive(format!(
                "duplicate entry for {}",
                stem
            )));
        }
    }
    Ok(entries)
}

fn file_stem(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.split('.').next().unwrap_or(base)
}
