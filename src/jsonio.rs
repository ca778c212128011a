// src/jsonio.rs
//! Whole-document JSON read/write shared by the corpus and the file log store.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read and parse a JSON document. `Ok(None)` when the file does not exist.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DocError> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DocError::Io(e)),
    };
    serde_json::from_str(&raw).map(Some).map_err(DocError::Parse)
}

/// Serialize with 4-space indentation and replace `path` via a sibling temp file.
pub(crate) fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), DocError> {
    let mut buf = Vec::with_capacity(4096);
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    doc.serialize(&mut ser).map_err(DocError::Parse)?;
    buf.push(b'\n');

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(DocError::Io)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, &buf).map_err(DocError::Io)?;
    fs::rename(&tmp, path).map_err(DocError::Io)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Debug)]
pub(crate) enum DocError {
    Io(io::Error),
    Parse(serde_json::Error),
}
