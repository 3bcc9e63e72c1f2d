//! File naming for sorted runs.
//!
//! Every run is one file named `L<level>R<run>.sst` in the engine's
//! directory. There is no manifest: the set of file names *is* the level
//! layout, and reopening an engine rebuilds it from a directory listing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::RunId;

/// Suffix of every run file written by the engine.
pub const TABLE_FILE_SUFFIX: &str = ".sst";

/// Appended to a run's name while it is being written.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// File name for a run, e.g. `L0R7.sst`.
pub fn table_file_name(id: RunId) -> String {
    format!("L{}R{}{}", id.level, id.run, TABLE_FILE_SUFFIX)
}

/// Full path of a run's file inside `dir`.
pub fn table_path(dir: &Path, id: RunId) -> PathBuf {
    dir.join(table_file_name(id))
}

/// Where a table is written before it is renamed to `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

/// Parse `L<level>R<run>` with an optional `.sst` suffix.
/// Anything else (temp files, stray user files) is `None`.
pub fn parse_table_file_name(name: &str) -> Option<RunId> {
    let stem = name.strip_suffix(TABLE_FILE_SUFFIX).unwrap_or(name);
    let rest = stem.strip_prefix('L')?;
    let (level, run) = rest.split_once('R')?;
    Some(RunId::new(parse_decimal(level)?, parse_decimal(run)?))
}

fn parse_decimal<T: std::str::FromStr>(digits: &str) -> Option<T> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List every run file in `dir`, sorted by (level, run).
pub fn scan_dir(dir: &Path) -> Result<Vec<(RunId, PathBuf)>> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(parse_table_file_name) {
            runs.push((id, entry.path()));
        }
    }
    runs.sort_by_key(|(id, _)| *id);
    Ok(runs)
}

/// Delete the unfinished tables (`L<l>R<r>.sst.tmp`) a crash left in `dir`.
/// Returns how many were removed.
pub fn remove_temp_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let unfinished = name
            .to_str()
            .and_then(|n| n.strip_suffix(TEMP_FILE_SUFFIX))
            .filter(|n| n.ends_with(TABLE_FILE_SUFFIX))
            .and_then(parse_table_file_name)
            .is_some();
        if unfinished {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Make file creations and deletions in `dir` durable.
pub fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    fs::File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
