//! File names derived from wire identifiers.

use std::path::{Path, PathBuf};

use ferroas2_core::validation::make_file_name;

use crate::traits::{StorageError, StorageResult};

/// Sanitised file name for `key`, with `suffix` appended. Fails when nothing usable
/// is left after sanitising.
pub fn file_name_for(key: &str, suffix: &str) -> StorageResult<String> {
    let name = make_file_name(key);
    if name.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "'{}' does not contain any usable file name characters",
            key
        )));
    }
    Ok(format!("{}{}", name, suffix))
}

/// `dir/name` if free, otherwise the first free `dir/name.N` for N = 1, 2, ...
pub async fn unique_path(dir: &Path, name: &str) -> StorageResult<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let mut suffix: u32 = 1;
    loop {
        let candidate = dir.join(format!("{}.{}", name, suffix));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}
