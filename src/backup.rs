use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::store;

/// Conventional backup location next to the catalog: `<catalog>.backup`.
pub fn default_backup_path(catalog: &Path) -> PathBuf {
    let mut name = catalog
        .file_name()
        .map(|value| value.to_os_string())
        .unwrap_or_else(|| "catalog".into());
    name.push(".backup");
    catalog.with_file_name(name)
}

/// Copies `src` byte-for-byte to `backup`, deleting any earlier backup first so
/// the result never reflects a previous run.
pub(crate) fn backup_file(src: &Path, backup: &Path) -> Result<u64> {
    let metadata = fs::metadata(src)
        .with_context(|| format!("failed to read file metadata: {}", src.display()))?;
    if !metadata.is_file() {
        return Err(anyhow!("backup source is not a file: {}", src.display()));
    }

    match fs::remove_file(backup) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to remove stale backup: {}", backup.display()));
        }
    }
    if let Some(dir) = backup.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create backup dir: {}", dir.display()))?;
    }

    fs::copy(src, backup).with_context(|| {
        format!(
            "failed to copy backup from {} to {}",
            src.display(),
            backup.display()
        )
    })
}

/// Puts the backup content back in place of `dest` through an atomic rename.
pub(crate) fn restore_file(backup: &Path, dest: &Path) -> Result<()> {
    let bytes =
        fs::read(backup).with_context(|| format!("failed to read backup: {}", backup.display()))?;
    store::write_atomic(dest, &bytes)
        .with_context(|| format!("failed to restore {} from backup", dest.display()))
}
