use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{EtlError, EtlResult};

/// Processing directory that only lives as long as the guard. Creating it wipes leftovers of an
/// earlier run, dropping it removes the directory on every exit path.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(path: &Path) -> EtlResult<Self> {
        recreate_dir(path)?;
        log::debug!("Created processing directory {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create (if needed) and return a subdirectory.
    pub fn subdir(&self, name: &str) -> EtlResult<PathBuf> {
        let subdir = self.path.join(name);
        fs::create_dir_all(&subdir)?;
        Ok(subdir)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        log::info!("Cleaning up processing directory {:?}", self.path);
        if let Err(err) = fs::remove_dir_all(&self.path) {
            log::warn!("Could not remove processing directory {:?}: {}", self.path, err);
        }
    }
}

/// Remove a directory with all its contents if it exists and create it empty.
pub fn recreate_dir(path: &Path) -> EtlResult<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Files directly inside `dir` whose name ends with `suffix`, sorted by name.
pub fn list_files_with_suffix(dir: &Path, suffix: &str) -> EtlResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EtlError::ConfigMissing(format!(
            "Input directory {:?} not found",
            dir
        )));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
