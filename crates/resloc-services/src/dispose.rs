use color_eyre::eyre::{eyre, WrapErr};
use resloc_core::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Removes a file in a way the user can undo.
pub trait Disposal {
    /// Returns where the file can be recovered from.
    fn dispose(&self, path: &Path) -> Result<PathBuf>;
}

/// Moves disposed files into `<trash>/<timestamp>/<path relative to base>`.
#[derive(Debug, Clone)]
pub struct TrashDir {
    trash: PathBuf,
    base: PathBuf,
}

impl TrashDir {
    pub fn new(trash: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self {
            trash: trash.into(),
            base: base.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.trash
    }

    fn target_for(&self, path: &Path, stamp: &str) -> Result<PathBuf> {
        let rel = match path.strip_prefix(&self.base) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => PathBuf::from(
                path.file_name()
                    .ok_or_else(|| eyre!("{} has no file name", path.display()))?,
            ),
        };
        let first = self.trash.join(stamp).join(&rel);
        let mut target = first.clone();
        let mut n = 1;
        while target.exists() {
            let mut name = first.as_os_str().to_os_string();
            name.push(format!(".{n}"));
            target = PathBuf::from(name);
            n += 1;
        }
        Ok(target)
    }
}

impl Disposal for TrashDir {
    fn dispose(&self, path: &Path) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let target = self.target_for(path, &stamp)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("cannot create trash folder {}", parent.display()))?;
        }
        if fs::rename(path, &target).is_err() {
            // rename fails across file systems
            fs::copy(path, &target).wrap_err_with(|| {
                format!("cannot move {} to {}", path.display(), target.display())
            })?;
            fs::remove_file(path)
                .wrap_err_with(|| format!("cannot remove {}", path.display()))?;
        }
        tracing::info!(event = "disposed", from = %path.display(), to = %target.display());
        Ok(target)
    }
}
