use crate::core::{OutputFile, Storage};
use crate::utils::error::{IanaError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn write_error(path: &Path, source: std::io::Error) -> IanaError {
    IanaError::WriteError {
        path: path.display().to_string(),
        source,
    }
}

/// Output directory on the local filesystem.
///
/// Writes are staged as temporary files inside the directory and renamed over
/// their targets only after every file has been written and synced.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn stage(&self, base: &Path, file: &OutputFile) -> Result<(NamedTempFile, PathBuf)> {
        let target = base.join(&file.name);
        // 暫存檔與目標同目錄，rename 才是原子的
        let dir = target.parent().unwrap_or(base);
        fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| write_error(&target, e))?;

        staged
            .write_all(&file.contents)
            .map_err(|e| write_error(&target, e))?;

        // 暫存檔預設為 0600，發佈檔案需可被所有人讀取
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|e| write_error(&target, e))?;
        }

        staged
            .as_file()
            .sync_all()
            .map_err(|e| write_error(&target, e))?;

        Ok((staged, target))
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full_path = Path::new(&self.base_path).join(path);
        match fs::read(&full_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IanaError::IoError(e)),
        }
    }

    async fn write_files(&self, files: &[OutputFile]) -> Result<()> {
        let base = Path::new(&self.base_path);
        fs::create_dir_all(base).map_err(|e| write_error(base, e))?;

        // 先全部寫入暫存檔，失敗時暫存檔會在 drop 時刪除
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            staged.push(self.stage(base, file)?);
        }

        for (temp, target) in staged {
            temp.persist(&target)
                .map_err(|e| write_error(&target, e.error))?;
            tracing::debug!("Wrote {}", target.display());
        }

        Ok(())
    }
}
