use crate::core::models::ids::AtomId;
use crate::engine::config::ExecutionConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// Hands out one scratch directory per fragment.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: Option<PathBuf>,
    keep: bool,
}

impl WorkspaceRoot {
    /// A relative work directory is resolved against the current directory,
    /// since tools run with their fragment directory as working directory.
    pub fn new(execution: &ExecutionConfig) -> io::Result<Self> {
        let root = match &execution.work_dir {
            Some(root) => {
                fs::create_dir_all(root)?;
                Some(std::path::absolute(root)?)
            }
            None => {
                if execution.keep_fragment_files {
                    warn!("Fragment files are only kept when a work directory is configured.");
                }
                None
            }
        };
        Ok(Self {
            keep: execution.keep_fragment_files && root.is_some(),
            root,
        })
    }

    /// Creates the directory for the fragment centered on `center`.
    ///
    /// Under a configured root the directory is `fragment_<index>` and is
    /// recreated empty if it already exists.
    pub fn fragment(&self, center: AtomId) -> io::Result<FragmentWorkspace> {
        match &self.root {
            Some(root) => {
                let path = root.join(format!("fragment_{:06}", center.index()));
                if path.exists() {
                    fs::remove_dir_all(&path)?;
                }
                fs::create_dir_all(&path)?;
                Ok(FragmentWorkspace {
                    path,
                    remove_on_drop: !self.keep,
                    temp: None,
                })
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(&format!("fragcharge-{}-", center.index()))
                    .tempdir()?;
                Ok(FragmentWorkspace {
                    path: temp.path().to_path_buf(),
                    remove_on_drop: false,
                    temp: Some(temp),
                })
            }
        }
    }
}

/// A fragment's scratch directory; cleaned up on drop unless kept.
#[derive(Debug)]
pub struct FragmentWorkspace {
    path: PathBuf,
    remove_on_drop: bool,
    temp: Option<TempDir>,
}

impl FragmentWorkspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_kept(&self) -> bool {
        !self.remove_on_drop && self.temp.is_none()
    }
}

impl Drop for FragmentWorkspace {
    fn drop(&mut self) {
        if self.remove_on_drop {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
