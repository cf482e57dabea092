use log::{debug, error, warn};
use std::{
    io,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::net::UnixListener;

#[derive(Error, Debug)]
pub enum SocketFileError {
    #[error("failed to remove stale socket {path}: {source}")]
    Stale {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The launcher-facing socket file.  Removed when dropped, if it is still the one we bound.
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
    inode: Option<u64>,
}

impl SocketFile {
    pub fn bind(path: &Path) -> Result<(SocketFile, UnixListener), SocketFileError> {
        if path.symlink_metadata().is_ok() {
            debug!("removing stale socket: {}", path.display());
            std::fs::remove_file(path).map_err(|source| SocketFileError::Stale {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let listener = UnixListener::bind(path).map_err(|source| SocketFileError::Bind {
            path: path.to_path_buf(),
            source,
        })?;

        let inode = Self::inode(path);
        let socket_file = SocketFile {
            path: path.to_path_buf(),
            inode,
        };

        Ok((socket_file, listener))
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Deletes the socket file, if it has not been replaced by another process.
    pub fn try_drop(&mut self) -> anyhow::Result<()> {
        let current = Self::inode(self.path.as_path());

        if current.is_none() {
            debug!("socket already removed: {}", self.path.display());
        } else if current == self.inode {
            debug!("removing socket: {}", self.path.display());
            std::fs::remove_file(self.path.as_path())?;
        } else {
            warn!(
                "not removing socket - it was replaced: {}",
                self.path.display()
            );
        }

        Ok(())
    }

    fn inode(path: &Path) -> Option<u64> {
        path.symlink_metadata().ok().map(|metadata| metadata.ino())
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        let result = self.try_drop();
        if let Err(e) = result {
            error!("failed to drop socket file: {}", e);
        }
    }
}
