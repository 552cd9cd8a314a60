//! Runtime files of the daemon and its shutdown flag
//!
//! Everything the daemon creates under the run directory is held by a
//! [`RunFile`] and unlinked when that guard drops, so a normal return from
//! the accept loop leaves the directory clean. Signals only raise a flag;
//! the accept loop notices it and returns.

use anyhow::{bail, Context, Result};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Route SIGINT and SIGTERM to the shutdown flag
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
    }
}

extern "C" fn request_shutdown(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Owner-only directory holding the socket and the token file
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Create `path` with 0o700, or verify an existing one is owner-only
    pub fn prepare(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
            debug!(dir = %path.display(), "created run directory");
        } else {
            let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                bail!(
                    "Refusing to start: {} has permissions {:o} (group/world accessible).\n  \
                     Fix with: chmod 700 {}",
                    path.display(),
                    mode,
                    path.display()
                );
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to an owner-only file that is removed on drop
    pub fn write_secret(&self, name: &str, contents: &[u8]) -> Result<RunFile> {
        let path = self.path.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        Ok(RunFile { path })
    }

    /// Bind an owner-only Unix socket, replacing a stale one left by a crash
    pub fn bind_socket(&self, name: &str) -> Result<(UnixListener, RunFile)> {
        let path = self.path.join(name);
        clear_stale_socket(&path)?;

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;
        let guard = RunFile { path };
        std::fs::set_permissions(&guard.path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", guard.path.display()))?;
        Ok((listener, guard))
    }
}

/// A file under the run directory, unlinked on drop
#[derive(Debug)]
pub struct RunFile {
    path: PathBuf,
}

impl RunFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed runtime file"),
            Err(e) => debug!(path = %self.path.display(), error = %e, "runtime file already gone"),
        }
    }
}

/// Only a socket owned by this user is ever unlinked
fn clear_stale_socket(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    };

    if !meta.file_type().is_socket() {
        bail!(
            "Refusing to start: {} exists but is not a socket.\n  \
             Remove manually if safe: rm {}",
            path.display(),
            path.display()
        );
    }

    let my_uid = unsafe { libc::getuid() };
    if meta.uid() != my_uid {
        bail!(
            "Refusing to start: {} is owned by uid {} (you are {})",
            path.display(),
            meta.uid(),
            my_uid
        );
    }

    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    info!(socket = %path.display(), "removed stale socket");
    Ok(())
}
