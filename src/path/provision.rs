//! Directory provisioning
//!
//! Makes sure a directory chain exists before a file is created in it or moved
//! into it.

use std::fs::{self, DirBuilder};
use std::io;
use std::path::{Path, PathBuf};

/// Whether this process may read and write `path`
#[cfg(unix)]
fn can_read_write(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn can_read_write(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

/// Whether `path` is an existing directory we can read and write
fn is_writable_dir(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_dir() && can_read_write(path),
        Err(_) => false,
    }
}

fn dir_builder() -> DirBuilder {
    #[allow(unused_mut)]
    let mut builder = DirBuilder::new();

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder
}

/// Create `path` and any missing parents.
///
/// Existing components are fine. Any other creation error fails the call, and
/// the full path must end up as a writable directory.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };

    if is_writable_dir(path) {
        return Ok(());
    }

    let builder = dir_builder();
    let mut chain: Vec<&Path> = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    chain.reverse();

    for dir in chain {
        tracing::debug!("Creating directory component {:?}", dir);

        match builder.create(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    if is_writable_dir(path) {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{} is not a writable directory", path.display()),
        ))
    }
}

/// Directory part of a resolved file path (empty for a bare file name)
pub fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
