//! Memory-backed files for `wl_shm` pools.
//!
//! [`create_shm_pool`](crate::marshal::create_shm_pool) wants an open file
//! descriptor that refers to at least `size` bytes of shareable memory. This
//! module produces one: an anonymous `memfd` when the kernel supports it,
//! otherwise a temporary file in XDG_RUNTIME_DIR (or /tmp) that is unlinked
//! right after creation so it disappears with its last descriptor.

use memmap2::{MmapMut, MmapOptions};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::libc;
use nix::unistd::ftruncate;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use thiserror::Error;

const MEMFD_NAME: &[u8] = b"wlr-interop-buffer\0";

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shared memory size must be non-zero")]
    ZeroSize,

    #[error("failed to create shared memory file: {0}")]
    Create(#[source] std::io::Error),

    #[error("failed to set FD_CLOEXEC: {0}")]
    CloseOnExec(#[source] nix::Error),

    #[error("failed to resize shared memory file to {size} bytes: {source}")]
    Truncate {
        size: usize,
        #[source]
        source: nix::Error,
    },

    #[error("failed to map shared memory: {0}")]
    Map(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShmError>;

/// An owned, memory-backed file of a fixed size.
///
/// The descriptor stays open for as long as this value lives. Pools created
/// from it receive their own duplicate, so dropping the `ShmFile` after the
/// pool request has been sent is fine.
#[derive(Debug)]
pub struct ShmFile {
    fd: OwnedFd,
    size: usize,
}

impl ShmFile {
    /// Create a file of exactly `size` bytes.
    pub fn create(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }

        let fd = match create_memfd() {
            Ok(fd) => fd,
            Err(err) => {
                log::debug!("memfd_create unavailable ({}), using a temporary file", err);
                create_tmpfile()?
            }
        };

        let size_off = i64::try_from(size).map_err(|_| ShmError::Truncate {
            size,
            source: nix::Error::EFBIG,
        })?;
        ftruncate(&fd, size_off).map_err(|source| ShmError::Truncate { size, source })?;

        log::trace!("Created {} byte shm file (fd {})", size, fd.as_raw_fd());
        Ok(Self { fd, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw descriptor for passing across the C boundary. Ownership stays
    /// with `self`.
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Map the whole file read/write and shared with the compositor.
    pub fn map(&self) -> Result<MmapMut> {
        // SAFETY: the file is private to this process until it is handed
        // to the compositor, which only reads from it.
        unsafe { MmapOptions::new().len(self.size).map_mut(&self.fd) }
            .map_err(ShmError::Map)
    }
}

impl AsFd for ShmFile {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

fn create_memfd() -> std::io::Result<OwnedFd> {
    let fd = unsafe {
        libc::memfd_create(
            MEMFD_NAME.as_ptr() as *const libc::c_char,
            libc::MFD_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn create_tmpfile() -> Result<OwnedFd> {
    let dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());

    let template = format!("{}/.wlr-interop-XXXXXX", dir);
    let mut path_bytes = template.into_bytes();
    path_bytes.push(0);

    let fd = unsafe { libc::mkstemp(path_bytes.as_mut_ptr() as *mut libc::c_char) };
    if fd < 0 {
        return Err(ShmError::Create(std::io::Error::last_os_error()));
    }
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    // Only the descriptor is needed from here on.
    unsafe { libc::unlink(path_bytes.as_ptr() as *const libc::c_char) };

    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(ShmError::CloseOnExec)?;

    Ok(fd)
}
