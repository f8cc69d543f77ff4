//! Memory-mapped regions
//!
//! `MemoryMap` owns one OS mapping. Two shapes exist and are chosen by
//! whether a file is supplied:
//!
//! - no file: private, anonymous, read-write, zero-filled scratch memory
//! - file: shared, read-only view of `len` bytes starting at `offset`
//!
//! The mapping is released exactly once, either by [`MemoryMap::unmap`]
//! (which reports failure) or by `Drop` (which logs it). Raw pointers never
//! leave this module; callers only see byte slices borrowed from the handle.

use std::fs::File;
use std::io;
use std::mem::ManuallyDrop;
use std::os::unix::io::AsRawFd;
use std::ptr::NonNull;

use tracing::{error, warn};
use tsread_core::{Error, Result};

/// Expected access pattern, passed to `madvise`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// No special treatment
    Normal,
    /// Pages will be touched in random order; read-ahead is wasted
    Random,
    /// Pages will be touched in order; read ahead aggressively
    Sequential,
    /// Pages will be needed soon
    WillNeed,
    /// Pages will not be needed soon; the kernel may drop them
    DontNeed,
}

impl Advice {
    fn as_raw(self) -> libc::c_int {
        match self {
            Advice::Normal => libc::MADV_NORMAL,
            Advice::Random => libc::MADV_RANDOM,
            Advice::Sequential => libc::MADV_SEQUENTIAL,
            Advice::WillNeed => libc::MADV_WILLNEED,
            Advice::DontNeed => libc::MADV_DONTNEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    Anonymous,
    File,
}

/// An owned OS memory mapping
#[derive(Debug)]
pub struct MemoryMap {
    /// Page-aligned start of the OS mapping
    base: NonNull<u8>,
    /// Length handed to mmap
    map_len: usize,
    /// Distance from `base` to the first byte of the view
    view_offset: usize,
    /// Length of the view
    len: usize,
    backing: Backing,
}

// SAFETY: file-backed views are read-only, and the anonymous view is only
// writable through `&mut self`, so the usual borrow rules cover sharing.
unsafe impl Send for MemoryMap {}
unsafe impl Sync for MemoryMap {}

/// System page size
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

impl MemoryMap {
    /// Map `len` bytes.
    ///
    /// With no file, creates anonymous scratch memory and `offset` must be 0.
    /// With a file, maps `len` bytes starting at byte `offset`; the range must
    /// lie within the file. `offset` need not be page aligned.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` for zero-length requests, ranges outside the file,
    /// or when the OS call fails.
    pub fn map(file: Option<&File>, offset: u64, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(invalid_mapping("cannot map zero bytes"));
        }
        match file {
            None => {
                if offset != 0 {
                    return Err(invalid_mapping("anonymous mappings have no offset"));
                }
                Self::map_anonymous(len)
            }
            Some(file) => Self::map_file(file, offset, len),
        }
    }

    /// Anonymous, private, zero-filled read-write region of `len` bytes
    pub fn anonymous(len: usize) -> Result<Self> {
        Self::map(None, 0, len)
    }

    /// Read-only view of a whole file
    pub fn open(file: &File) -> Result<Self> {
        let file_len = file.metadata().map_err(Error::Mapping)?.len();
        let len = usize::try_from(file_len)
            .map_err(|_| invalid_mapping("file larger than the address space"))?;
        Self::map(Some(file), 0, len)
    }

    fn map_anonymous(len: usize) -> Result<Self> {
        // SAFETY: a fresh anonymous mapping aliases no existing memory.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        let base = check_mapped(ptr)?;
        Ok(MemoryMap {
            base,
            map_len: len,
            view_offset: 0,
            len,
            backing: Backing::Anonymous,
        })
    }

    fn map_file(file: &File, offset: u64, len: usize) -> Result<Self> {
        let file_len = file.metadata().map_err(Error::Mapping)?.len();
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| invalid_mapping("offset + len overflows"))?;
        if end > file_len {
            return Err(invalid_mapping(&format!(
                "range {}..{} exceeds file length {}",
                offset, end, file_len
            )));
        }

        let page = page_size() as u64;
        let aligned = offset - offset % page;
        let view_offset = (offset - aligned) as usize;
        let map_len = len + view_offset;
        let file_offset = libc::off_t::try_from(aligned)
            .map_err(|_| invalid_mapping("offset does not fit in off_t"))?;

        // SAFETY: read-only shared mapping of a range checked against the
        // file length above.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                file_offset,
            )
        };
        let base = check_mapped(ptr)?;
        Ok(MemoryMap {
            base,
            map_len,
            view_offset,
            len,
            backing: Backing::File,
        })
    }

    /// Length of the view in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-length maps are rejected
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True for scratch mappings with no backing file
    pub fn is_anonymous(&self) -> bool {
        self.backing == Backing::Anonymous
    }

    /// The mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: base..base+map_len is mapped readable for the life of self,
        // and view_offset + len == map_len.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(self.view_offset), self.len) }
    }

    /// Writable bytes of an anonymous mapping; `None` for file views
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self.backing {
            // SAFETY: anonymous mappings are PROT_WRITE and exclusively
            // borrowed here.
            Backing::Anonymous => Some(unsafe {
                std::slice::from_raw_parts_mut(self.base.as_ptr(), self.len)
            }),
            Backing::File => None,
        }
    }

    /// Tell the kernel how the region will be accessed.
    ///
    /// Best effort: callers on a read path should log failures and carry on
    /// (see [`MemoryMap::advise_or_log`]).
    ///
    /// # Errors
    ///
    /// Returns `Advise` if the kernel rejects the hint, or for `DontNeed` on
    /// an anonymous mapping, where it would discard live contents.
    pub fn advise(&self, advice: Advice) -> Result<()> {
        if advice == Advice::DontNeed && self.is_anonymous() {
            return Err(Error::Advise(io::Error::new(
                io::ErrorKind::InvalidInput,
                "DontNeed would discard anonymous memory",
            )));
        }
        // SAFETY: base is page aligned and base..base+map_len is our mapping.
        let rc = unsafe {
            libc::madvise(
                self.base.as_ptr() as *mut libc::c_void,
                self.map_len,
                advice.as_raw(),
            )
        };
        if rc != 0 {
            return Err(Error::Advise(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// `advise`, logging instead of returning a failure
    pub fn advise_or_log(&self, advice: Advice) {
        if let Err(e) = self.advise(advice) {
            warn!(target: "tsread::mmap", ?advice, error = %e, "madvise failed");
        }
    }

    /// Release the mapping.
    ///
    /// The view must not be used afterwards; taking `self` by value makes
    /// that a compile-time guarantee.
    ///
    /// # Errors
    ///
    /// Returns `Unmap` if the OS refuses. The handle is consumed either way.
    pub fn unmap(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.release().map_err(Error::Unmap)
    }

    fn release(&self) -> io::Result<()> {
        // SAFETY: called at most once per mapping, from `unmap` (which
        // suppresses Drop) or from Drop.
        let rc = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.map_len) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for MemoryMap {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(target: "tsread::mmap", len = self.map_len, error = %e, "munmap failed");
        }
    }
}

impl AsRef<[u8]> for MemoryMap {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::ops::Deref for MemoryMap {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

fn check_mapped(ptr: *mut libc::c_void) -> Result<NonNull<u8>> {
    if ptr == libc::MAP_FAILED {
        return Err(Error::Mapping(io::Error::last_os_error()));
    }
    NonNull::new(ptr as *mut u8).ok_or_else(|| invalid_mapping("mmap returned null"))
}

fn invalid_mapping(msg: &str) -> Error {
    Error::Mapping(io::Error::new(io::ErrorKind::InvalidInput, msg.to_string()))
}
