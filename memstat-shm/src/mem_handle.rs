// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::off_t;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::os::unix::fs::MetadataExt;
use std::ptr::NonNull;

/// An anonymous shared-memory segment, sized once at creation.
///
/// The segment is inherited across `fork`, which is how related worker
/// processes end up sharing one arena region. Unrelated observers attach via
/// [`NamedShmHandle`] instead.
#[derive(Debug)]
pub struct ShmHandle {
    handle: OwnedFd,
    size: usize,
}

pub struct MappedMem<T>
where
    T: MemoryHandle,
{
    ptr: NonNull<libc::c_void>,
    mem: T,
}

struct ShmPath {
    name: CString,
}

/// A named shared-memory segment reachable by any process that knows the
/// name. The creating side owns the name and unlinks it on drop.
pub struct NamedShmHandle {
    inner: ShmHandle,
    path: Option<ShmPath>,
}

impl NamedShmHandle {
    pub fn get_path(&self) -> &[u8] {
        if let Some(ref shm_path) = &self.path {
            shm_path.name.as_bytes()
        } else {
            b""
        }
    }
}

fn page_aligned_size(size: usize) -> usize {
    let page_size = page_size::get();
    // round up to nearest page
    ((size - 1) & !(page_size - 1)) + page_size
}

pub trait MemoryHandle {
    fn get_size(&self) -> usize;
}

impl<T> MemoryHandle for T
where
    T: FileBackedHandle,
{
    fn get_size(&self) -> usize {
        self.get_shm().size
    }
}

pub trait FileBackedHandle
where
    Self: Sized,
{
    fn map(self) -> io::Result<MappedMem<Self>>;
    fn get_shm(&self) -> &ShmHandle;
}

fn mmap_handle<T: FileBackedHandle>(handle: T) -> io::Result<MappedMem<T>> {
    let size = NonZeroUsize::new(handle.get_shm().size)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "zero-sized mapping"))?;
    Ok(MappedMem {
        ptr: unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &handle.get_shm().handle,
                0,
            )?
        },
        mem: handle,
    })
}

impl FileBackedHandle for ShmHandle {
    fn map(self) -> io::Result<MappedMem<ShmHandle>> {
        mmap_handle(self)
    }

    fn get_shm(&self) -> &ShmHandle {
        self
    }
}

impl FileBackedHandle for NamedShmHandle {
    fn map(self) -> io::Result<MappedMem<NamedShmHandle>> {
        mmap_handle(self)
    }

    fn get_shm(&self) -> &ShmHandle {
        &self.inner
    }
}

impl ShmHandle {
    #[cfg(target_os = "linux")]
    fn open_anon_shm() -> anyhow::Result<OwnedFd> {
        let memfd = memfd::MemfdOptions::default().create("anon-shm-handle")?;
        Ok(memfd.into_file().into())
    }

    #[cfg(not(target_os = "linux"))]
    fn open_anon_shm() -> anyhow::Result<OwnedFd> {
        let path = format!("/memstat-shm-anon-{}", nix::unistd::getpid());
        let result = shm_open(
            path.as_bytes(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::empty(),
        );
        _ = shm_unlink(path.as_bytes());
        Ok(result?)
    }

    /// Creates an anonymous segment of at least `size` bytes, rounded up to
    /// whole pages. The file length and the mapped length always agree.
    pub fn new(size: usize) -> anyhow::Result<ShmHandle> {
        if size == 0 {
            anyhow::bail!("cannot allocate a shared mapping of size zero");
        }
        let handle = Self::open_anon_shm()?;
        let size = page_aligned_size(size);
        ftruncate(&handle, size as off_t)?;
        Ok(ShmHandle { handle, size })
    }
}

impl NamedShmHandle {
    pub fn create(path: CString, size: usize) -> io::Result<NamedShmHandle> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot allocate a shared mapping of size zero",
            ));
        }
        let fd = shm_open(
            path.as_bytes(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IWUSR
                | Mode::S_IRUSR
                | Mode::S_IRGRP
                | Mode::S_IWGRP
                | Mode::S_IROTH
                | Mode::S_IWOTH,
        )?;
        let size = page_aligned_size(size);
        ftruncate(&fd, size as off_t)?;
        Self::new(fd, Some(ShmPath { name: path }), size)
    }

    /// Attaches to an existing named segment; the size is discovered from the
    /// segment itself. The opening side never unlinks the name.
    pub fn open(path: &CString) -> io::Result<NamedShmHandle> {
        let fd = shm_open(path.as_bytes(), OFlag::O_RDWR, Mode::empty())?;
        let file: File = fd.into();
        let size = file.metadata()?.size() as usize;
        Self::new(file.into(), None, size)
    }

    fn new(fd: OwnedFd, path: Option<ShmPath>, size: usize) -> io::Result<NamedShmHandle> {
        Ok(NamedShmHandle {
            inner: ShmHandle { handle: fd, size },
            path,
        })
    }
}

impl<T: MemoryHandle> MappedMem<T> {
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.mem.get_size()) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u8, self.mem.get_size()) }
    }

    /// The mapped region as a pointer-with-length, suitable for handing to a
    /// structure that lives inside the region.
    pub fn as_region(&mut self) -> NonNull<[u8]> {
        NonNull::slice_from_raw_parts(self.ptr.cast::<u8>(), self.mem.get_size())
    }

    pub fn get_size(&self) -> usize {
        self.mem.get_size()
    }
}

impl<T: MemoryHandle> AsRef<[u8]> for MappedMem<T> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl MappedMem<NamedShmHandle> {
    pub fn get_path(&self) -> &[u8] {
        self.mem.get_path()
    }
}

impl<T> Drop for MappedMem<T>
where
    T: MemoryHandle,
{
    fn drop(&mut self) {
        unsafe {
            _ = munmap(self.ptr, self.mem.get_size());
        }
    }
}

impl Drop for ShmPath {
    fn drop(&mut self) {
        _ = shm_unlink(self.name.as_bytes());
    }
}

// SAFETY: the mapping stays valid until drop, and all mutation of the region
// happens through the in-region locks and atomics of the structures stored in
// it, not through &self methods of MappedMem.
unsafe impl<T> Sync for MappedMem<T> where T: FileBackedHandle {}
unsafe impl<T> Send for MappedMem<T> where T: FileBackedHandle {}

#[cfg(test)]
mod tests {
    use crate::mem_handle::{FileBackedHandle, NamedShmHandle, ShmHandle};
    use std::ffi::CString;
    use std::io::Write;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_anon_shm() {
        let shm = ShmHandle::new(5).unwrap();
        let mut mapped = shm.map().unwrap();
        _ = mapped.as_slice_mut().write(&[1, 2, 3, 4, 5]).unwrap();
        // Rounded up to a whole page; the tail is zero-filled.
        assert!(mapped.as_slice().len() >= 5);
        let mut exp = vec![0u8; mapped.as_slice().len()];
        _ = (&mut exp[..5]).write(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(mapped.as_slice(), exp.as_slice());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_named_shm() {
        let path = CString::new(format!("/memstat-test-{}", std::process::id())).unwrap();
        let shm = NamedShmHandle::create(path.clone(), 5).unwrap();
        let mut mapped = shm.map().unwrap();
        _ = mapped.as_slice_mut().write(&[1, 2, 3, 4, 5]).unwrap();

        let other = NamedShmHandle::open(&path).unwrap().map().unwrap();
        assert_eq!(other.as_slice().len(), mapped.as_slice().len());
        let mut exp = vec![0u8; other.as_slice().len()];
        _ = (&mut exp[..5]).write(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(other.as_slice(), exp.as_slice());
    }
}
