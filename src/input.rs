//! Compressed input acquisition
//!
//! Turns one of the supported input transports into a single contiguous,
//! read-only byte region the codec library can decode from without copying.
//! The caller decides up front whether the crate owns the transport; a
//! transport the caller keeps ownership of is handed back intact on release.

use std::fs::File;
use std::io::Read;
use std::ptr::NonNull;

use memmap2::{Mmap, MmapOptions};

use crate::error::{OpenError, PlayerError};

/// Where the compressed stream lives
pub enum InputSource {
    /// A file on disk, mapped read-only over its full extent
    File(File),
    /// A mapping the caller already made; no new mapping is created
    Mapped(Mmap),
    /// Unmanaged memory, read from its current cursor to the end
    Memory(UnmanagedMemory),
    /// A sequential byte stream. Not addressable as one region, so it is
    /// rejected before any codec call.
    Stream(Box<dyn Read + Send>),
}

impl InputSource {
    /// Short name of the transport for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            InputSource::File(_) => "file",
            InputSource::Mapped(_) => "mapped view",
            InputSource::Memory(_) => "unmanaged memory",
            InputSource::Stream(_) => "byte stream",
        }
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Memory(mem) => f.debug_tuple("Memory").field(mem).finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// A raw memory region with a read cursor
///
/// The region is either caller-managed (nothing is freed on drop) or carries
/// a release routine that runs exactly once when the value is dropped.
pub struct UnmanagedMemory {
    ptr: NonNull<u8>,
    len: usize,
    position: usize,
    free: Option<Box<dyn FnOnce(NonNull<u8>, usize)>>,
}

impl UnmanagedMemory {
    /// Wrap caller-managed memory. Nothing is freed on drop.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes for as long as this value
    /// and any buffer acquired from it are alive.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            position: 0,
            free: None,
        }
    }

    /// Wrap memory that `free` releases when this value is dropped
    ///
    /// # Safety
    /// Same requirements as [`UnmanagedMemory::from_raw_parts`]; `free` must
    /// be the matching deallocation for `ptr`.
    pub unsafe fn from_raw_parts_with_free(
        ptr: NonNull<u8>,
        len: usize,
        free: impl FnOnce(NonNull<u8>, usize) + 'static,
    ) -> Self {
        Self {
            ptr,
            len,
            position: 0,
            free: Some(Box::new(free)),
        }
    }

    /// Move a heap buffer into unmanaged memory
    pub fn from_vec(data: Vec<u8>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let ptr = NonNull::from(Box::leak(boxed)).cast::<u8>();
        Self {
            ptr,
            len,
            position: 0,
            free: Some(Box::new(|ptr: NonNull<u8>, len: usize| {
                // SAFETY: ptr/len came from Box::leak above and are released once
                drop(unsafe {
                    Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len))
                });
            })),
        }
    }

    /// Total size of the region
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor, clamped to the end of the region
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.len);
    }

    /// Bytes from the cursor to the end
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    fn cursor_ptr(&self) -> *const u8 {
        // SAFETY: position <= len, so the result is in bounds or one past the end
        unsafe { self.ptr.as_ptr().add(self.position) }
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: guaranteed by the constructors' contracts
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Read for UnmanagedMemory {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        let start = self.position;
        buf[..n].copy_from_slice(&self.as_slice()[start..start + n]);
        self.position += n;
        Ok(n)
    }
}

impl Drop for UnmanagedMemory {
    fn drop(&mut self) {
        if let Some(free) = self.free.take() {
            free(self.ptr, self.len);
        }
    }
}

impl std::fmt::Debug for UnmanagedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnmanagedMemory")
            .field("len", &self.len)
            .field("position", &self.position)
            .field("freed_on_drop", &self.free.is_some())
            .finish()
    }
}

/// Who releases the region behind a [`CompressedBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// The caller keeps the transport; it is handed back on release
    BorrowedExternallyManaged,
    /// The buffer holds a file mapping and unmaps it on release
    OwnedMappedFile,
    /// The buffer frees the raw memory on release
    OwnedRawBuffer,
}

enum Backing {
    File { map: Option<Mmap>, file: File },
    Mapped(Mmap),
    Memory(UnmanagedMemory),
}

/// Zero-copy view over a compressed stream
///
/// Must outlive every decode context opened over it.
pub struct CompressedBuffer {
    ptr: *const u8,
    len: usize,
    owns_source: bool,
    ownership: BufferOwnership,
    backing: Option<Backing>,
}

impl CompressedBuffer {
    /// Resolve a pointer+length view over `source`
    ///
    /// `owns` says whether the crate takes responsibility for releasing the
    /// transport. For files the mapping itself is always owned; `owns` only
    /// decides whether the file handle is closed or returned. On failure a
    /// borrowed transport comes back inside the error.
    pub fn acquire(source: InputSource, owns: bool) -> Result<Self, OpenError> {
        let kind = source.kind();
        let (backing, ptr, len, ownership) = match source {
            InputSource::File(file) => {
                let map = match map_file(&file) {
                    Ok(map) => map,
                    Err(e) => {
                        return Err(OpenError::new(e.into(), hand_back(owns, InputSource::File(file))))
                    }
                };
                let (ptr, len) = match &map {
                    Some(map) => (map.as_ptr(), map.len()),
                    None => (NonNull::<u8>::dangling().as_ptr() as *const u8, 0),
                };
                (
                    Backing::File { map, file },
                    ptr,
                    len,
                    BufferOwnership::OwnedMappedFile,
                )
            }
            InputSource::Mapped(map) => {
                let (ptr, len) = (map.as_ptr(), map.len());
                let ownership = if owns {
                    BufferOwnership::OwnedMappedFile
                } else {
                    BufferOwnership::BorrowedExternallyManaged
                };
                (Backing::Mapped(map), ptr, len, ownership)
            }
            InputSource::Memory(mem) => {
                let (ptr, len) = (mem.cursor_ptr(), mem.remaining());
                let ownership = if owns {
                    BufferOwnership::OwnedRawBuffer
                } else {
                    BufferOwnership::BorrowedExternallyManaged
                };
                (Backing::Memory(mem), ptr, len, ownership)
            }
            stream @ InputSource::Stream(_) => {
                return Err(OpenError::new(
                    PlayerError::UnsupportedInputKind(kind),
                    hand_back(owns, stream),
                ))
            }
        };

        tracing::debug!(kind, len, owns, ?ownership, "acquired compressed input");

        Ok(Self {
            ptr,
            len,
            owns_source: owns,
            ownership,
            backing: Some(backing),
        })
    }

    /// Start of the region
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Length of the region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ownership(&self) -> BufferOwnership {
        self.ownership
    }

    /// The region as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: the backing keeps ptr..ptr+len readable while self is alive
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Release the region
    ///
    /// Owned transports are dropped here. A transport the caller kept
    /// ownership of is returned untouched (files lose only the mapping this
    /// buffer created).
    pub fn release(mut self) -> Option<InputSource> {
        let backing = self.backing.take()?;
        if self.owns_source {
            drop(backing);
            return None;
        }
        match backing {
            Backing::File { map, file } => {
                drop(map);
                Some(InputSource::File(file))
            }
            Backing::Mapped(map) => Some(InputSource::Mapped(map)),
            Backing::Memory(mem) => Some(InputSource::Memory(mem)),
        }
    }
}

/// Map a file read-only over its full extent
///
/// Empty files have nothing to map; the codec rejects the empty view.
fn map_file(file: &File) -> std::io::Result<Option<Mmap>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // SAFETY: read-only mapping; the file must not be truncated while mapped
    unsafe { MmapOptions::new().map(file) }.map(Some)
}

/// The transport to return to a caller that kept ownership of it
fn hand_back(owns: bool, source: InputSource) -> Option<InputSource> {
    if owns {
        None
    } else {
        Some(source)
    }
}

impl std::fmt::Debug for CompressedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedBuffer")
            .field("len", &self.len)
            .field("ownership", &self.ownership)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::{Seek, SeekFrom, Write};
    use std::rc::Rc;

    fn temp_file_with(bytes: &[u8]) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_file_maps_full_extent_regardless_of_cursor() {
        let mut file = temp_file_with(b"0123456789");
        file.seek(SeekFrom::Start(7)).unwrap();

        let buffer = CompressedBuffer::acquire(InputSource::File(file), true).unwrap();
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.as_slice(), b"0123456789");
        assert_eq!(buffer.ownership(), BufferOwnership::OwnedMappedFile);
        assert!(buffer.release().is_none());
    }

    #[test]
    fn test_borrowed_file_is_handed_back() {
        let file = temp_file_with(b"abc");
        let buffer = CompressedBuffer::acquire(InputSource::File(file), false).unwrap();
        match buffer.release() {
            Some(InputSource::File(mut file)) => {
                let mut contents = String::new();
                file.seek(SeekFrom::Start(0)).unwrap();
                file.read_to_string(&mut contents).unwrap();
                assert_eq!(contents, "abc");
            }
            other => panic!("expected the file back, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_file_gives_empty_view() {
        let file = tempfile::tempfile().unwrap();
        let buffer = CompressedBuffer::acquire(InputSource::File(file), true).unwrap();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn test_existing_mapping_is_reused() {
        let file = temp_file_with(b"mapped bytes");
        let map = unsafe { Mmap::map(&file).unwrap() };
        let original_ptr = map.as_ptr();

        let buffer = CompressedBuffer::acquire(InputSource::Mapped(map), false).unwrap();
        assert_eq!(buffer.as_ptr(), original_ptr);
        assert_eq!(buffer.ownership(), BufferOwnership::BorrowedExternallyManaged);

        match buffer.release() {
            Some(InputSource::Mapped(map)) => assert_eq!(&map[..], b"mapped bytes"),
            other => panic!("expected the mapping back, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_view_starts_at_cursor() {
        let mut mem = UnmanagedMemory::from_vec(b"HDR!payload".to_vec());
        let mut header = [0u8; 4];
        mem.read_exact(&mut header).unwrap();
        assert_eq!(&header, b"HDR!");

        let buffer = CompressedBuffer::acquire(InputSource::Memory(mem), true).unwrap();
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.as_slice(), b"payload");
        assert_eq!(buffer.ownership(), BufferOwnership::OwnedRawBuffer);
    }

    #[test]
    fn test_owned_memory_freed_once_on_release() {
        let freed = Rc::new(Cell::new(0));
        let mut backing = vec![1u8, 2, 3];
        let ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let counter = Rc::clone(&freed);
        let mem = unsafe {
            UnmanagedMemory::from_raw_parts_with_free(ptr, backing.len(), move |_, _| {
                counter.set(counter.get() + 1)
            })
        };

        let buffer = CompressedBuffer::acquire(InputSource::Memory(mem), true).unwrap();
        assert_eq!(freed.get(), 0);
        assert!(buffer.release().is_none());
        assert_eq!(freed.get(), 1);
    }

    #[test]
    fn test_borrowed_memory_not_freed_on_release() {
        let freed = Rc::new(Cell::new(false));
        let mut backing = vec![9u8; 16];
        let ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let flag = Rc::clone(&freed);
        let mem = unsafe {
            UnmanagedMemory::from_raw_parts_with_free(ptr, backing.len(), move |_, _| flag.set(true))
        };

        let buffer = CompressedBuffer::acquire(InputSource::Memory(mem), false).unwrap();
        let returned = buffer.release();
        assert!(!freed.get());
        assert!(matches!(returned, Some(InputSource::Memory(_))));
        drop(returned);
        assert!(freed.get());
    }

    #[test]
    fn test_stream_is_rejected() {
        let source = InputSource::Stream(Box::new(std::io::empty()));
        let err = CompressedBuffer::acquire(source, true).unwrap_err();
        assert!(matches!(err.error, PlayerError::UnsupportedInputKind("byte stream")));
        assert!(err.input.is_none());
    }

    #[test]
    fn test_rejected_borrowed_stream_is_handed_back() {
        let source = InputSource::Stream(Box::new(std::io::Cursor::new(b"obu".to_vec())));
        let err = CompressedBuffer::acquire(source, false).unwrap_err();
        match err.into_input() {
            Some(InputSource::Stream(mut stream)) => {
                let mut contents = Vec::new();
                stream.read_to_end(&mut contents).unwrap();
                assert_eq!(contents, b"obu");
            }
            other => panic!("expected the stream back, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_reads_follow_cursor() {
        let mut mem = UnmanagedMemory::from_vec(b"abcdef".to_vec());
        mem.set_position(2);
        let mut buf = [0u8; 3];
        assert_eq!(mem.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"cde");
        assert_eq!(mem.read(&mut buf).unwrap(), 1);
        assert_eq!(mem.remaining(), 0);
    }
}
