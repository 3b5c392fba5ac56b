// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The spillover chunk tier: a preallocated backing file on local disk used
// once the in-memory chunk pool is exhausted. Grounded on
// `scrmfs_get_spillblock()` (create-exclusive, fall back to plain open on
// EEXIST) and `scrmfs_compute_spill_offset()` /
// `scrmfs_chunk_read`/`scrmfs_chunk_write`'s `CHUNK_LOCATION_SPILLOVER` arm
// (positional `pread`/`pwrite`) in `original_source/runtime/lib/scrmfs-posix.c`.
//
// Positional I/O uses the standard library's per-platform `FileExt` trait
// rather than raw `libc::pread`/`pwrite` — `platform/posix.rs` reaches for
// raw libc where POSIX shm has no portable std wrapper, but plain file I/O
// does, so this module uses it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::config::CHUNK_SIZE;

/// A preallocated, chunk-indexed backing file for chunks that don't fit in
/// the memory pool.
pub struct SpillStore {
    file: File,
    capacity: u32,
}

impl SpillStore {
    /// Open the backing file at `path`, creating and preallocating it to
    /// `capacity * CHUNK_SIZE` bytes if it doesn't exist yet, or attaching
    /// to it unmodified if it does (mirrors `scrmfs_get_spillblock`'s
    /// create-exclusive-then-fall-back-to-open).
    pub fn open_or_create(path: impl AsRef<Path>, capacity: u32) -> io::Result<Self> {
        let path = path.as_ref();
        let (file, created) = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(f) => (f, true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                (OpenOptions::new().read(true).write(true).open(path)?, false)
            }
            Err(e) => return Err(e),
        };

        if created {
            file.set_len(capacity as u64 * CHUNK_SIZE as u64)?;
        }

        Ok(SpillStore { file, capacity })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Read `buf.len()` bytes out of local spillover chunk `local_id`
    /// starting at `offset_in_chunk`. `local_id` is the spillover-local
    /// index (`physical_id - MAX_CHUNKS` already subtracted by the caller).
    pub fn read(&self, local_id: u32, offset_in_chunk: u32, buf: &mut [u8]) -> io::Result<()> {
        debug_assert!(local_id < self.capacity);
        debug_assert!(offset_in_chunk as usize + buf.len() <= CHUNK_SIZE);
        let offset = local_id as u64 * CHUNK_SIZE as u64 + offset_in_chunk as u64;
        read_exact_at(&self.file, buf, offset)
    }

    /// Write `buf` into local spillover chunk `local_id` starting at
    /// `offset_in_chunk`.
    pub fn write(&self, local_id: u32, offset_in_chunk: u32, buf: &[u8]) -> io::Result<()> {
        debug_assert!(local_id < self.capacity);
        debug_assert!(offset_in_chunk as usize + buf.len() <= CHUNK_SIZE);
        let offset = local_id as u64 * CHUNK_SIZE as u64 + offset_in_chunk as u64;
        write_all_at(&self.file, buf, offset)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
