// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The file metadata table (C6): a fixed-capacity, shared-memory-resident
// array of `{ in_use, name }` / `{ size, chunks, chunk_meta[], is_dir, ... }`
// pairs, one per file slot. Grounded on `scrmfs_filename_t` / `scrmfs_filemeta_t`
// (`original_source/runtime/scrmfs-file.h`) and the lookup/stat helpers in
// `scrmfs-posix.c` (`scrmfs_get_fid_from_path`, `scrmfs_get_meta_from_fid`,
// `scrmfs_is_dir`, `scrmfs_add_new_file`, `scrmfs_add_new_directory`).
//
// Laid out like `index_stack.rs`/`chunk_store.rs`: a view over raw bytes
// living inside the superblock, not an owned allocation.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::addressing::ChunkLocation;
use crate::config::{MAX_CHUNKS_PER_FILE, MAX_FILENAME};
use crate::error::{EngineError, EngineResult};
use crate::spin_lock::SpinLock;

#[repr(C)]
struct ChunkMetaRaw {
    location: AtomicU32,
    physical_id: AtomicU32,
}

#[repr(C)]
struct FileMetaRaw {
    size: AtomicU64,
    chunks: AtomicU32,
    is_dir: AtomicU32,
    /// Advisory, process-shared — reserved for a future range-lock
    /// feature. Never taken on the read/write path (spec §5).
    flock_status: AtomicU32,
    _reserved: u32,
    spinlock: SpinLock,
    chunk_meta: [ChunkMetaRaw; MAX_CHUNKS_PER_FILE],
}

#[repr(C)]
struct FilenameRaw {
    in_use: AtomicU32,
    name: [u8; MAX_FILENAME],
}

/// A view over `capacity` `(FilenameRaw, FileMetaRaw)` slots living inside a
/// shared-memory segment. Does not own the backing memory.
pub struct FileTable {
    names: *mut FilenameRaw,
    metas: *mut FileMetaRaw,
    capacity: u32,
}

// Safety: every field access goes through an atomic, or (for the inline name
// buffer) is guarded by the caller only mutating a slot it holds exclusive
// logical ownership of (a freshly-popped fid before it is published via
// `in_use`). Matches the discipline `index_stack.rs`/`chunk_store.rs` assume.
unsafe impl Send for FileTable {}
unsafe impl Sync for FileTable {}

impl FileTable {
    pub const fn names_byte_len(capacity: u32) -> usize {
        capacity as usize * std::mem::size_of::<FilenameRaw>()
    }

    pub const fn metas_byte_len(capacity: u32) -> usize {
        capacity as usize * std::mem::size_of::<FileMetaRaw>()
    }

    pub const fn byte_len(capacity: u32) -> usize {
        Self::names_byte_len(capacity) + Self::metas_byte_len(capacity)
    }

    /// # Safety
    /// `base` must point to at least `byte_len(capacity)` writable bytes,
    /// alive for as long as the returned `FileTable` is used.
    pub unsafe fn attach(base: *mut u8, capacity: u32) -> Self {
        let names = base as *mut FilenameRaw;
        let metas = base.add(Self::names_byte_len(capacity)) as *mut FileMetaRaw;
        FileTable {
            names,
            metas,
            capacity,
        }
    }

    /// # Safety
    /// Same requirements as [`attach`](Self::attach); additionally no other
    /// process may be reading or writing this region concurrently.
    pub unsafe fn init_at(base: *mut u8, capacity: u32) -> Self {
        let table = Self::attach(base, capacity);
        for i in 0..capacity {
            (*table.names.add(i as usize))
                .in_use
                .store(0, Ordering::Relaxed);
        }
        table
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn name_slot(&self, fid: u32) -> &FilenameRaw {
        debug_assert!(fid < self.capacity);
        unsafe { &*self.names.add(fid as usize) }
    }

    fn meta_slot(&self, fid: u32) -> &FileMetaRaw {
        debug_assert!(fid < self.capacity);
        unsafe { &*self.metas.add(fid as usize) }
    }

    pub fn is_in_use(&self, fid: u32) -> bool {
        fid < self.capacity && self.name_slot(fid).in_use.load(Ordering::Acquire) != 0
    }

    /// The NUL-terminated name stored in `fid`'s slot, decoded as UTF-8.
    pub fn name(&self, fid: u32) -> String {
        let slot = self.name_slot(fid);
        let bytes = &slot.name;
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME);
        String::from_utf8_lossy(&bytes[..len]).into_owned()
    }

    /// Linear scan over in-use slots for an exact path match. Mirrors
    /// `scrmfs_get_fid_from_path`'s O(MAX_FILES) lookup.
    pub fn lookup(&self, path: &str) -> Option<u32> {
        (0..self.capacity).find(|&fid| self.is_in_use(fid) && self.name(fid) == path)
    }

    pub fn is_dir(&self, fid: u32) -> bool {
        fid < self.capacity && self.meta_slot(fid).is_dir.load(Ordering::Acquire) != 0
    }

    fn write_name(&self, fid: u32, path: &str) -> EngineResult<()> {
        let bytes = path.as_bytes();
        if bytes.len() + 1 > MAX_FILENAME {
            return Err(EngineError::NameTooLong);
        }
        let slot = self.name_slot(fid);
        let name_ptr = slot.name.as_ptr() as *mut u8;
        unsafe {
            std::ptr::write_bytes(name_ptr, 0, MAX_FILENAME);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), name_ptr, bytes.len());
        }
        Ok(())
    }

    /// Publish a freshly-popped fid as an in-use file (or directory),
    /// mirroring `scrmfs_add_new_file`/`scrmfs_add_new_directory`: clear
    /// metadata, set the name, then flip `in_use` last so a concurrent
    /// lookup never observes a half-initialized slot.
    pub fn activate(&self, fid: u32, path: &str, is_dir: bool) -> EngineResult<()> {
        self.write_name(fid, path)?;
        let meta = self.meta_slot(fid);
        meta.size.store(0, Ordering::Relaxed);
        meta.chunks.store(0, Ordering::Relaxed);
        meta.is_dir.store(is_dir as u32, Ordering::Relaxed);
        meta.flock_status.store(0, Ordering::Relaxed);
        self.name_slot(fid).in_use.store(1, Ordering::Release);
        Ok(())
    }

    /// Clear `in_use`. The fid itself is returned to the free stack by the
    /// caller (`pipeline::unlink`), mirroring `scrmfs_fid_unlink`.
    pub fn deactivate(&self, fid: u32) {
        self.name_slot(fid).in_use.store(0, Ordering::Release);
    }

    /// In-place name rewrite for same-mount `rename`.
    pub fn rename(&self, fid: u32, new_path: &str) -> EngineResult<()> {
        self.write_name(fid, new_path)
    }

    pub fn size(&self, fid: u32) -> u64 {
        self.meta_slot(fid).size.load(Ordering::Acquire)
    }

    pub fn set_size(&self, fid: u32, size: u64) {
        self.meta_slot(fid).size.store(size, Ordering::Release);
    }

    pub fn chunks(&self, fid: u32) -> u32 {
        self.meta_slot(fid).chunks.load(Ordering::Acquire)
    }

    pub fn set_chunks(&self, fid: u32, n: u32) {
        self.meta_slot(fid).chunks.store(n, Ordering::Release);
    }

    /// Decode the stored `(location, physical_id)` pair for logical chunk
    /// `idx` of file `fid`. `Ok(None)` means the slot has never been
    /// allocated.
    pub fn chunk_meta(&self, fid: u32, idx: u32) -> EngineResult<Option<ChunkLocation>> {
        debug_assert!((idx as usize) < MAX_CHUNKS_PER_FILE);
        let cm = &self.meta_slot(fid).chunk_meta[idx as usize];
        let loc = cm.location.load(Ordering::Acquire);
        let id = cm.physical_id.load(Ordering::Acquire);
        ChunkLocation::decode(loc, id)
    }

    pub fn set_chunk_meta(&self, fid: u32, idx: u32, loc: Option<ChunkLocation>) {
        debug_assert!((idx as usize) < MAX_CHUNKS_PER_FILE);
        let cm = &self.meta_slot(fid).chunk_meta[idx as usize];
        match loc {
            None => {
                cm.location.store(0, Ordering::Release);
                cm.physical_id.store(0, Ordering::Release);
            }
            Some(l) => {
                let (tag, id) = l.encode();
                cm.physical_id.store(id, Ordering::Release);
                cm.location.store(tag, Ordering::Release);
            }
        }
    }

    /// All in-use `(fid, name)` pairs, for directory emptiness checks and
    /// diagnostics.
    pub fn in_use_entries(&self) -> impl Iterator<Item = (u32, String)> + '_ {
        (0..self.capacity)
            .filter(|&fid| self.is_in_use(fid))
            .map(|fid| (fid, self.name(fid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_backed_table(capacity: u32) -> (Vec<u8>, FileTable) {
        let mut buf = vec![0u8; FileTable::byte_len(capacity)];
        let table = unsafe { FileTable::init_at(buf.as_mut_ptr(), capacity) };
        (buf, table)
    }

    #[test]
    fn fresh_table_has_no_entries_in_use() {
        let (_buf, table) = new_backed_table(4);
        assert_eq!(table.lookup("/tmp/a"), None);
        assert_eq!(table.in_use_entries().count(), 0);
    }

    #[test]
    fn activate_then_lookup_round_trips() {
        let (_buf, table) = new_backed_table(4);
        table.activate(2, "/tmp/a", false).unwrap();
        assert_eq!(table.lookup("/tmp/a"), Some(2));
        assert!(!table.is_dir(2));
        assert_eq!(table.size(2), 0);
    }

    #[test]
    fn activate_directory_sets_is_dir() {
        let (_buf, table) = new_backed_table(4);
        table.activate(0, "/tmp/d", true).unwrap();
        assert!(table.is_dir(0));
    }

    #[test]
    fn deactivate_removes_from_lookup() {
        let (_buf, table) = new_backed_table(4);
        table.activate(0, "/tmp/a", false).unwrap();
        table.deactivate(0);
        assert_eq!(table.lookup("/tmp/a"), None);
    }

    #[test]
    fn name_too_long_is_rejected() {
        let (_buf, table) = new_backed_table(1);
        let long = "a".repeat(MAX_FILENAME);
        assert_eq!(table.activate(0, &long, false), Err(EngineError::NameTooLong));
    }

    #[test]
    fn chunk_meta_round_trips() {
        let (_buf, table) = new_backed_table(1);
        table.activate(0, "/tmp/a", false).unwrap();
        assert_eq!(table.chunk_meta(0, 0).unwrap(), None);
        table.set_chunk_meta(0, 0, Some(ChunkLocation::Memory(9)));
        assert_eq!(table.chunk_meta(0, 0).unwrap(), Some(ChunkLocation::Memory(9)));
        table.set_chunk_meta(0, 0, None);
        assert_eq!(table.chunk_meta(0, 0).unwrap(), None);
    }

    #[test]
    fn rename_updates_name() {
        let (_buf, table) = new_backed_table(1);
        table.activate(0, "/tmp/a", false).unwrap();
        table.rename(0, "/tmp/b").unwrap();
        assert_eq!(table.lookup("/tmp/a"), None);
        assert_eq!(table.lookup("/tmp/b"), Some(0));
    }
}
