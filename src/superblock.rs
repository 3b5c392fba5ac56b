// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Superblock layout (C2): carves one shared-memory segment into the free
// fid stack, the file table, the free chunk stack, the (optional) free
// spillover-chunk stack, and the (optional) in-memory chunk pool, in that
// fixed order. Grounded on `scrmfs_init_pointers()` (region order) and
// `scrmfs_superblock_shmget()` (attach-or-create) in
// `original_source/runtime/lib/scrmfs-posix.c`.
//
// Uses `shm.rs`'s POSIX-named-shared-memory handle rather than System V
// `shmget`/`shmat` (the source's mechanism) — that path is already ported
// and tested cross-platform here, and attach-or-create only needs
// deterministic offsets, not a specific shared memory API.

use std::path::Path;

use crate::chunk_store::ChunkPool;
use crate::config::{MAX_CHUNKS, MAX_FILES, MAX_SPILL_CHUNKS};
use crate::file_table::FileTable;
use crate::index_stack::IndexStack;
use crate::shm::{ShmHandle, ShmOpenMode};

/// Computes the total byte size of the superblock region for a given
/// configuration. Mirrors the `superblock_size` accumulation in
/// `scrmfs_init()`.
pub fn size_of_superblock(use_memfs: bool, use_spillover: bool) -> usize {
    let mut size = IndexStack::byte_len(MAX_FILES as u32)
        + FileTable::byte_len(MAX_FILES as u32)
        + IndexStack::byte_len(MAX_CHUNKS as u32);
    if use_spillover {
        size += IndexStack::byte_len(MAX_SPILL_CHUNKS as u32);
    }
    if use_memfs {
        size += ChunkPool::byte_len(MAX_CHUNKS as u32);
    }
    size
}

/// Owns the shared-memory segment and the views carved out of it. Dropping
/// this drops the `ShmHandle`, which unlinks the segment once the last
/// process holding it detaches (POSIX) or is a no-op (Windows, pagefile-backed).
pub struct Superblock {
    _shm: ShmHandle,
    pub free_fids: IndexStack,
    pub file_table: FileTable,
    pub free_chunks: IndexStack,
    pub free_spill: Option<IndexStack>,
    pub chunk_pool: Option<ChunkPool>,
}

impl Superblock {
    /// Attach to (or create) the named segment for this mount, carving out
    /// every region in the fixed order and initializing them only if this
    /// handle turns out to be the segment's first attacher. Mirrors
    /// `scrmfs_superblock_shmget`'s create-vs-attach branch, generalized
    /// from `shmget`'s `EEXIST` check to `ShmHandle::is_first_attach`.
    pub fn attach_or_create(name: &str, use_memfs: bool, use_spillover: bool) -> std::io::Result<Self> {
        let size = size_of_superblock(use_memfs, use_spillover);
        let shm = ShmHandle::acquire(name, size, ShmOpenMode::CreateOrOpen)?;
        let first = shm.is_first_attach();
        if first {
            log::debug!("superblock {name}: created at {:p} ({size} bytes)", shm.as_ptr());
        } else {
            log::debug!("superblock {name}: exists, attaching at {:p}", shm.as_ptr());
        }
        let base = shm.as_mut_ptr();

        let mut offset = 0usize;
        let free_fids = Self::carve_stack(base, &mut offset, MAX_FILES as u32, first);
        let file_table = Self::carve_file_table(base, &mut offset, first);
        let free_chunks = Self::carve_stack(base, &mut offset, MAX_CHUNKS as u32, first);
        let free_spill = if use_spillover {
            Some(Self::carve_stack(base, &mut offset, MAX_SPILL_CHUNKS as u32, first))
        } else {
            None
        };
        let chunk_pool = if use_memfs {
            Some(Self::carve_chunk_pool(base, &mut offset, first))
        } else {
            None
        };

        Ok(Superblock {
            _shm: shm,
            free_fids,
            file_table,
            free_chunks,
            free_spill,
            chunk_pool,
        })
    }

    fn carve_stack(base: *mut u8, offset: &mut usize, capacity: u32, init: bool) -> IndexStack {
        let len = IndexStack::byte_len(capacity);
        let ptr = unsafe { base.add(*offset) };
        *offset += len;
        if init {
            unsafe { IndexStack::init_at(ptr, capacity) }
        } else {
            unsafe { IndexStack::attach(ptr, capacity) }
        }
    }

    fn carve_file_table(base: *mut u8, offset: &mut usize, init: bool) -> FileTable {
        let len = FileTable::byte_len(MAX_FILES as u32);
        let ptr = unsafe { base.add(*offset) };
        *offset += len;
        if init {
            unsafe { FileTable::init_at(ptr, MAX_FILES as u32) }
        } else {
            unsafe { FileTable::attach(ptr, MAX_FILES as u32) }
        }
    }

    fn carve_chunk_pool(base: *mut u8, offset: &mut usize, _init: bool) -> ChunkPool {
        let len = ChunkPool::byte_len(MAX_CHUNKS as u32);
        let ptr = unsafe { base.add(*offset) };
        *offset += len;
        unsafe { ChunkPool::attach(ptr, MAX_CHUNKS as u32) }
    }
}

/// Build a spillover backing file path colocated with the segment name,
/// used when the caller hasn't supplied an explicit path. Not present in
/// the original (it hardcodes `/data/spill_file`); kept overridable via
/// `EngineConfig::spillover_path` instead.
pub fn default_spillover_path(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{name}.spill"))
}
