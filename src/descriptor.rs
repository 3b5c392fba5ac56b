// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Descriptor table (C9): per-open-instance state. Grounded on `scrmfs_fd_t`
// (`position`, `read`, `write` — `original_source/runtime/scrmfs-file.h`)
// and the `lseek`/`open`/`close` wrappers in `scrmfs-posix.c`.
//
// Deliberate departure from the source's literal shape: `scrmfs_fds` is a
// single array indexed directly by fid, so two `open()` calls on the same
// path collide on one shared position — but spec.md §8 Scenario 6 requires
// two descriptors on the same file to track position independently. This
// table therefore owns its own index space (capacity `MAX_FILES`, matching
// the router's handle range, not the file table's) rather than reusing fid
// 1:1, per the typed-handle resolution in spec.md §9 DESIGN NOTES. Each
// slot remembers which fid it refers to.
//
// Purely process-local state — unlike the superblock, no other process
// ever needs to see one process's open file descriptors, so this is a
// plain heap-allocated table guarded by a `Mutex`, not a shared-memory
// region.

use std::sync::Mutex;

use crate::error::{EngineError, EngineResult};

/// Per-open-instance state: position plus the read/write/append mode it was
/// opened with.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub fid: u32,
    pub position: u64,
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
}

/// Fixed-capacity table of open descriptors, keyed by an index independent
/// of `fid`.
pub struct DescriptorTable {
    slots: Mutex<Vec<Option<Descriptor>>>,
}

/// Seek origin, mirroring `SEEK_SET`/`SEEK_CUR`/`SEEK_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl DescriptorTable {
    pub fn new(capacity: usize) -> Self {
        DescriptorTable {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    /// Allocate a descriptor slot for `fid`, returning its index. Mirrors
    /// `open()`/`creat()` populating `scrmfs_fds[fid]`, generalized to a
    /// free slot search since this table isn't fid-indexed.
    pub fn open(
        &self,
        fid: u32,
        position: u64,
        readable: bool,
        writable: bool,
        append: bool,
    ) -> EngineResult<u32> {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(EngineError::TooManyOpenFiles)?;
        slots[idx] = Some(Descriptor {
            fid,
            position,
            readable,
            writable,
            append,
        });
        Ok(idx as u32)
    }

    /// Release a descriptor slot. The source's `close()` never frees its
    /// slot (spec.md §9 Open Questions flags this as a bug); this fixes it.
    pub fn close(&self, idx: u32) -> EngineResult<()> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.get_mut(idx as usize).ok_or(EngineError::BadDescriptor)?;
        if slot.take().is_none() {
            return Err(EngineError::BadDescriptor);
        }
        Ok(())
    }

    fn with_slot<T>(&self, idx: u32, f: impl FnOnce(&Descriptor) -> T) -> EngineResult<T> {
        let slots = self.slots.lock().unwrap();
        let slot = slots
            .get(idx as usize)
            .and_then(|s| s.as_ref())
            .ok_or(EngineError::BadDescriptor)?;
        Ok(f(slot))
    }

    pub fn fid(&self, idx: u32) -> EngineResult<u32> {
        self.with_slot(idx, |d| d.fid)
    }

    pub fn position(&self, idx: u32) -> EngineResult<u64> {
        self.with_slot(idx, |d| d.position)
    }

    pub fn mode(&self, idx: u32) -> EngineResult<(bool, bool, bool)> {
        self.with_slot(idx, |d| (d.readable, d.writable, d.append))
    }

    pub fn set_position(&self, idx: u32, position: u64) -> EngineResult<()> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .get_mut(idx as usize)
            .and_then(|s| s.as_mut())
            .ok_or(EngineError::BadDescriptor)?;
        slot.position = position;
        Ok(())
    }

    /// `lseek(SET/CUR/END)`. `file_size` supplies `meta.size` for `End`.
    pub fn seek(&self, idx: u32, offset: i64, whence: Whence, file_size: u64) -> EngineResult<u64> {
        let current = self.position(idx)?;
        let base: i64 = match whence {
            Whence::Set => 0,
            Whence::Cur => current.try_into().map_err(|_| EngineError::Invalid)?,
            Whence::End => file_size.try_into().map_err(|_| EngineError::Invalid)?,
        };
        let new_pos = base.checked_add(offset).ok_or(EngineError::Invalid)?;
        if new_pos < 0 {
            return Err(EngineError::Invalid);
        }
        let new_pos = new_pos as u64;
        self.set_position(idx, new_pos)?;
        Ok(new_pos)
    }
}
