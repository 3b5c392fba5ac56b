// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed-capacity, shared-memory-resident free-index stack.
//
// The original source tracks free file and chunk ids with a single global
// `int stack_lock`, a `top` counter and a flat `int[]` of free ids
// (`scrmfs_stack_init`/`scrmfs_stack_pop`/`scrmfs_stack_push` in
// scrmfs-posix.c). This module reproduces that exact array-stack shape
// rather than the linked `next[]` free-list a differently-shaped id pool
// might use elsewhere in this crate's history — the two aren't swappable,
// so this is a fresh implementation, not a port.
//
// Locking reuses `SpinLock`, embedded directly in the header so the whole
// structure — lock included — lives inside the raw byte layout and
// requires no out-of-band OS object.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::spin_lock::SpinLock;

#[repr(C)]
struct RawHeader {
    capacity: u32,
    top: AtomicI64,
    lock: SpinLock,
}

/// Whether the free-stack guard should actually take the spin lock.
///
/// In `Private` mode the segment has exactly one attaching process and the
/// caller is assumed to drive the engine from a single thread at a time (the
/// classic one-rank-one-thread HPC deployment) — skipping the lock in that
/// regime avoids paying for an atomic round-trip on every chunk allocation
/// for a lock that could never be contended. A caller that *does* want
/// several threads of one process racing on the same engine needs `Shared`
/// mode's guarded stacks for correctness, even though no other process is
/// involved; `Shared` always takes the lock, process-local contention
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Private,
    Shared,
}

/// A view over a `[capacity, top, slots[capacity]]` region living inside a
/// shared-memory segment. Does not own the backing memory — the superblock
/// that carves out the region is responsible for keeping it alive.
pub struct IndexStack {
    header: *mut RawHeader,
    slots: *mut u32,
    capacity: u32,
}

// Safety: all access to the shared region goes through the embedded
// SpinLock (or is deliberately unguarded in Private mode by a single
// owning thread), matching the discipline `PlatformShm` already assumes.
unsafe impl Send for IndexStack {}
unsafe impl Sync for IndexStack {}

impl IndexStack {
    /// Number of bytes a stack of the given capacity occupies, including
    /// its header. Callers use this to compute superblock offsets.
    pub const fn byte_len(capacity: u32) -> usize {
        std::mem::size_of::<RawHeader>() + capacity as usize * std::mem::size_of::<u32>()
    }

    /// Carve out a view over `capacity` slots starting at `base`, WITHOUT
    /// touching the bytes. Used when attaching to a segment someone else
    /// already initialized.
    ///
    /// # Safety
    /// `base` must point to at least `byte_len(capacity)` writable bytes,
    /// alive for as long as the returned `IndexStack` is used.
    pub unsafe fn attach(base: *mut u8, capacity: u32) -> Self {
        let header = base as *mut RawHeader;
        let slots = base.add(std::mem::size_of::<RawHeader>()) as *mut u32;
        IndexStack {
            header,
            slots,
            capacity,
        }
    }

    /// Carve out a view over `capacity` slots starting at `base` and
    /// initialize it as "every id 0..capacity is free".
    ///
    /// # Safety
    /// Same requirements as [`attach`](Self::attach); additionally, no
    /// other process may be reading or writing this region concurrently.
    pub unsafe fn init_at(base: *mut u8, capacity: u32) -> Self {
        let stack = Self::attach(base, capacity);
        (*stack.header).capacity = capacity;
        (*stack.header).top = AtomicI64::new(capacity as i64);
        for i in 0..capacity {
            *stack.slots.add(i as usize) = i;
        }
        stack
    }

    fn lock(&self, mode: LockMode) {
        if mode == LockMode::Shared {
            unsafe { (*self.header).lock.lock() };
        }
    }

    fn unlock(&self, mode: LockMode) {
        if mode == LockMode::Shared {
            unsafe { (*self.header).lock.unlock() };
        }
    }

    /// Pop a free id off the stack, or `None` if it's exhausted.
    pub fn pop(&self, mode: LockMode) -> Option<u32> {
        self.lock(mode);
        let top = unsafe { (*self.header).top.load(Ordering::Relaxed) };
        let result = if top <= 0 {
            None
        } else {
            let idx = (top - 1) as usize;
            let id = unsafe { *self.slots.add(idx) };
            unsafe { (*self.header).top.store(top - 1, Ordering::Relaxed) };
            Some(id)
        };
        self.unlock(mode);
        result
    }

    /// Push a previously popped id back onto the stack.
    ///
    /// Debug builds assert the stack doesn't overflow its declared
    /// capacity — that would mean a caller pushed an id it never popped,
    /// a logic bug rather than a runtime condition.
    pub fn push(&self, id: u32, mode: LockMode) {
        self.lock(mode);
        let top = unsafe { (*self.header).top.load(Ordering::Relaxed) };
        debug_assert!(
            (top as u64) < self.capacity as u64,
            "index stack overflow: pushed more ids than its capacity"
        );
        unsafe {
            *self.slots.add(top as usize) = id;
            (*self.header).top.store(top + 1, Ordering::Relaxed);
        }
        self.unlock(mode);
    }

    /// Number of free ids currently on the stack.
    pub fn free_count(&self, mode: LockMode) -> u32 {
        self.lock(mode);
        let top = unsafe { (*self.header).top.load(Ordering::Relaxed) };
        self.unlock(mode);
        top as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
