// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Engine lifecycle (C10): the top-level type that wires the superblock,
// spillover store, descriptor table, and router together and exposes the
// external interface spec.md §6 names. Grounded on `scrmfs_mount`/
// `scrmfs_init` (lifecycle), and the POSIX wrapper bodies (`creat`, `open`,
// `read`, `write`, `pread`, `pwrite`, `lseek`, `close`, `mkdir`, `rmdir`,
// `rename`, `truncate`, `unlink`, `stat`, `fsync`, `flock`, `mmap`) in
// `original_source/runtime/lib/scrmfs-posix.c`.

use std::path::PathBuf;

use crate::config::{EngineConfig, MAX_FILENAME, MAX_SPILL_CHUNKS};
use crate::descriptor::{DescriptorTable, Whence};
use crate::directory::is_dir_empty;
use crate::error::{EngineError, EngineResult};
use crate::index_stack::LockMode;
use crate::pipeline::Pipeline;
use crate::router::{Handle, Router};
use crate::spillover::SpillStore;
use crate::superblock::Superblock;

/// `open()`/`creat()` flags this engine understands. Modeled as a plain
/// struct rather than pulling in a bitflags crate, mirroring how small and
/// fixed the flag set is (`O_CREAT`, `O_EXCL`, `O_TRUNC`, `O_APPEND`,
/// `O_DIRECTORY`, `O_RDONLY`/`O_WRONLY`/`O_RDWR`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    pub create: bool,
    pub exclusive: bool,
    pub truncate: bool,
    pub append: bool,
    pub directory: bool,
    pub readable: bool,
    pub writable: bool,
}

/// Result of `stat`: spec.md §6 says only `size` and regular/directory mode
/// are meaningful, everything else is zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub size: u64,
    pub is_dir: bool,
}

/// The mounted engine instance: one superblock attachment, one descriptor
/// table, one router, for one mount prefix.
pub struct Engine {
    config: EngineConfig,
    router: Router,
    superblock: Superblock,
    spill_store: Option<SpillStore>,
    descriptors: DescriptorTable,
    lock_mode: LockMode,
}

impl Engine {
    /// Mount the engine at `prefix`. Mirrors `scrmfs_mount`: builds
    /// configuration from the environment, attaches or creates the
    /// superblock, opens the spillover store if enabled, and claims a
    /// directory entry for the mount prefix itself — failing if one
    /// already exists.
    pub fn mount(prefix: &str, rank: i32, spillover_path: impl Into<PathBuf>) -> EngineResult<Self> {
        let config = EngineConfig::from_env(rank, spillover_path);
        log::debug!(
            "mount({prefix}): use_memfs={} use_spillover={} use_single_shm={}",
            config.use_memfs, config.use_spillover, config.use_single_shm
        );
        if config.use_containers {
            // Containers are reserved/out of scope (spec.md §1 Non-goals).
            return Err(EngineError::NotSupported);
        }

        let segment_name = segment_name(&config);
        let superblock = Superblock::attach_or_create(&segment_name, config.use_memfs, config.use_spillover)
            .map_err(|e| {
                log::warn!("mount({prefix}): superblock attach/create failed: {e}");
                EngineError::from(e)
            })?;

        let spill_store = if config.use_spillover {
            Some(
                SpillStore::open_or_create(&config.spillover_path, MAX_SPILL_CHUNKS as u32)
                    .map_err(EngineError::from)?,
            )
        } else {
            None
        };

        let lock_mode = if config.use_single_shm {
            LockMode::Shared
        } else {
            LockMode::Private
        };

        if superblock.file_table.lookup(prefix).is_some() {
            return Err(EngineError::AlreadyExists);
        }
        let fid = superblock
            .free_fids
            .pop(lock_mode)
            .ok_or(EngineError::NoSpace)?;
        superblock.file_table.activate(fid, prefix, true)?;

        let router = Router::new(prefix.to_string(), fd_limit_hint());

        Ok(Engine {
            config,
            router,
            superblock,
            spill_store,
            descriptors: DescriptorTable::new(crate::config::MAX_FILES),
            lock_mode,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn intercept_path(&self, path: &str) -> bool {
        self.router.intercept_path(path)
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            table: &self.superblock.file_table,
            free_chunks: &self.superblock.free_chunks,
            free_spill: self.superblock.free_spill.as_ref(),
            chunk_pool: self
                .superblock
                .chunk_pool
                .as_ref()
                .expect("chunk pool must exist when use_memfs is true or caller only uses spillover"),
            spill_store: self.spill_store.as_ref(),
            use_memfs: self.config.use_memfs,
            use_spillover: self.config.use_spillover,
            lock_mode: self.lock_mode,
        }
    }

    fn lookup_file(&self, path: &str) -> EngineResult<u32> {
        self.superblock.file_table.lookup(path).ok_or(EngineError::NotFound)
    }

    // ---- path operations (§6) ----

    pub fn access(&self, path: &str) -> EngineResult<()> {
        self.lookup_file(path).map(|_| ())
    }

    pub fn mkdir(&self, path: &str) -> EngineResult<()> {
        if self.superblock.file_table.lookup(path).is_some() {
            return Err(EngineError::AlreadyExists);
        }
        if path.as_bytes().len() + 1 > MAX_FILENAME {
            return Err(EngineError::NameTooLong);
        }
        let fid = self
            .superblock
            .free_fids
            .pop(self.lock_mode)
            .ok_or(EngineError::NoSpace)?;
        self.superblock.file_table.activate(fid, path, true)
    }

    pub fn rmdir(&self, path: &str) -> EngineResult<()> {
        if path == self.router.mount_prefix() {
            return Err(EngineError::Invalid);
        }
        let fid = self.lookup_file(path)?;
        if !self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::NotDir);
        }
        if !is_dir_empty(&self.superblock.file_table, path) {
            return Err(EngineError::NotEmpty);
        }
        self.release_fid(fid)
    }

    /// Renames within this mount only. A path on either side that falls
    /// outside the mount prefix is a cross-device rename, which this engine
    /// can't perform atomically (the two paths may live on different
    /// superblocks entirely) — reported as `EXDEV`, matching the errno a
    /// caller would get renaming across a real filesystem boundary.
    pub fn rename(&self, old_path: &str, new_path: &str) -> EngineResult<()> {
        if !self.intercept_path(old_path) || !self.intercept_path(new_path) {
            return Err(EngineError::CrossDevice);
        }
        let fid = self.lookup_file(old_path)?;
        if self.superblock.file_table.lookup(new_path).is_some() {
            return Err(EngineError::AlreadyExists);
        }
        self.superblock.file_table.rename(fid, new_path)
    }

    pub fn truncate(&self, path: &str, length: u64) -> EngineResult<()> {
        let fid = self.lookup_file(path)?;
        self.pipeline().truncate(fid, length)
    }

    pub fn unlink(&self, path: &str) -> EngineResult<()> {
        let fid = self.lookup_file(path)?;
        if self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::IsDir);
        }
        self.release_fid(fid)
    }

    fn release_fid(&self, fid: u32) -> EngineResult<()> {
        self.pipeline().unlink(fid)?;
        self.superblock.file_table.deactivate(fid);
        self.superblock.free_fids.push(fid, self.lock_mode);
        Ok(())
    }

    pub fn stat(&self, path: &str) -> EngineResult<Stat> {
        let fid = self.lookup_file(path)?;
        Ok(Stat {
            size: self.superblock.file_table.size(fid),
            is_dir: self.superblock.file_table.is_dir(fid),
        })
    }

    // ---- descriptor operations (§6) ----

    /// `creat(path)`: create-or-truncate then open for writing. Mirrors
    /// `SCRMFS_DECL(creat)`.
    pub fn creat(&self, path: &str) -> EngineResult<Handle> {
        self.open(path, OpenFlags {
            create: true,
            truncate: true,
            writable: true,
            ..Default::default()
        })
    }

    /// `open(path, flags)`. Honors `O_CREAT`/`O_EXCL`/`O_TRUNC`/`O_APPEND`/
    /// `O_DIRECTORY` per spec.md §6; mirrors the fid lookup/creation half of
    /// `SCRMFS_DECL(open)`.
    pub fn open(&self, path: &str, flags: OpenFlags) -> EngineResult<Handle> {
        if path.as_bytes().len() + 1 > MAX_FILENAME {
            return Err(EngineError::NameTooLong);
        }

        let fid = match self.superblock.file_table.lookup(path) {
            Some(fid) => {
                if flags.create && flags.exclusive {
                    return Err(EngineError::AlreadyExists);
                }
                if flags.directory && !self.superblock.file_table.is_dir(fid) {
                    return Err(EngineError::NotDir);
                }
                if self.superblock.file_table.is_dir(fid) && (flags.writable || flags.truncate) {
                    return Err(EngineError::IsDir);
                }
                if flags.truncate {
                    self.pipeline().truncate(fid, 0)?;
                }
                fid
            }
            None => {
                if !flags.create {
                    return Err(EngineError::NotFound);
                }
                let fid = self
                    .superblock
                    .free_fids
                    .pop(self.lock_mode)
                    .ok_or(EngineError::NoSpace)?;
                self.superblock.file_table.activate(fid, path, false)?;
                fid
            }
        };

        let position = if flags.append {
            self.superblock.file_table.size(fid)
        } else {
            0
        };
        let idx = self
            .descriptors
            .open(fid, position, flags.readable || !flags.writable, flags.writable, flags.append)?;
        Ok(self.router.encode(idx))
    }

    fn engine_idx(&self, handle: Handle) -> EngineResult<u32> {
        match handle {
            Handle::Engine(idx) => Ok(idx),
            Handle::Host(_) => Err(EngineError::BadDescriptor),
        }
    }

    pub fn close(&self, handle: Handle) -> EngineResult<()> {
        let idx = self.engine_idx(handle)?;
        self.descriptors.close(idx)
    }

    pub fn read(&self, handle: Handle, buf: &mut [u8]) -> EngineResult<usize> {
        let idx = self.engine_idx(handle)?;
        let (readable, _, _) = self.descriptors.mode(idx)?;
        if !readable {
            return Err(EngineError::BadDescriptor);
        }
        let fid = self.descriptors.fid(idx)?;
        if self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::IsDir);
        }
        let pos = self.descriptors.position(idx)?;
        let n = self.read_at(fid, pos, buf)?;
        self.descriptors.set_position(idx, pos + n as u64)?;
        Ok(n)
    }

    pub fn write(&self, handle: Handle, buf: &[u8]) -> EngineResult<usize> {
        let idx = self.engine_idx(handle)?;
        let (_, writable, append) = self.descriptors.mode(idx)?;
        if !writable {
            return Err(EngineError::BadDescriptor);
        }
        let fid = self.descriptors.fid(idx)?;
        if self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::Invalid);
        }
        if append {
            let size = self.superblock.file_table.size(fid);
            self.descriptors.set_position(idx, size)?;
        }
        let pos = self.descriptors.position(idx)?;
        self.write_at(fid, pos, buf)?;
        self.descriptors.set_position(idx, pos + buf.len() as u64)?;
        Ok(buf.len())
    }

    pub fn pread(&self, handle: Handle, buf: &mut [u8], offset: u64) -> EngineResult<usize> {
        let idx = self.engine_idx(handle)?;
        let (readable, _, _) = self.descriptors.mode(idx)?;
        if !readable {
            return Err(EngineError::BadDescriptor);
        }
        let fid = self.descriptors.fid(idx)?;
        if self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::IsDir);
        }
        self.read_at(fid, offset, buf)
    }

    pub fn pwrite(&self, handle: Handle, buf: &[u8], offset: u64) -> EngineResult<usize> {
        let idx = self.engine_idx(handle)?;
        let (_, writable, _) = self.descriptors.mode(idx)?;
        if !writable {
            return Err(EngineError::BadDescriptor);
        }
        let fid = self.descriptors.fid(idx)?;
        if self.superblock.file_table.is_dir(fid) {
            return Err(EngineError::Invalid);
        }
        self.write_at(fid, offset, buf)?;
        Ok(buf.len())
    }

    fn read_at(&self, fid: u32, pos: u64, buf: &mut [u8]) -> EngineResult<usize> {
        let size = self.superblock.file_table.size(fid);
        let count = if pos >= size { 0 } else { ((size - pos) as usize).min(buf.len()) };
        if count > 0 {
            self.pipeline().read(fid, pos, &mut buf[..count])?;
        }
        Ok(count)
    }

    fn write_at(&self, fid: u32, pos: u64, buf: &[u8]) -> EngineResult<()> {
        self.pipeline().extend(fid, pos + buf.len() as u64)?;
        self.pipeline().write(fid, pos, buf)
    }

    pub fn lseek(&self, handle: Handle, offset: i64, whence: Whence) -> EngineResult<u64> {
        let idx = self.engine_idx(handle)?;
        let fid = self.descriptors.fid(idx)?;
        let size = self.superblock.file_table.size(fid);
        self.descriptors.seek(idx, offset, whence, size)
    }

    /// No-op, matching `SCRMFS_DECL(fsync)`'s intercepted branch.
    pub fn fsync(&self, handle: Handle) -> EngineResult<()> {
        self.engine_idx(handle).map(|_| ())
    }

    /// No-op, matching `SCRMFS_DECL(flock)`'s intercepted branch (the
    /// source's actual locking code was removed upstream after causing
    /// hangs; this crate never implemented it in the first place).
    pub fn flock(&self, handle: Handle) -> EngineResult<()> {
        self.engine_idx(handle).map(|_| ())
    }

    /// Read-only snapshot `mmap`: copies the file's current bytes into a
    /// freshly allocated, page-aligned buffer rather than mapping engine
    /// memory directly into the caller's address space (spec.md §6).
    pub fn mmap(&self, handle: Handle) -> EngineResult<Vec<u8>> {
        let idx = self.engine_idx(handle)?;
        let fid = self.descriptors.fid(idx)?;
        let size = self.superblock.file_table.size(fid) as usize;
        let mut buf = vec![0u8; size];
        if size > 0 {
            self.pipeline().read(fid, 0, &mut buf)?;
        }
        Ok(buf)
    }
}

/// Build a segment name unique to this mount's configuration. Shared mode
/// derives a deterministic name from the rank-offset key (so cooperating
/// processes agree on it, mirroring `SCRMFS_SUPERBLOCK_KEY + rank`);
/// private mode derives a name unique to this process and call, mirroring
/// `IPC_PRIVATE`'s "never attachable by another shmget" guarantee.
fn segment_name(config: &EngineConfig) -> String {
    if config.use_single_shm {
        crate::shm_name::make_shm_name(&format!("libramfs-{}", config.shm_key()))
    } else {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        crate::shm_name::make_shm_name(&format!("libramfs-priv-{}-{}", std::process::id(), n))
    }
}

/// The host process's current max real fd, used to offset engine handles
/// above the host's fd range. Mirrors `getrlimit(RLIMIT_NOFILE)` in
/// `scrmfs_init()`; Windows has no equivalent fd-range concept, so a fixed
/// conservative value stands in.
#[cfg(unix)]
fn fd_limit_hint() -> u32 {
    let mut limit = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc == 0 {
        limit.rlim_cur as u32
    } else {
        1024
    }
}

#[cfg(windows)]
fn fd_limit_hint() -> u32 {
    2048
}
