// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Path router (C11): the single boundary that distinguishes host calls from
// engine calls. Grounded on `scrmfs_intercept_path`/the `oldfd < fd_limit`
// check in `scrmfs_dup`/`scrmfs_close`/open-path handle allocation (`fid +
// scrmfs_fd_limit`) in `original_source/runtime/lib/scrmfs-posix.c`.
//
// The source exposes handles as a raw `int` aliased into a range above the
// host's fd limit. This crate names that boundary as a typed `Handle`
// instead (spec.md §9 DESIGN NOTES), so callers can't accidentally treat an
// engine handle as a host fd or vice versa; `Router` owns the encode/decode.

/// A handle returned across the router boundary: either a pass-through host
/// fd, or an index into this engine's descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Host(i32),
    Engine(u32),
}

/// Decides, for a given mount, whether a path or a handle belongs to the
/// engine or should pass through to the host.
///
/// `fd_limit` mirrors `scrmfs_fd_limit`: the host process's current max real
/// fd (from `getrlimit(RLIMIT_NOFILE)`), captured once at mount time, not
/// recomputed per call.
pub struct Router {
    mount_prefix: String,
    fd_limit: u32,
}

impl Router {
    pub fn new(mount_prefix: impl Into<String>, fd_limit: u32) -> Self {
        Router {
            mount_prefix: mount_prefix.into(),
            fd_limit,
        }
    }

    pub fn fd_limit(&self) -> u32 {
        self.fd_limit
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// True iff `path` falls under this mount and should be routed to the
    /// engine rather than the host filesystem.
    pub fn intercept_path(&self, path: &str) -> bool {
        path.starts_with(self.mount_prefix.as_str())
    }

    /// Encode an engine descriptor index as the externally-visible handle
    /// value (`fid + FD_LIMIT`, generalized to the descriptor table's own
    /// index space per `descriptor.rs`'s independence from `fid`).
    pub fn encode(&self, descriptor_idx: u32) -> Handle {
        Handle::Engine(descriptor_idx)
    }

    /// Decode an externally-visible integer handle, routing it to the host
    /// if it falls below `fd_limit`, or to the engine's descriptor table
    /// otherwise. Mirrors `oldfd < scrmfs_fd_limit` / `newfd = oldfd -
    /// scrmfs_fd_limit`.
    pub fn decode(&self, raw: i64) -> Handle {
        if raw < 0 || (raw as u64) < self.fd_limit as u64 {
            Handle::Host(raw as i32)
        } else {
            Handle::Engine((raw as u64 - self.fd_limit as u64) as u32)
        }
    }

    /// The raw integer value a `Handle` would be exposed as.
    pub fn raw(&self, handle: Handle) -> i64 {
        match handle {
            Handle::Host(fd) => fd as i64,
            Handle::Engine(idx) => self.fd_limit as i64 + idx as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intercept_path_matches_mount_prefix() {
        let router = Router::new("/tmp/scrmfs", 256);
        assert!(router.intercept_path("/tmp/scrmfs/a"));
        assert!(!router.intercept_path("/tmp/other/a"));
    }

    #[test]
    fn decode_below_fd_limit_is_host() {
        let router = Router::new("/tmp/scrmfs", 256);
        assert_eq!(router.decode(10), Handle::Host(10));
        assert_eq!(router.decode(-1), Handle::Host(-1));
    }

    #[test]
    fn decode_at_or_above_fd_limit_is_engine() {
        let router = Router::new("/tmp/scrmfs", 256);
        assert_eq!(router.decode(256), Handle::Engine(0));
        assert_eq!(router.decode(260), Handle::Engine(4));
    }

    #[test]
    fn encode_then_raw_round_trips() {
        let router = Router::new("/tmp/scrmfs", 256);
        let h = router.encode(7);
        assert_eq!(router.raw(h), 263);
        assert_eq!(router.decode(263), h);
    }
}
