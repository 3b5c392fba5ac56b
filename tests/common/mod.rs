// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared test-only scaffolding for the integration suites. Rust test
// binaries run `#[test]` functions on a thread pool within one process, so
// any test that sets a process-global env var (`USE_SPILLOVER`,
// `USE_SINGLE_SHM`) must hold this lock for the duration of the mount it
// affects, or a sibling test running in parallel could observe the wrong
// value.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub static DEFAULT_ENV_LOCK: Mutex<()> = Mutex::new(());

static MOUNT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A mount prefix unique to this test process, so parallel tests never
/// collide on the same engine-owned namespace entry.
pub fn unique_prefix(label: &str) -> String {
    let n = MOUNT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/tmp/libramfs-test-{label}-{n}")
}

/// A `rank` unique to this test process, so parallel `USE_SINGLE_SHM` tests
/// each land on their own shared-memory segment (`SUPERBLOCK_KEY + rank`)
/// instead of fighting over one superblock's chunk pool.
pub fn unique_rank() -> i32 {
    (std::process::id() % 10_000) as i32 * 1000 + MOUNT_COUNTER.fetch_add(1, Ordering::Relaxed) as i32
}

/// Set (or clear) an env var for the duration of a closure, restoring the
/// previous value afterward. Caller must hold `DEFAULT_ENV_LOCK`.
pub fn with_env_var<T>(name: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
    let previous = std::env::var(name).ok();
    match value {
        Some(v) => std::env::set_var(name, v),
        None => std::env::remove_var(name),
    }
    let result = f();
    match previous {
        Some(v) => std::env::set_var(name, v),
        None => std::env::remove_var(name),
    }
    result
}
