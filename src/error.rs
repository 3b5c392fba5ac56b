// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the engine, mapped 1:1 onto the POSIX errno codes the
// original source returns (SCRMFS_ERR_* in scrmfs-file.h). Grounded on the
// thiserror-based error enums used throughout examples/other_examples/.

use thiserror::Error;

/// Engine-level error. Every variant maps to exactly one POSIX errno so a
/// syscall-intercepting caller can translate it back without guesswork.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("no space left on device")]
    NoSpace,

    #[error("I/O error")]
    Io,

    #[error("file name too long")]
    NameTooLong,

    #[error("no such file or directory")]
    NotFound,

    #[error("file already exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotDir,

    #[error("is a directory")]
    IsDir,

    #[error("directory not empty")]
    NotEmpty,

    #[error("bad file descriptor")]
    BadDescriptor,

    #[error("invalid argument")]
    Invalid,

    #[error("too many open files")]
    TooManyOpenFiles,

    #[error("operation not supported")]
    NotSupported,

    #[error("invalid cross-device link")]
    CrossDevice,
}

impl EngineError {
    /// The POSIX errno this variant corresponds to, for callers that need
    /// to hand a value back across a syscall-shaped boundary.
    pub fn to_errno(self) -> i32 {
        match self {
            EngineError::NoSpace => libc::ENOSPC,
            EngineError::Io => libc::EIO,
            EngineError::NameTooLong => libc::ENAMETOOLONG,
            EngineError::NotFound => libc::ENOENT,
            EngineError::AlreadyExists => libc::EEXIST,
            EngineError::NotDir => libc::ENOTDIR,
            EngineError::IsDir => libc::EISDIR,
            EngineError::NotEmpty => libc::ENOTEMPTY,
            EngineError::BadDescriptor => libc::EBADF,
            EngineError::Invalid => libc::EINVAL,
            EngineError::TooManyOpenFiles => libc::EMFILE,
            EngineError::NotSupported => libc::ENOTSUP,
            EngineError::CrossDevice => libc::EXDEV,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => EngineError::NotFound,
            std::io::ErrorKind::AlreadyExists => EngineError::AlreadyExists,
            std::io::ErrorKind::InvalidInput => EngineError::Invalid,
            _ => EngineError::Io,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(unix)]
mod libc_errno_check {
    // Compile-time reminder that to_errno()'s targets are libc constants,
    // not magic numbers, should the platform ever lack one of them.
    #[allow(dead_code)]
    fn _assert_errno_constants_exist() {
        let _: i32 = libc::ENOSPC;
        let _: i32 = libc::EMFILE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_is_stable() {
        assert_eq!(EngineError::NoSpace.to_errno(), libc::ENOSPC);
        assert_eq!(EngineError::NotFound.to_errno(), libc::ENOENT);
        assert_eq!(EngineError::IsDir.to_errno(), libc::EISDIR);
        assert_eq!(EngineError::NotEmpty.to_errno(), libc::ENOTEMPTY);
        assert_eq!(EngineError::CrossDevice.to_errno(), libc::EXDEV);
    }

    #[test]
    fn io_error_not_found_maps_through() {
        let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(EngineError::from(io_err), EngineError::NotFound);
    }
}
