// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Chunk addressing: splitting a logical file position into chunk index +
// in-chunk offset, and decoding a stored (location, physical id) pair into
// a typed location.
//
// The original source keeps chunk location and physical id as two plain
// ints per chunk slot (`scrmfs_chunkmeta_t.location` /
// `scrmfs_chunkmeta_t.id`) and discriminates the tier by comparing the
// physical id against SCRMFS_MAX_CHUNKS inline at every call site. This
// module collapses that pattern into one enum at the Rust boundary so
// chunk_store.rs and spillover.rs never see an ambiguous bare integer.

use crate::config::{CHUNK_BITS, CHUNK_SIZE, MAX_CHUNKS};
use crate::error::{EngineError, EngineResult};

const LOCATION_NONE: u32 = 0;
const LOCATION_MEMORY: u32 = 1;
const LOCATION_SPILLOVER: u32 = 2;

/// Where a logical chunk's bytes physically live.
///
/// `Spillover(j)` carries the *local* spillover-store index — the raw
/// on-disk physical id (`MAX_CHUNKS + j`) is only ever seen at the
/// encode/decode boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLocation {
    Memory(u32),
    Spillover(u32),
}

impl ChunkLocation {
    /// Encode into the on-disk `(location, physical_id)` pair.
    pub fn encode(self) -> (u32, u32) {
        match self {
            ChunkLocation::Memory(id) => (LOCATION_MEMORY, id),
            ChunkLocation::Spillover(j) => (LOCATION_SPILLOVER, MAX_CHUNKS as u32 + j),
        }
    }

    /// Decode a stored `(location, physical_id)` pair. `Ok(None)` means the
    /// slot has never been allocated (location tag `LOCATION_NONE`).
    pub fn decode(location: u32, physical_id: u32) -> EngineResult<Option<Self>> {
        match location {
            LOCATION_NONE => Ok(None),
            LOCATION_MEMORY => {
                if physical_id as usize >= MAX_CHUNKS {
                    return Err(EngineError::Invalid);
                }
                Ok(Some(ChunkLocation::Memory(physical_id)))
            }
            LOCATION_SPILLOVER => {
                if (physical_id as usize) < MAX_CHUNKS {
                    return Err(EngineError::Invalid);
                }
                Ok(Some(ChunkLocation::Spillover(physical_id - MAX_CHUNKS as u32)))
            }
            _ => Err(EngineError::Invalid),
        }
    }
}

/// The `(logical_chunk, offset_in_chunk)` pair a byte position splits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplit {
    pub logical_chunk: u32,
    pub offset_in_chunk: u32,
}

/// Split an absolute byte position into its logical chunk index and
/// in-chunk offset. Mirrors `scrmfs_compute_chunk_buf` / the spillover
/// offset arithmetic in the original source, generalized to one function
/// since both tiers share the same `CHUNK_SIZE`.
pub fn split(pos: u64) -> ChunkSplit {
    ChunkSplit {
        logical_chunk: (pos >> CHUNK_BITS) as u32,
        offset_in_chunk: (pos & (CHUNK_SIZE as u64 - 1)) as u32,
    }
}

/// Iterator adapter that walks `[pos, pos + count)` as a sequence of
/// chunk-bounded spans: `(logical_chunk, offset_in_chunk, span_len)`. The
/// first span starts at `pos`'s in-chunk offset; every subsequent span
/// starts at offset 0, each bounded by `min(remaining, CHUNK_SIZE)` — the
/// same loop invariant `scrmfs_fid_write`/`scrmfs_fid_read` use to walk a
/// request across chunk boundaries.
pub struct ChunkSpans {
    pos: u64,
    remaining: u64,
}

impl ChunkSpans {
    pub fn new(pos: u64, count: u64) -> Self {
        ChunkSpans { pos, remaining: count }
    }
}

impl Iterator for ChunkSpans {
    type Item = (u32, u32, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let split = split(self.pos);
        let room_in_chunk = CHUNK_SIZE as u64 - split.offset_in_chunk as u64;
        let span_len = room_in_chunk.min(self.remaining) as usize;
        self.pos += span_len as u64;
        self.remaining -= span_len as u64;
        Some((split.logical_chunk, split.offset_in_chunk, span_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_chunk_boundary() {
        let s = split(CHUNK_SIZE as u64);
        assert_eq!(s.logical_chunk, 1);
        assert_eq!(s.offset_in_chunk, 0);
    }

    #[test]
    fn split_mid_chunk() {
        let s = split(CHUNK_SIZE as u64 + 42);
        assert_eq!(s.logical_chunk, 1);
        assert_eq!(s.offset_in_chunk, 42);
    }

    #[test]
    fn encode_decode_round_trips() {
        for loc in [ChunkLocation::Memory(7), ChunkLocation::Spillover(3)] {
            let (tag, id) = loc.encode();
            assert_eq!(ChunkLocation::decode(tag, id).unwrap(), Some(loc));
        }
    }

    #[test]
    fn decode_none_for_unallocated_slot() {
        assert_eq!(ChunkLocation::decode(0, 0).unwrap(), None);
    }

    #[test]
    fn decode_rejects_inconsistent_tier() {
        // Spillover tag with a physical id inside the memory range is bogus.
        assert!(ChunkLocation::decode(2, 0).is_err());
    }

    #[test]
    fn chunk_spans_crosses_multiple_chunks() {
        let pos = CHUNK_SIZE as u64 - 10;
        let count = 30u64;
        let spans: Vec<_> = ChunkSpans::new(pos, count).collect();
        assert_eq!(spans, vec![(0, (CHUNK_SIZE - 10) as u32, 10), (1, 0, 20)]);
    }

    #[test]
    fn chunk_spans_empty_for_zero_count() {
        assert_eq!(ChunkSpans::new(0, 0).count(), 0);
    }
}
