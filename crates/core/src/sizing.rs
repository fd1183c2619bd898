//! Chunk sizing policy.
//!
//! Chunk size scales smoothly with file size along a sigmoid: small files
//! get many small chunks for upload parallelism, huge files get large
//! chunks to keep per-request overhead down. The curve's floor is 4 MiB,
//! its ceiling is `max_chunk_kb`, and its midpoint sits at ~1 GiB.

use crate::config::ChunkingConfig;
use serde::{Deserialize, Serialize};

/// Floor of the sizing curve, in KiB (4 MiB).
pub const MIN_CHUNK_KB: u64 = 4096;

/// Natural log of the sigmoid midpoint (~1 GiB).
const MIDPOINT_LN: f64 = 20.7944;

/// The chunking decision for one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPlan {
    /// File goes through the ordinary single-request upload path.
    Single,
    /// File is split into `total_chunks` chunks of `chunk_size` bytes
    /// (the last chunk may be shorter).
    Chunked { chunk_size: u64, total_chunks: u32 },
}

impl ChunkPlan {
    /// Whether the plan chose the chunked path.
    pub fn should_chunk(&self) -> bool {
        matches!(self, Self::Chunked { .. })
    }
}

/// Chunk size in bytes for a file of `file_size` bytes.
pub fn chunk_size_for(file_size: u64, max_chunk_kb: u64) -> u64 {
    let max_kb = max_chunk_kb.max(MIN_CHUNK_KB) as f64;
    let min_kb = MIN_CHUNK_KB as f64;

    let x = (file_size as f64).ln() - MIDPOINT_LN;
    let chunk_kb = min_kb + (max_kb - min_kb) / (1.0 + (-x).exp());
    (chunk_kb * 1024.0).floor() as u64
}

/// Decide the upload strategy for a file of `file_size` bytes.
///
/// Returns [`ChunkPlan::Single`] when chunking is disabled or the file
/// would yield fewer than `min_chunks` chunks. Fails when chunking is
/// enabled but the storage backend is not a local filesystem: chunked
/// uploads need positioned writes into a shared file, which only local
/// storage provides.
pub fn plan(
    file_size: u64,
    config: &ChunkingConfig,
    storage_is_local: bool,
) -> crate::Result<ChunkPlan> {
    if !config.enabled {
        return Ok(ChunkPlan::Single);
    }
    if !storage_is_local {
        return Err(crate::Error::Configuration(
            "chunked uploads require a local filesystem storage backend".to_string(),
        ));
    }
    if file_size == 0 {
        return Ok(ChunkPlan::Single);
    }

    let chunk_size = chunk_size_for(file_size, config.max_chunk_kb);
    let total = file_size.div_ceil(chunk_size);

    if total < u64::from(config.min_chunks) {
        return Ok(ChunkPlan::Single);
    }

    let total_chunks = u32::try_from(total).map_err(|_| {
        crate::Error::Configuration(format!("file of {file_size} bytes yields too many chunks"))
    })?;

    Ok(ChunkPlan::Chunked {
        chunk_size,
        total_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_kb: 64 * 1024, // 64 MiB ceiling
            min_chunks: 3,
            ..ChunkingConfig::default()
        }
    }

    #[test]
    fn small_files_stay_near_the_floor() {
        let size = chunk_size_for(16 * MIB, 64 * 1024);
        assert!(size >= MIN_CHUNK_KB * 1024);
        // Well below the midpoint the sigmoid contributes almost nothing.
        assert!(size < 5 * MIB, "got {size}");
    }

    #[test]
    fn huge_files_approach_the_ceiling() {
        let size = chunk_size_for(1024 * GIB, 64 * 1024);
        assert!(size > 63 * MIB, "got {size}");
        assert!(size <= 64 * MIB);
    }

    #[test]
    fn midpoint_splits_the_range() {
        // At ~1 GiB the curve sits halfway between floor and ceiling.
        let size = chunk_size_for(GIB, 64 * 1024);
        let midpoint = (4 * MIB + 64 * MIB) / 2;
        let tolerance = MIB / 2;
        assert!(size.abs_diff(midpoint) < tolerance, "got {size}");
    }

    #[test]
    fn curve_is_monotonic() {
        let mut prev = 0;
        for exp in 20..40 {
            let size = chunk_size_for(1u64 << exp, 64 * 1024);
            assert!(size >= prev);
            prev = size;
        }
    }

    #[test]
    fn plan_declines_zero_byte_files() {
        assert_eq!(plan(0, &config(), true).unwrap(), ChunkPlan::Single);
    }

    #[test]
    fn plan_declines_when_too_few_chunks() {
        // A 6 MiB file yields 2 chunks at the ~4 MiB floor; min_chunks is 3.
        assert_eq!(plan(6 * MIB, &config(), true).unwrap(), ChunkPlan::Single);
    }

    #[test]
    fn plan_declines_when_disabled() {
        let cfg = ChunkingConfig {
            enabled: false,
            ..config()
        };
        assert_eq!(plan(10 * GIB, &cfg, true).unwrap(), ChunkPlan::Single);
    }

    #[test]
    fn plan_chunks_large_files() {
        match plan(100 * MIB, &config(), true).unwrap() {
            ChunkPlan::Chunked {
                chunk_size,
                total_chunks,
            } => {
                assert!(total_chunks >= 3);
                assert_eq!(
                    u64::from(total_chunks),
                    (100 * MIB).div_ceil(chunk_size)
                );
            }
            ChunkPlan::Single => panic!("expected chunked plan"),
        }
    }

    #[test]
    fn plan_rejects_non_local_storage() {
        match plan(100 * MIB, &config(), false) {
            Err(crate::Error::Configuration(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
