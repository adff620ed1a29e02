//! Runtime configuration, loaded from environment variables with
//! conservative defaults.
//!
//! Generalizes the teacher's per-platform `is_dry_run()` free function into
//! one config object the engine is constructed with, so dry-run is a
//! property of the running process rather than something every write site
//! has to remember to check against the environment itself.

use std::env;
use std::time::Duration;

use crate::platform::ProbeTimeouts;

/// `ERASURE_DRY_RUN` defaults to enabled: destructive writes require an
/// operator to explicitly opt out, mirroring the teacher's
/// `SECURE_ERASE_DRY_RUN` default of `true`.
const DRY_RUN_VAR: &str = "ERASURE_DRY_RUN";
const BUFFER_SIZE_VAR: &str = "ERASURE_BUFFER_SIZE_BYTES";
const METADATA_TIMEOUT_VAR: &str = "ERASURE_METADATA_TIMEOUT_SECS";
const NVME_FORMAT_TIMEOUT_VAR: &str = "ERASURE_NVME_FORMAT_TIMEOUT_SECS";
const DISCARD_TIMEOUT_VAR: &str = "ERASURE_DISCARD_TIMEOUT_SECS";
const BSI_SAMPLE_COUNT_VAR: &str = "ERASURE_BSI_SAMPLE_COUNT";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When set, no destructive write ever reaches a device: the pattern
    /// writer logs what it would have done and reports synthetic progress.
    pub dry_run: bool,
    /// Write buffer size for pattern passes and edge overwrites.
    pub buffer_size_bytes: usize,
    /// Timeout for cheap metadata probes (`lsblk`, `smartctl`, `/proc/mounts`,
    /// the PowerShell enumeration/SMART/boot-flag scripts).
    pub metadata_timeout: Duration,
    /// Timeout for `nvme format`, which can legitimately run for minutes on
    /// a large namespace.
    pub nvme_format_timeout: Duration,
    /// Timeout for `blkdiscard`/`Optimize-Volume -ReTrim`/`diskutil
    /// eraseVolume`, slower than metadata reads but far faster than a format.
    pub discard_timeout: Duration,
    /// Number of 4KiB samples the BSI verification probe reads.
    pub bsi_sample_count: usize,
    /// Size of the region overwritten at each edge of the device during a
    /// fast_clear fallback (first/last N bytes).
    pub fast_clear_edge_bytes: u64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            dry_run: env_flag(DRY_RUN_VAR, true),
            buffer_size_bytes: env_usize(BUFFER_SIZE_VAR, 1024 * 1024),
            metadata_timeout: Duration::from_secs(env_usize(METADATA_TIMEOUT_VAR, 10) as u64),
            nvme_format_timeout: Duration::from_secs(
                env_usize(NVME_FORMAT_TIMEOUT_VAR, 300) as u64
            ),
            discard_timeout: Duration::from_secs(env_usize(DISCARD_TIMEOUT_VAR, 60) as u64),
            bsi_sample_count: env_usize(BSI_SAMPLE_COUNT_VAR, 10),
            fast_clear_edge_bytes: 10 * 1024 * 1024,
        }
    }

    /// The subset of timeouts a platform probe needs, grouped for its
    /// constructor.
    pub fn probe_timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            metadata: self.metadata_timeout,
            nvme_format: self.nvme_format_timeout,
            discard: self.discard_timeout,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_flag(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(v) => v != "0" && v.to_lowercase() != "false",
        Err(_) => default,
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = EngineConfig {
            dry_run: true,
            buffer_size_bytes: 1024 * 1024,
            metadata_timeout: Duration::from_secs(10),
            nvme_format_timeout: Duration::from_secs(300),
            discard_timeout: Duration::from_secs(60),
            bsi_sample_count: 10,
            fast_clear_edge_bytes: 10 * 1024 * 1024,
        };
        assert!(config.dry_run);
        assert_eq!(config.buffer_size_bytes, 1024 * 1024);
        assert_eq!(config.bsi_sample_count, 10);
        assert_eq!(config.nvme_format_timeout, Duration::from_secs(300));
    }

    #[test]
    fn differentiated_timeouts_match_original_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.metadata_timeout, Duration::from_secs(10));
        assert_eq!(config.nvme_format_timeout, Duration::from_secs(300));
        assert_eq!(config.discard_timeout, Duration::from_secs(60));
    }
}
