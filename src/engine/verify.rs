//! BSI CON.6 post-wipe verification: a handful of small random-position
//! reads, checked for patterns that would indicate an incomplete wipe.
//!
//! Grounded in `_verify_bsi_wipe`: sample `sample_count` random 4KiB-or-less
//! reads, classify the first 100 bytes of each as all-zero, all-0xFF, or
//! "appears random", and treat the probe as passed if at least one sample
//! looks random. This is advisory, not forensic — a disk legitimately
//! sparse in a sampled region would also read as zero.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::patterns::read_sample;

const SAMPLE_CLASSIFY_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BsiSample {
    pub position: u64,
    pub all_zeros: bool,
    pub all_ones: bool,
    pub appears_random: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BsiVerification {
    pub samples: Vec<BsiSample>,
    pub verification_passed: bool,
}

/// Take `config.bsi_sample_count` 4KiB samples at random offsets within
/// `[0, total_size)` and classify each.
///
/// In dry-run mode nothing was ever written to the device, so reading it
/// would report on unrelated data; the probe instead returns synthetic
/// samples that all classify as random, matching the "nothing destructive
/// happened, and nothing destructive is reported as having happened"
/// contract the rest of the dry-run path holds to.
pub fn verify_bsi(
    device_path: &str,
    total_size: u64,
    config: &EngineConfig,
) -> BsiVerification {
    if config.bsi_sample_count == 0 || total_size == 0 {
        return BsiVerification {
            samples: Vec::new(),
            verification_passed: false,
        };
    }

    if config.dry_run {
        let samples = (0..config.bsi_sample_count)
            .map(|i| BsiSample {
                position: (i as u64 * 4096) % total_size,
                all_zeros: false,
                all_ones: false,
                appears_random: true,
            })
            .collect();
        return BsiVerification {
            samples,
            verification_passed: true,
        };
    }

    let mut rng = rand::thread_rng();
    let mut samples = Vec::with_capacity(config.bsi_sample_count);

    for _ in 0..config.bsi_sample_count {
        let max_offset = total_size.saturating_sub(4096);
        let position = if max_offset == 0 {
            0
        } else {
            rng.gen_range(0..=max_offset)
        };

        if let Ok(data) = read_sample(device_path, position, 4096.min(total_size as usize)) {
            let classify_len = data.len().min(SAMPLE_CLASSIFY_LEN);
            let window = &data[..classify_len];
            let all_zeros = !window.is_empty() && window.iter().all(|b| *b == 0x00);
            let all_ones = !window.is_empty() && window.iter().all(|b| *b == 0xFF);
            samples.push(BsiSample {
                position,
                all_zeros,
                all_ones,
                appears_random: !(all_zeros || all_ones),
            });
        }
    }

    let verification_passed = samples.iter().any(|s| s.appears_random);
    BsiVerification {
        samples,
        verification_passed,
    }
}
