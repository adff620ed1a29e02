//! Pattern-write primitives: the blocking inner loop of a zeros/ones/random
//! pass, and the edge-overwrite used by `fast_clear`.
//!
//! Grounded directly in the original `_wipe_zeros` / `_wipe_random` /
//! `_wipe_ones` / `_overwrite_edges` methods: a 1MiB buffer, writing until
//! the device rejects further writes with ENOSPC (which is the disk
//! reporting "full", i.e. successful completion, not a failure), and
//! progress committed only when the integer percentage changes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

use rand::RngCore;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Zeros,
    Ones,
    Random,
}

/// English and the historical German message this spec's originating
/// application used to detect "disk full" on platforms/locales where the
/// error doesn't surface as a bare `ENOSPC` errno.
const ENOSPC_MESSAGE_WHITELIST: &[&str] = &[
    "no space left on device",
    "kein speicherplatz mehr verfügbar",
    "auf dem gerät ist kein speicherplatz mehr verfügbar",
];

/// True if `err` represents the disk-is-full condition that ends a
/// pattern-write pass successfully, rather than a real I/O failure.
pub fn is_device_filled(err: &io::Error) -> bool {
    if err.raw_os_error() == Some(28) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    ENOSPC_MESSAGE_WHITELIST
        .iter()
        .any(|needle| message.contains(needle))
}

/// Coalesces a raw progress fraction into "did the integer percent change",
/// the same gate the original engine applies before committing a row
/// update. Returns `Some(percent)` only on change.
pub struct ProgressGate {
    last_percent: i64,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self { last_percent: -1 }
    }

    pub fn advance(&mut self, total_progress: f64) -> Option<f64> {
        let current = total_progress as i64;
        if current != self.last_percent {
            self.last_percent = current;
            Some(total_progress.min(99.9))
        } else {
            None
        }
    }
}

fn pattern_buffer(kind: PatternKind, size: usize) -> Vec<u8> {
    match kind {
        PatternKind::Zeros => vec![0u8; size],
        PatternKind::Ones => vec![0xFFu8; size],
        PatternKind::Random => {
            let mut buf = vec![0u8; size];
            rand::thread_rng().fill_bytes(&mut buf);
            buf
        }
    }
}

/// Run one overwrite pass of `kind` against `device_path`. Blocking —
/// callers must run this inside `tokio::task::spawn_blocking`.
///
/// `pass_index`/`passes` feed the original progress formula exactly:
/// `((pass_index + bytes_written/total_size) / passes) * 100`, capped at
/// 99.9 until the caller marks the whole log complete.
pub fn run_pattern_pass(
    device_path: &str,
    kind: PatternKind,
    pass_index: u32,
    passes: u32,
    size_hint: Option<u64>,
    config: &EngineConfig,
    progress_tx: &UnboundedSender<f64>,
) -> io::Result<()> {
    if config.dry_run {
        return simulate_pattern_pass(pass_index, passes, size_hint, config, progress_tx);
    }

    let mut disk = OpenOptions::new().write(true).open(device_path)?;
    let total_size = disk
        .seek(SeekFrom::End(0))
        .and_then(|end| disk.seek(SeekFrom::Start(0)).map(|_| end))
        .ok()
        .or(size_hint);

    let mut bytes_written: u64 = 0;
    let mut gate = ProgressGate::new();
    let reuse_buffer = !matches!(kind, PatternKind::Random);
    let static_buffer = if reuse_buffer {
        Some(pattern_buffer(kind, config.buffer_size_bytes))
    } else {
        None
    };

    loop {
        let owned;
        let buffer: &[u8] = match &static_buffer {
            Some(b) => b,
            None => {
                owned = pattern_buffer(kind, config.buffer_size_bytes);
                &owned
            }
        };

        match disk.write_all(buffer) {
            Ok(()) => {
                bytes_written += buffer.len() as u64;
                if let Some(total) = total_size {
                    if total > 0 {
                        let pass_progress = bytes_written as f64 / total as f64;
                        let total_progress =
                            ((pass_index as f64 + pass_progress) / passes as f64) * 100.0;
                        if let Some(percent) = gate.advance(total_progress) {
                            let _ = progress_tx.send(percent);
                        }
                    }
                }
            }
            Err(e) if is_device_filled(&e) => break,
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!("pattern write failed (pass {}): {e}", pass_index + 1),
                ))
            }
        }
    }

    Ok(())
}

fn simulate_pattern_pass(
    pass_index: u32,
    passes: u32,
    size_hint: Option<u64>,
    config: &EngineConfig,
    progress_tx: &UnboundedSender<f64>,
) -> io::Result<()> {
    let total = size_hint.unwrap_or(0);
    let step = config.buffer_size_bytes as u64;
    let mut bytes_written: u64 = 0;
    let mut gate = ProgressGate::new();

    if total == 0 {
        let _ = progress_tx.send((((pass_index + 1) as f64) / passes as f64 * 100.0).min(99.9));
        return Ok(());
    }

    while bytes_written < total {
        bytes_written = (bytes_written + step).min(total);
        let pass_progress = bytes_written as f64 / total as f64;
        let total_progress = ((pass_index as f64 + pass_progress) / passes as f64) * 100.0;
        if let Some(percent) = gate.advance(total_progress) {
            let _ = progress_tx.send(percent);
        }
    }
    Ok(())
}

/// Overwrite the first and last `edge_bytes` of the device with zeros,
/// flushing and `fsync`ing at the end. Used by every `fast_clear` strategy
/// once TRIM/format has run (or as the whole strategy on HDD/fallback).
pub fn overwrite_edges(
    device_path: &str,
    edge_bytes: u64,
    config: &EngineConfig,
    start_progress: f64,
    end_progress: f64,
    progress_tx: &UnboundedSender<f64>,
) -> io::Result<()> {
    if config.dry_run {
        let _ = progress_tx.send(start_progress);
        let mid = start_progress + (end_progress - start_progress) * 0.5;
        let _ = progress_tx.send(mid);
        let _ = progress_tx.send(end_progress);
        return Ok(());
    }

    let mut disk = OpenOptions::new().read(true).write(true).open(device_path)?;
    let buffer = vec![0u8; config.buffer_size_bytes];

    let _ = progress_tx.send(start_progress);
    disk.seek(SeekFrom::Start(0))?;
    write_bounded(&mut disk, &buffer, edge_bytes)?;

    let mid = start_progress + (end_progress - start_progress) * 0.5;
    let _ = progress_tx.send(mid);

    if disk.seek(SeekFrom::End(-(edge_bytes as i64))).is_ok() {
        let _ = write_bounded(&mut disk, &buffer, edge_bytes);
    }

    disk.flush()?;
    disk.sync_all()?;
    let _ = progress_tx.send(end_progress);
    Ok(())
}

fn write_bounded(disk: &mut File, buffer: &[u8], limit: u64) -> io::Result<()> {
    let mut written = 0u64;
    while written < limit {
        match disk.write_all(buffer) {
            Ok(()) => written += buffer.len() as u64,
            Err(e) if is_device_filled(&e) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read `len` bytes at `position`; used by the BSI verification probe.
/// Blocking, for the same reason as [`run_pattern_pass`].
pub fn read_sample(device_path: &str, position: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut disk = OpenOptions::new().read(true).open(device_path)?;
    disk.seek(SeekFrom::Start(position))?;
    let mut buf = vec![0u8; len];
    let n = disk.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_enospc_by_errno() {
        let err = io::Error::from_raw_os_error(28);
        assert!(is_device_filled(&err));
    }

    #[test]
    fn recognizes_localized_enospc_messages() {
        let err = io::Error::new(
            io::ErrorKind::Other,
            "Auf dem Gerät ist kein Speicherplatz mehr verfügbar",
        );
        assert!(is_device_filled(&err));
    }

    #[test]
    fn does_not_misclassify_unrelated_errors() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        assert!(!is_device_filled(&err));
    }

    #[test]
    fn progress_gate_only_fires_on_integer_change() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.advance(0.4), Some(0.4));
        assert_eq!(gate.advance(0.9), None);
        assert_eq!(gate.advance(1.2), Some(1.2));
    }

    #[test]
    fn progress_gate_caps_at_99_9() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.advance(150.0), Some(99.9));
    }
}
