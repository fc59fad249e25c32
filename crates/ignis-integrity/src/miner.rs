// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hash-target mining — append `\n%>>>IGNIS {n}<<<\n` to a file and search for
// the smallest counter `n` whose SHA-256 hex digest starts with the target.
//
// The unchanged file body is hashed exactly once. Each attempt clones that
// SHA-256 state and feeds it only the trailer, so an attempt costs the same
// for a 10 KiB PDF as for a 100 MiB one.
//
// The counter space is split into fixed-size chunks handed out in increasing
// order from a shared cursor. Workers publish hits through `fetch_min`, stop
// claiming chunks that start past the best hit and abandon their current
// chunk once they scan past it. Every chunk below the best hit is therefore
// scanned up to the hit, and the result is the minimal counter regardless of
// thread count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ignis_core::config::MinerConfig;
use ignis_core::error::{IgnisError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

const TRAILER_OPEN: &[u8] = b"\n%>>>IGNIS ";
const TRAILER_CLOSE: &[u8] = b"<<<\n";

/// Counters handed to a worker per claim.
const DEFAULT_CHUNK_SIZE: u64 = 1 << 14;
/// Attempts between checks of the shared best hit inside a chunk.
const CANCEL_CHECK_INTERVAL: u64 = 1 << 12;

/// Remove the final run of `\n` / `\r` bytes. Interior bytes are untouched.
pub fn strip_trailing_newlines(content: &[u8]) -> &[u8] {
    let end = content
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |pos| pos + 1);
    &content[..end]
}

/// The trailer bytes for `counter`.
pub fn trailer(counter: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TRAILER_OPEN.len() + 20 + TRAILER_CLOSE.len());
    write_trailer(&mut buf, counter);
    buf
}

fn write_trailer(buf: &mut Vec<u8>, counter: u64) {
    buf.extend_from_slice(TRAILER_OPEN);
    push_decimal(buf, counter);
    buf.extend_from_slice(TRAILER_CLOSE);
}

fn push_decimal(buf: &mut Vec<u8>, mut value: u64) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    buf.extend_from_slice(&digits[i..]);
}

/// Result of a trailer search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// `counter` is the smallest matching value; `attempts` counts digests
    /// computed across all workers.
    Found { counter: u64, attempts: u64 },
    /// Every counter up to the ceiling was tried.
    Exhausted { attempts: u64 },
}

/// Mined file content plus search statistics.
#[derive(Debug, Clone)]
pub struct Stamped {
    pub bytes: Vec<u8>,
    pub counter: u64,
    pub attempts: u64,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
}

/// Target prefix pre-decoded into nibbles.
struct TargetPrefix {
    nibbles: Vec<u8>,
    /// False when the target contains anything but lowercase hex.
    matchable: bool,
}

impl TargetPrefix {
    fn new(target: &str) -> Self {
        let mut matchable = target.len() <= 64;
        let nibbles = target
            .bytes()
            .map(|b| match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                _ => {
                    matchable = false;
                    0xff
                }
            })
            .collect();
        Self { nibbles, matchable }
    }

    fn matches(&self, digest: &[u8]) -> bool {
        self.matchable
            && self.nibbles.iter().enumerate().all(|(i, &nibble)| {
                let byte = digest[i / 2];
                let actual = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                actual == nibble
            })
    }
}

/// Finds trailers that force a file's SHA-256 to start with a target prefix.
#[derive(Debug, Clone)]
pub struct HashTargetMiner {
    config: MinerConfig,
    chunk_size: u64,
}

impl HashTargetMiner {
    pub fn new(config: MinerConfig) -> Self {
        Self {
            config,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the worker count (0 = available parallelism).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Override the counter ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Return `strip_trailing_newlines(content)` plus the minimal matching
    /// trailer.
    pub fn mine(&self, content: &[u8], target: &str) -> Result<Vec<u8>> {
        self.stamp(content, target).map(|stamped| stamped.bytes)
    }

    /// Like [`HashTargetMiner::mine`] but also reports the counter, attempt
    /// count and final digest.
    #[instrument(skip(self, content, target), fields(content_len = content.len(), hash_target = target))]
    pub fn stamp(&self, content: &[u8], target: &str) -> Result<Stamped> {
        let started = Instant::now();
        let body = strip_trailing_newlines(content);

        match self.search(body, target)? {
            MineOutcome::Found { counter, attempts } => {
                let mut bytes = Vec::with_capacity(body.len() + 40);
                bytes.extend_from_slice(body);
                write_trailer(&mut bytes, counter);
                let sha256 = crate::integrity::hash_bytes(&bytes);

                info!(
                    hash_target = target,
                    counter,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "digest target reached"
                );
                Ok(Stamped {
                    bytes,
                    counter,
                    attempts,
                    sha256,
                })
            }
            MineOutcome::Exhausted { attempts } => Err(IgnisError::MiningExhausted {
                target: target.to_owned(),
                attempts,
            }),
        }
    }

    /// Search for the smallest matching counter over `body` as given (no
    /// newline stripping).
    pub fn search(&self, body: &[u8], target: &str) -> Result<MineOutcome> {
        if target.len() > self.config.max_target_len {
            return Err(IgnisError::InvalidTarget(format!(
                "{} hex chars exceeds the limit of {}",
                target.len(),
                self.config.max_target_len
            )));
        }
        if target.len() > self.config.warn_target_len {
            warn!(
                hash_target = target,
                expected_attempts = 16f64.powi(target.len() as i32),
                "long hash target; mining may take a long time"
            );
        }

        let prefix = TargetPrefix::new(target);
        if !prefix.matchable {
            warn!(
                hash_target = target,
                "target is not lowercase hex and can never match; searching until the ceiling"
            );
        }

        let mut base = Sha256::new();
        base.update(body);

        let threads = self.config.effective_threads().max(1);
        debug!(threads, chunk = self.chunk_size, "starting trailer search");

        let search = Search {
            base: &base,
            prefix: &prefix,
            max_counter: self.config.max_attempts,
            chunk_size: self.chunk_size,
            cursor: AtomicU64::new(0),
            best: AtomicU64::new(u64::MAX),
            attempts: AtomicU64::new(0),
        };

        if threads == 1 {
            search.work();
        } else {
            std::thread::scope(|scope| {
                for _ in 0..threads {
                    scope.spawn(|| search.work());
                }
            });
        }

        let attempts = search.attempts.load(Ordering::Acquire);
        Ok(match search.best.load(Ordering::Acquire) {
            u64::MAX => MineOutcome::Exhausted { attempts },
            counter => MineOutcome::Found { counter, attempts },
        })
    }
}

/// Shared, read-only search state plus the atomics the workers coordinate on.
struct Search<'a> {
    base: &'a Sha256,
    prefix: &'a TargetPrefix,
    max_counter: u64,
    chunk_size: u64,
    /// Index of the next unclaimed chunk.
    cursor: AtomicU64,
    /// Smallest matching counter found so far (`u64::MAX` = none).
    best: AtomicU64,
    attempts: AtomicU64,
}

impl Search<'_> {
    fn work(&self) {
        let mut buf = Vec::with_capacity(TRAILER_OPEN.len() + 20 + TRAILER_CLOSE.len());

        loop {
            let chunk = self.cursor.fetch_add(1, Ordering::Relaxed);
            let start = chunk.saturating_mul(self.chunk_size).saturating_add(1);
            if start > self.max_counter || start > self.best.load(Ordering::Acquire) {
                return;
            }
            let end = start
                .saturating_add(self.chunk_size - 1)
                .min(self.max_counter);

            let mut tried = 0u64;
            for counter in start..=end {
                if tried % CANCEL_CHECK_INTERVAL == 0
                    && counter > self.best.load(Ordering::Acquire)
                {
                    break;
                }
                tried += 1;

                buf.clear();
                write_trailer(&mut buf, counter);
                let mut hasher = self.base.clone();
                hasher.update(&buf);
                if self.prefix.matches(&hasher.finalize()) {
                    self.best.fetch_min(counter, Ordering::AcqRel);
                    break;
                }
            }
            self.attempts.fetch_add(tried, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::hash_bytes;

    fn miner(threads: usize) -> HashTargetMiner {
        HashTargetMiner::new(MinerConfig {
            threads,
            ..MinerConfig::default()
        })
    }

    fn sample_pdf() -> Vec<u8> {
        b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\r\n".to_vec()
    }

    #[test]
    fn trailer_wire_format() {
        assert_eq!(trailer(1), b"\n%>>>IGNIS 1<<<\n");
        assert_eq!(trailer(1234567890), b"\n%>>>IGNIS 1234567890<<<\n");
        assert_eq!(trailer(u64::MAX), b"\n%>>>IGNIS 18446744073709551615<<<\n");
    }

    #[test]
    fn strips_only_the_final_newline_run() {
        assert_eq!(strip_trailing_newlines(b"abc\r\n\n"), b"abc");
        assert_eq!(strip_trailing_newlines(b"a\nb\n"), b"a\nb");
        assert_eq!(strip_trailing_newlines(b"a\r\nb"), b"a\r\nb");
        assert_eq!(strip_trailing_newlines(b"\n\r\n"), b"");
        assert_eq!(strip_trailing_newlines(b""), b"");
    }

    #[test]
    fn mined_output_has_target_prefix_and_one_trailer() {
        let content = sample_pdf();
        for target in ["a", "0f", "abc", "e3b0"] {
            let stamped = miner(1).stamp(&content, target).expect("mine");
            assert!(stamped.sha256.starts_with(target), "{target}: {}", stamped.sha256);
            assert_eq!(hash_bytes(&stamped.bytes), stamped.sha256);

            let mut expected = strip_trailing_newlines(&content).to_vec();
            expected.extend_from_slice(&trailer(stamped.counter));
            assert_eq!(stamped.bytes, expected);
        }
    }

    #[test]
    fn counter_is_minimal() {
        let content = sample_pdf();
        let body = strip_trailing_newlines(&content);
        let target = "5c1";
        let stamped = miner(1).stamp(&content, target).expect("mine");
        assert!(stamped.counter >= 1);

        for earlier in 1..stamped.counter {
            let mut candidate = body.to_vec();
            candidate.extend_from_slice(&trailer(earlier));
            assert!(
                !hash_bytes(&candidate).starts_with(target),
                "counter {earlier} also matches"
            );
        }
    }

    #[test]
    fn parallel_search_finds_the_sequential_counter() {
        let content = sample_pdf();
        for target in ["7", "ab", "fe1", "0000"] {
            let sequential = miner(1).stamp(&content, target).expect("sequential");
            for threads in [2, 4, 8] {
                let parallel = miner(threads)
                    .with_chunk_size(7)
                    .stamp(&content, target)
                    .expect("parallel");
                assert_eq!(parallel.counter, sequential.counter, "{target} x{threads}");
                assert_eq!(parallel.bytes, sequential.bytes);
            }
        }
    }

    #[test]
    fn mining_is_deterministic() {
        let content = sample_pdf();
        let a = miner(0).mine(&content, "beef").expect("first");
        let b = miner(0).mine(&content, "beef").expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_target_takes_first_counter() {
        let stamped = miner(1).stamp(b"x", "").expect("mine");
        assert_eq!(stamped.counter, 1);
        assert_eq!(stamped.bytes, b"x\n%>>>IGNIS 1<<<\n");
    }

    #[test]
    fn unmatchable_target_exhausts_the_ceiling() {
        for threads in [1, 3] {
            let m = miner(threads).with_max_attempts(500).with_chunk_size(64);
            assert_eq!(
                m.search(b"body", "ABC").expect("search"),
                MineOutcome::Exhausted { attempts: 500 }
            );
            match m.mine(b"body", "zz").unwrap_err() {
                IgnisError::MiningExhausted { target, attempts } => {
                    assert_eq!(target, "zz");
                    assert_eq!(attempts, 500);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn overlong_target_is_refused() {
        let err = miner(1).mine(b"body", "0123456789abc").unwrap_err();
        assert!(matches!(err, IgnisError::InvalidTarget(_)));
    }

    #[test]
    fn remining_appends_a_second_trailer() {
        let once = miner(1).stamp(&sample_pdf(), "1").expect("first");
        let twice = miner(1).stamp(&once.bytes, "2").expect("second");

        let first_trailer = trailer(once.counter);
        let first_body = &first_trailer[..first_trailer.len() - 1];
        assert!(twice.bytes.starts_with(strip_trailing_newlines(&once.bytes)));
        assert!(
            twice
                .bytes
                .windows(first_body.len())
                .any(|w| w == first_body),
            "prior trailer body must survive"
        );
        assert!(twice.bytes.ends_with(&trailer(twice.counter)));
    }
}
