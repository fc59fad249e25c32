// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ignis-integrity — SHA-256 fingerprints and hash-targeted trailer mining.
//
// Every artifact Ignis emits carries a digest that starts with the job uid.
// This crate owns both halves of that guarantee: producing the trailer that
// makes it true, and checking that it holds before anything is packaged.

pub mod integrity;
pub mod miner;

pub use integrity::{hash_bytes, is_sha256_hex, verify_prefix};
pub use miner::{HashTargetMiner, MineOutcome, Stamped, strip_trailing_newlines, trailer};
