//! Injectable random sources.
//!
//! Reward logic never reaches for a global generator: every draw goes through
//! an `RngCore` handed in by the caller. Sessions use seeded ChaCha streams
//! derived per game, tests use [`UnitDraws`] to pin exact draws.

use std::collections::VecDeque;

use hmac::{Hmac, Mac};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

use crate::numbers::unit_to_word;

/// Derive an independent stream seed from a user-visible seed and a domain tag.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        // HMAC accepts keys of any length; keep a deterministic fallback anyway.
        return user_seed ^ 0x9E37_79B9_7F4A_7C15;
    };
    mac.update(b"prizeplay-");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Seeded ChaCha stream for one game domain.
#[must_use]
pub fn stream_rng(user_seed: u64, domain_tag: &str) -> CountingRng<ChaCha20Rng> {
    CountingRng::new(ChaCha20Rng::seed_from_u64(derive_stream_seed(
        user_seed,
        domain_tag.as_bytes(),
    )))
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R: RngCore> CountingRng<R> {
    #[must_use]
    pub const fn new(rng: R) -> Self {
        Self { rng, draws: 0 }
    }

    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Scripted source replaying a fixed sequence of unit draws in `[0, 1)`.
///
/// Each `next_u64` yields the word that `rand` decodes back into the next
/// scripted `f64`. When the script runs out the last value repeats (or 0.0
/// for an empty script).
#[derive(Debug, Clone, Default)]
pub struct UnitDraws {
    pending: VecDeque<f64>,
    last: f64,
}

impl UnitDraws {
    #[must_use]
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            pending: draws.into_iter().collect(),
            last: 0.0,
        }
    }

    /// Draws not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn next_unit(&mut self) -> f64 {
        if let Some(next) = self.pending.pop_front() {
            self.last = next;
        }
        self.last
    }
}

impl RngCore for UnitDraws {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        unit_to_word(self.next_unit())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
