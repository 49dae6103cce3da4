//! Caller identities ("fingerprints") presented to the remote API.
//!
//! Every pass derives one identity per worker from a shared base string:
//! the base loses as many trailing characters as the suffix needs, and the
//! worker's zero-padded index is appended in their place.

use std::num::NonZeroUsize;

use rand::Rng;

/// Default fixed part of the base identity; a random prefix is prepended
/// per pass by [`random_base`].
pub const DEFAULT_FINGERPRINT_TAIL: &str = "a6cd4b387585d9f5df6ba2c69dc1";

/// Characters used for the random base prefix.
const PREFIX_ALPHABET: &[u8] = b"abcdef0123456789";

/// Length of the random base prefix.
const PREFIX_LEN: usize = 4;

/// Identity of one worker within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub index: usize,
    pub derived_id: String,
}

/// Number of decimal digits needed to distinguish `parallelism` workers,
/// i.e. `ceil(log10(parallelism))`.
///
/// `1 -> 0`, `10 -> 1`, `11 -> 2`, `100 -> 2`, `128 -> 3`.
pub fn suffix_width(parallelism: NonZeroUsize) -> usize {
    let target = parallelism.get() as u128;
    let mut width = 0;
    let mut span: u128 = 1;
    while span < target {
        span *= 10;
        width += 1;
    }
    width
}

/// Derive `parallelism` identities from `base`.
///
/// The suffix is the worker index modulo `10^width`, left-padded with
/// zeros to `width` digits. Truncation counts characters, not bytes.
pub fn derive_identities(base: &str, parallelism: NonZeroUsize) -> Vec<WorkerIdentity> {
    let width = suffix_width(parallelism);
    let keep = base.chars().count().saturating_sub(width);
    let prefix: String = base.chars().take(keep).collect();
    let modulus = 10u128.pow(width as u32);

    (0..parallelism.get())
        .map(|index| {
            let derived_id = if width == 0 {
                prefix.clone()
            } else {
                let suffix = index as u128 % modulus;
                format!("{prefix}{suffix:0width$}")
            };
            WorkerIdentity { index, derived_id }
        })
        .collect()
}

/// A fresh base identity: a random 4-character hex prefix followed by `tail`.
pub fn random_base<R: Rng + ?Sized>(rng: &mut R, tail: &str) -> String {
    let mut base = String::with_capacity(PREFIX_LEN + tail.len());
    for _ in 0..PREFIX_LEN {
        let idx = rng.random_range(0..PREFIX_ALPHABET.len());
        base.push(PREFIX_ALPHABET[idx] as char);
    }
    base.push_str(tail);
    base
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
