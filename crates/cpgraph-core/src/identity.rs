//! Stable module identity.
//!
//! A module's id is `"{type_name}_{hex8}"` where `hex8` is the first eight
//! hex digits of the SHA-256 digest of its canonical I/O pattern:
//!
//! ```text
//! sorted(input_keys).join(",") + "|" + sorted(output_keys).join(",")
//! ```
//!
//! The id depends only on the module type and the *sets* of data node keys it
//! touches, so moving a module within the pipeline never changes it and two
//! modules with the same type and I/O sets deliberately collide. SHA-256 is
//! fixed so ids match across runs and across implementations; 32 bits of it
//! are kept, and accidental collisions between different I/O patterns are an
//! accepted risk.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

/// Number of hex digits kept from the digest.
pub const HASH_HEX_LEN: usize = 8;

/// Derive the stable id for a module.
///
/// Keys are taken as sets: order and repetition in the iterators do not
/// matter.
#[must_use]
pub fn derive<'a, I, O>(type_name: &str, input_keys: I, output_keys: O) -> String
where
    I: IntoIterator<Item = &'a str>,
    O: IntoIterator<Item = &'a str>,
{
    let inputs: BTreeSet<&str> = input_keys.into_iter().collect();
    let outputs: BTreeSet<&str> = output_keys.into_iter().collect();
    format!("{type_name}_{}", pattern_hash(&io_pattern(&inputs, &outputs)))
}

/// The string that is hashed: sorted inputs, `|`, sorted outputs.
#[must_use]
pub fn io_pattern(inputs: &BTreeSet<&str>, outputs: &BTreeSet<&str>) -> String {
    let joined_in: Vec<&str> = inputs.iter().copied().collect();
    let joined_out: Vec<&str> = outputs.iter().copied().collect();
    format!("{}|{}", joined_in.join(","), joined_out.join(","))
}

fn pattern_hash(pattern: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pattern.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(HASH_HEX_LEN);
    hex
}
