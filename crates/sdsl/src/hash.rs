//! Stable content hashing for compiled modules.
//!
//! Compiled modules are identified by a deterministic FNV-1a 64-bit hash of
//! their little-endian bytes, so that caches keyed on it survive process
//! restarts and platform changes.
//!
//! NOTE: FNV-1a is **not** cryptographically secure.

use sdsl_spirv::Word;

/// 64-bit FNV-1a offset basis.
pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
/// 64-bit FNV-1a prime.
pub const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01B3;

/// Mix bytes into an existing FNV-1a 64-bit hash state.
///
/// Start from [`FNV1A_OFFSET_BASIS_64`] for a fresh hash.
#[inline]
pub const fn fnv1a64_mix(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0usize;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
        i += 1;
    }
    hash
}

/// Hash an arbitrary byte slice with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_mix(FNV1A_OFFSET_BASIS_64, bytes)
}

/// Hash a word stream as its little-endian byte encoding, without
/// materializing the bytes.
pub const fn fnv1a64_words(words: &[Word]) -> u64 {
    let mut hash = FNV1A_OFFSET_BASIS_64;
    let mut i = 0usize;
    while i < words.len() {
        hash = fnv1a64_mix(hash, &words[i].to_le_bytes());
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a64_reference_values() {
        assert_eq!(fnv1a64(b""), FNV1A_OFFSET_BASIS_64);

        let expected_a = (FNV1A_OFFSET_BASIS_64 ^ 0x61).wrapping_mul(FNV1A_PRIME_64);
        assert_eq!(fnv1a64(b"a"), expected_a);
    }

    /// If these fail, module hashes changed and every cache key with them.
    #[test]
    fn fnv1a64_regression_values() {
        assert_eq!(fnv1a64(b"hello"), 11831194018420276491);
        assert_eq!(fnv1a64(b"hello world"), 8618312879776256743);
    }

    #[test]
    fn fnv1a64_mix_incremental() {
        let full = fnv1a64(b"helloworld");
        let incremental = fnv1a64_mix(fnv1a64_mix(FNV1A_OFFSET_BASIS_64, b"hello"), b"world");
        assert_eq!(full, incremental);
    }

    #[test]
    fn words_hash_like_their_bytes() {
        let words = [0x0723_0203, 0x0001_0500, 7];
        let bytes: Vec<u8> = words.iter().flat_map(|word: &u32| word.to_le_bytes()).collect();
        assert_eq!(fnv1a64_words(&words), fnv1a64(&bytes));
        assert_eq!(fnv1a64_words(&[]), FNV1A_OFFSET_BASIS_64);
    }
}
