use imgdrop_core::constants::KEY_SUFFIX_LEN;
use imgdrop_core::StorageKey;
use rand::Rng;

/// URL-safe alphabet for key suffixes (64 symbols, 6 bits each).
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Allocates storage keys as `{prefix}image{sequence}{suffix}.{extension}`.
///
/// Uniqueness rests on the random suffix (48 bits at the default length), so two
/// clients holding the same stale sequence number still get distinct keys with high
/// probability. It is not a guarantee.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    prefix: String,
    suffix_len: usize,
}

impl NameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix_len: KEY_SUFFIX_LEN,
        }
    }

    pub fn allocate(&self, sequence_number: u64, extension: &str) -> StorageKey {
        StorageKey {
            prefix: self.prefix.clone(),
            sequence_number,
            random_suffix: self.random_suffix(),
            extension: extension.to_lowercase(),
        }
    }

    fn random_suffix(&self) -> String {
        let mut rng = rand::rng();
        (0..self.suffix_len)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect()
    }
}
