//! Centralized default values and constants
//!
//! Reserved keys, naming defaults and on-disk magic numbers live here so the
//! partition store, the identifier generator and the codecs agree on them.

// ============================================================================
// Reserved keys
// ============================================================================

/// Key of the sentinel entry written when a partition file is first created
pub const SENTINEL_KEY: &str = "__init__";

/// Reserved counter field inside every index file
pub const ENTRY_COUNT_KEY: &str = "entry_count";

// ============================================================================
// Identifier defaults
// ============================================================================

/// Key used when the caller does not supply one
pub const DEFAULT_KEY: &str = "key";

/// Partition segment used when neither the caller nor the log has one
pub const DEFAULT_PARTITION: &str = "log";

/// Length of the random alphanumeric identifier suffix
pub const RANDOM_SUFFIX_LEN: usize = 4;

/// Separator between identifier segments
pub const ID_SEPARATOR: char = '-';

/// Attempts at generating a fresh identifier before giving up
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Prefix of the date-derived default partition (`log_04062024`)
pub const DATED_PARTITION_PREFIX: &str = "log_";

// ============================================================================
// Database layout
// ============================================================================

/// Suffix appended to a database name to form its root directory
pub const DB_DIR_SUFFIX: &str = ".ox-db";

/// File-key suffix of the index store
pub const INDEX_SUFFIX: &str = ".index";

/// File-key suffix of the vector store
pub const VECTOR_SUFFIX: &str = ".ox-vec";

/// Embedder id recorded when the caller supplied the vector itself
pub const CALLER_SUPPLIED_EMBEDDER: &str = "caller-supplied";

// ============================================================================
// Binary document format
// ============================================================================

/// Binary document magic number ("OXD1" in big-endian ASCII)
pub const BINARY_MAGIC: u32 = 0x4F58_4431;

/// Binary document format version
pub const BINARY_VERSION: u32 = 1;

/// Binary document header size in bytes
pub const BINARY_HEADER_SIZE: usize = 20;

// ============================================================================
// Embedding
// ============================================================================

/// Default dimensionality of the built-in hashing embedder
pub const DEFAULT_EMBED_DIMS: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_are_distinct() {
        assert_ne!(SENTINEL_KEY, ENTRY_COUNT_KEY);
        assert!(!SENTINEL_KEY.contains(ID_SEPARATOR));
        assert!(!ENTRY_COUNT_KEY.contains(ID_SEPARATOR));
    }

    #[test]
    fn test_magic_number_is_ascii() {
        assert_eq!(&BINARY_MAGIC.to_be_bytes(), b"OXD1");
        assert!(BINARY_HEADER_SIZE >= 4 + 4 + 4 + 8);
    }
}
