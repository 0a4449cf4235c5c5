//! Error types for catalog encoding and decoding.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while building or reading a catalog blob.
///
/// Encoding errors are precondition violations: the caller handed the
/// encoder something the binary layout cannot represent. Decoding errors
/// describe a blob that is truncated or corrupt.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file list was empty.
    #[error("cannot encode a catalog without files")]
    EmptyFileList,

    /// A string does not fit the one-byte length prefix.
    #[error("string '{value}' is {len} bytes long (max: {max})")]
    StringTooLong { value: String, len: usize, max: usize },

    /// A numeric field exceeds the width reserved for it.
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },

    /// The blob does not start with the catalog signature.
    #[error("invalid catalog signature")]
    BadSignature,

    /// The blob ended before a field could be read.
    #[error("catalog truncated at offset {offset} while reading {field}")]
    Truncated { offset: usize, field: &'static str },

    /// A string field is not NUL terminated or not valid UTF-8.
    #[error("malformed string at offset {offset}")]
    MalformedString { offset: usize },

    /// The recorded size does not match the blob length.
    #[error("catalog size field says {recorded} bytes, blob has {actual}")]
    SizeMismatch { recorded: u32, actual: usize },

    /// The trailing checksum does not match the blob contents.
    #[error("catalog checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Bytes remain between the last entry and the trailing checksum.
    #[error("{count} unexpected bytes after the last entry")]
    TrailingBytes { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_too_long_display() {
        let err = CatalogError::StringTooLong {
            value: "abc".to_string(),
            len: 300,
            max: 254,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("300"));
    }

    #[test]
    fn test_checksum_mismatch_display_is_hex() {
        let err = CatalogError::ChecksumMismatch {
            stored: 0xDEADBEEF,
            computed: 0x1,
        };
        assert!(err.to_string().contains("0xdeadbeef"));
    }
}
