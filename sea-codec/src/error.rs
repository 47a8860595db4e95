//! SEA codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a SEA stream.
#[derive(Debug, Error)]
pub enum SeaError {
    /// The stream does not start with the `"SEAC"` magic bytes.
    #[error("not a SEA stream: bad magic bytes")]
    BadMagic,

    /// The header carries a format version this crate does not understand.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// A chunk header's reserved byte is not `0x5A`.
    #[error("corrupt chunk header: reserved byte {0:#04x}")]
    BadReserved(u8),

    /// A chunk type byte is neither CBR (`0x01`) nor VBR (`0x02`).
    #[error("unknown chunk type {0:#04x}")]
    BadChunkType(u8),

    /// The input ended before an expected field completed.
    #[error("unexpected end of input")]
    Truncated,

    /// The metadata blob is not valid UTF-8.
    #[error("metadata is not valid UTF-8")]
    BadMetadata,

    /// A parameter or header field is outside its legal range.
    #[error("parameter out of range: {0}")]
    ParamOutOfRange(String),

    /// An encoded chunk does not fit within the fixed chunk size.
    #[error("encoded chunk needs {needed} bytes, chunk size is {available}")]
    EncodeOverflow { needed: usize, available: usize },

    /// Error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for SeaError {
    fn from(err: std::io::Error) -> Self {
        // a short read anywhere in the format is a truncation, not an I/O fault
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            SeaError::Truncated
        } else {
            SeaError::Io(err)
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SeaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SeaError::BadReserved(0x00);
        assert_eq!(err.to_string(), "corrupt chunk header: reserved byte 0x00");

        let err = SeaError::EncodeOverflow {
            needed: 700,
            available: 512,
        };
        assert_eq!(
            err.to_string(),
            "encoded chunk needs 700 bytes, chunk size is 512"
        );
    }

    #[test]
    fn test_eof_maps_to_truncated() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(SeaError::from(eof), SeaError::Truncated));

        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(SeaError::from(other), SeaError::Io(_)));
    }
}
