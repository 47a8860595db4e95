//! File-level header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, SeaError};

/// Magic bytes at the start of every SEA stream.
pub const SEA_MAGIC: [u8; 4] = *b"SEAC";

/// Format version written and accepted by this crate.
pub const SEA_FORMAT_VERSION: u8 = 1;

// Fixed part of the header, before the metadata blob.
pub(crate) const HEADER_FIXED_LEN: usize = 22;

// Metadata arrives length-prefixed from untrusted input; read it in bounded
// pieces so a corrupt length field cannot trigger a huge up-front
// allocation.
const METADATA_READ_STEP: usize = 64 * 1024;

/// Stream-wide parameters, serialized once at the front of the file and
/// followed by `total_frames / frames_per_chunk` fixed-size chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Interleaved channel count, 1..=255.
    pub channels: u8,
    /// Byte length of every chunk in the stream.
    pub chunk_size: u16,
    /// Frames encoded per chunk; the final chunk may carry fewer.
    pub frames_per_chunk: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Per-channel frame count; `0` means stream until EOF.
    pub total_frames: u32,
    /// Newline-separated `key=value` metadata blob.
    pub metadata: String,
}

impl FileHeader {
    /// Serialized size: fixed fields plus the metadata blob.
    pub fn serialized_len(&self) -> usize {
        HEADER_FIXED_LEN + self.metadata.len()
    }

    /// Write the header, little-endian fields.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&SEA_MAGIC)?;
        writer.write_u8(SEA_FORMAT_VERSION)?;
        writer.write_u8(self.channels)?;
        writer.write_u16::<LittleEndian>(self.chunk_size)?;
        writer.write_u16::<LittleEndian>(self.frames_per_chunk)?;
        writer.write_u32::<LittleEndian>(self.sample_rate)?;
        writer.write_u32::<LittleEndian>(self.total_frames)?;
        writer.write_u32::<LittleEndian>(self.metadata.len() as u32)?;
        writer.write_all(self.metadata.as_bytes())?;
        Ok(())
    }

    /// Parse a header, validating magic, version, and field ranges.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != SEA_MAGIC {
            return Err(SeaError::BadMagic);
        }

        let version = reader.read_u8()?;
        if version != SEA_FORMAT_VERSION {
            return Err(SeaError::UnsupportedVersion(version));
        }

        let channels = reader.read_u8()?;
        if channels == 0 {
            return Err(SeaError::ParamOutOfRange("channel count is zero".into()));
        }

        let chunk_size = reader.read_u16::<LittleEndian>()?;
        let frames_per_chunk = reader.read_u16::<LittleEndian>()?;
        if frames_per_chunk == 0 {
            return Err(SeaError::ParamOutOfRange("frames_per_chunk is zero".into()));
        }

        let sample_rate = reader.read_u32::<LittleEndian>()?;
        let total_frames = reader.read_u32::<LittleEndian>()?;

        let metadata_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut blob = Vec::new();
        while blob.len() < metadata_len {
            let step = (metadata_len - blob.len()).min(METADATA_READ_STEP);
            let start = blob.len();
            blob.resize(start + step, 0);
            reader.read_exact(&mut blob[start..])?;
        }
        let metadata = String::from_utf8(blob).map_err(|_| SeaError::BadMetadata)?;

        Ok(Self {
            channels,
            chunk_size,
            frames_per_chunk,
            sample_rate,
            total_frames,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FileHeader {
        FileHeader {
            channels: 2,
            chunk_size: 4096,
            frames_per_chunk: 2560,
            sample_rate: 44100,
            total_frames: 88200,
            metadata: "artist=Example".to_string(),
        }
    }

    fn to_bytes(header: &FileHeader) -> Vec<u8> {
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_roundtrip() {
        let header = sample_header();
        let bytes = to_bytes(&header);
        assert_eq!(bytes.len(), header.serialized_len());
        assert_eq!(&bytes[..4], b"SEAC");
        let parsed = FileHeader::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = to_bytes(&sample_header());
        bytes[3] = b'X';
        assert!(matches!(
            FileHeader::read_from(&mut bytes.as_slice()),
            Err(SeaError::BadMagic)
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = to_bytes(&sample_header());
        bytes[4] = 2;
        assert!(matches!(
            FileHeader::read_from(&mut bytes.as_slice()),
            Err(SeaError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_zero_channels() {
        let mut bytes = to_bytes(&sample_header());
        bytes[5] = 0;
        assert!(matches!(
            FileHeader::read_from(&mut bytes.as_slice()),
            Err(SeaError::ParamOutOfRange(_))
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = to_bytes(&sample_header());
        for cut in [2, 10, bytes.len() - 3] {
            assert!(matches!(
                FileHeader::read_from(&mut &bytes[..cut]),
                Err(SeaError::Truncated)
            ));
        }
    }

    #[test]
    fn test_non_utf8_metadata() {
        let mut bytes = to_bytes(&sample_header());
        let metadata_start = HEADER_FIXED_LEN;
        bytes[metadata_start] = 0xFF;
        bytes[metadata_start + 1] = 0xFE;
        assert!(matches!(
            FileHeader::read_from(&mut bytes.as_slice()),
            Err(SeaError::BadMetadata)
        ));
    }
}
