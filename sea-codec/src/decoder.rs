//! Streaming decoder.

use std::io::Read;

use crate::chunk::{Chunk, CHUNK_HEADER_LEN};
use crate::dqt::DqtCache;
use crate::error::{Result, SeaError};
use crate::header::FileHeader;

/// Incremental SEA decoder over any `io::Read` source.
///
/// The header is parsed on construction; each `decode_chunk` call yields
/// the next chunk's samples, so callers see everything decoded before a
/// corrupt chunk stops the stream.
pub struct SeaDecoder<R: Read> {
    reader: R,
    header: FileHeader,
    dqt: DqtCache,
    frames_read: u64,
    done: bool,
}

impl<R: Read> SeaDecoder<R> {
    /// Read and validate the stream header.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = FileHeader::read_from(&mut reader)?;
        if (header.chunk_size as usize) < CHUNK_HEADER_LEN {
            return Err(SeaError::ParamOutOfRange(format!(
                "chunk size {} below the chunk header size",
                header.chunk_size
            )));
        }
        Ok(Self {
            reader,
            header,
            dqt: DqtCache::new(),
            frames_read: 0,
            done: false,
        })
    }

    /// Stream parameters from the header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Decode the next chunk's interleaved samples; `Ok(None)` once the
    /// stream is complete. Decoding is fail-fast: the first corrupt chunk
    /// returns its error and the stream stays stopped.
    pub fn decode_chunk(&mut self) -> Result<Option<Vec<i16>>> {
        if self.done {
            return Ok(None);
        }
        let total = self.header.total_frames as u64;
        if total != 0 && self.frames_read >= total {
            self.done = true;
            return Ok(None);
        }

        let chunk_size = self.header.chunk_size as usize;
        let channels = self.header.channels as usize;
        let frames_per_chunk = self.header.frames_per_chunk as usize;

        let mut buf = vec![0u8; chunk_size];
        let got = read_up_to(&mut self.reader, &mut buf)?;
        if got == 0 {
            self.done = true;
            if total != 0 {
                // the header promised more frames than the stream holds
                return Err(SeaError::Truncated);
            }
            return Ok(None);
        }
        let bytes = &buf[..got];

        let frames = if total != 0 {
            let remaining = (total - self.frames_read).min(frames_per_chunk as u64) as usize;
            if got < chunk_size {
                let needed = match Chunk::measured_len(bytes, channels, remaining) {
                    Ok(needed) => needed,
                    Err(err) => {
                        self.done = true;
                        return Err(err);
                    }
                };
                if got < needed {
                    self.done = true;
                    return Err(SeaError::Truncated);
                }
            }
            remaining
        } else if got == chunk_size {
            if bytes[..CHUNK_HEADER_LEN].iter().all(|&b| b == 0) {
                // padding tail of a stream with no frame count
                self.done = true;
                return Ok(None);
            }
            frames_per_chunk
        } else {
            // unpadded trailing chunk: its length determines its frame count
            match Chunk::frames_for_len(bytes, channels, frames_per_chunk) {
                Some(frames) => frames,
                None => {
                    self.done = true;
                    return Err(SeaError::Truncated);
                }
            }
        };

        let chunk = match Chunk::parse(bytes, channels, frames) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };
        let samples = chunk.decode(&mut self.dqt);
        self.frames_read += frames as u64;
        Ok(Some(samples))
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

// Fill as much of `buf` as the source can provide.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_undersized_chunk_size() {
        let header = FileHeader {
            channels: 1,
            chunk_size: 2,
            frames_per_chunk: 100,
            sample_rate: 44100,
            total_frames: 100,
            metadata: String::new(),
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert!(matches!(
            SeaDecoder::new(bytes.as_slice()),
            Err(SeaError::ParamOutOfRange(_))
        ));
    }

    #[test]
    fn test_missing_chunks_are_truncation() {
        let header = FileHeader {
            channels: 1,
            chunk_size: 64,
            frames_per_chunk: 100,
            sample_rate: 44100,
            total_frames: 100,
            metadata: String::new(),
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        let mut decoder = SeaDecoder::new(bytes.as_slice()).unwrap();
        assert!(matches!(decoder.decode_chunk(), Err(SeaError::Truncated)));
        // the decoder stays stopped after the failure
        assert!(matches!(decoder.decode_chunk(), Ok(None)));
    }
}
