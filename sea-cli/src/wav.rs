//! Minimal RIFF/WAVE reader and writer for 16-bit PCM.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const WAVE_FORMAT_PCM: u16 = 1;

/// Decoded WAV contents.
pub struct WavAudio {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved 16-bit samples.
    pub samples: Vec<i16>,
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Parse a WAV file; only 16-bit integer PCM is accepted.
pub fn read_wav<R: Read>(reader: &mut R) -> io::Result<WavAudio> {
    let mut riff = [0u8; 4];
    reader.read_exact(&mut riff)?;
    if &riff != b"RIFF" {
        return Err(invalid("not a RIFF file"));
    }
    let _riff_size = reader.read_u32::<LittleEndian>()?;
    let mut wave = [0u8; 4];
    reader.read_exact(&mut wave)?;
    if &wave != b"WAVE" {
        return Err(invalid("not a WAVE file"));
    }

    let mut format: Option<(u32, u16)> = None;
    loop {
        let mut id = [0u8; 4];
        if let Err(err) = reader.read_exact(&mut id) {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                return Err(invalid("WAV file has no data chunk"));
            }
            return Err(err);
        }
        let size = reader.read_u32::<LittleEndian>()? as usize;

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(invalid("fmt chunk too small"));
                }
                let audio_format = reader.read_u16::<LittleEndian>()?;
                let channels = reader.read_u16::<LittleEndian>()?;
                let sample_rate = reader.read_u32::<LittleEndian>()?;
                let _byte_rate = reader.read_u32::<LittleEndian>()?;
                let _block_align = reader.read_u16::<LittleEndian>()?;
                let bits_per_sample = reader.read_u16::<LittleEndian>()?;
                skip(reader, size - 16 + (size & 1))?;

                if audio_format != WAVE_FORMAT_PCM || bits_per_sample != 16 {
                    return Err(invalid("only 16-bit integer PCM is supported"));
                }
                if channels == 0 {
                    return Err(invalid("WAV file declares zero channels"));
                }
                format = Some((sample_rate, channels));
            }
            b"data" => {
                let (sample_rate, channels) =
                    format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                let mut raw = vec![0u8; size];
                reader.read_exact(&mut raw)?;
                let samples = raw
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                return Ok(WavAudio {
                    sample_rate,
                    channels,
                    samples,
                });
            }
            _ => skip(reader, size + (size & 1))?,
        }
    }
}

/// Write a 16-bit PCM WAV file.
pub fn write_wav<W: Write>(writer: &mut W, audio: &WavAudio) -> io::Result<()> {
    let data_len = audio.samples.len() * 2;
    let byte_rate = audio.sample_rate * audio.channels as u32 * 2;

    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(36 + data_len as u32)?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
    writer.write_u16::<LittleEndian>(audio.channels)?;
    writer.write_u32::<LittleEndian>(audio.sample_rate)?;
    writer.write_u32::<LittleEndian>(byte_rate)?;
    writer.write_u16::<LittleEndian>(audio.channels * 2)?;
    writer.write_u16::<LittleEndian>(16)?;

    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(data_len as u32)?;
    for &sample in &audio.samples {
        writer.write_i16::<LittleEndian>(sample)?;
    }
    Ok(())
}

fn skip<R: Read>(reader: &mut R, bytes: usize) -> io::Result<()> {
    io::copy(&mut reader.take(bytes as u64), &mut io::sink())?;
    Ok(())
}
