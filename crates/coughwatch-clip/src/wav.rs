use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::ClipError;

const HEADER_LEN: usize = 44;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Canonical 44-byte RIFF/WAVE header for 16-bit mono PCM. Every
/// multi-byte field is little-endian.
pub fn wav_header(total_pcm_bytes: u32, sample_rate: u32) -> [u8; HEADER_LEN] {
    let byte_rate = BITS_PER_SAMPLE as u32 * sample_rate * CHANNELS as u32 / 8;
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(total_pcm_bytes + 36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&total_pcm_bytes.to_le_bytes());
    header
}

/// Two-pass WAV writer. PCM goes to disk behind a 44-byte placeholder, and
/// `finalize` seeks back to patch the real header; the lengths in it are
/// only known once all samples are written.
pub struct WavFileWriter {
    file: File,
    sample_rate: u32,
    pcm_bytes: u32,
}

impl WavFileWriter {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, ClipError> {
        let mut file = File::create(path)?;
        file.write_all(&[0u8; HEADER_LEN])?;
        Ok(Self {
            file,
            sample_rate,
            pcm_bytes: 0,
        })
    }

    /// Appends raw little-endian PCM bytes, as produced by the session
    /// ring's linearization.
    pub fn write_pcm(&mut self, bytes: &[u8]) -> Result<(), ClipError> {
        self.file.write_all(bytes)?;
        self.pcm_bytes += bytes.len() as u32;
        Ok(())
    }

    /// Patches the header and flushes the file. Consumes the writer: a
    /// finalized file is complete and never appended to.
    pub fn finalize(mut self) -> Result<(), ClipError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .write_all(&wav_header(self.pcm_bytes, self.sample_rate))?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_48k() {
        let header = wav_header(1000, 48_000);

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(header[4..8].try_into().unwrap()), 1036);
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(header[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(header[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(header[22..24].try_into().unwrap()), 1);
        assert_eq!(
            u32::from_le_bytes(header[24..28].try_into().unwrap()),
            48_000
        );
        // byte rate = 16 * 48000 * 1 / 8
        assert_eq!(
            u32::from_le_bytes(header[28..32].try_into().unwrap()),
            96_000
        );
        assert_eq!(u16::from_le_bytes(header[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(header[34..36].try_into().unwrap()), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 1000);
    }

    #[test]
    fn two_pass_write_patches_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let pcm: Vec<u8> = (0u16..256)
            .flat_map(|s| (s as i16).to_le_bytes())
            .collect();

        let mut writer = WavFileWriter::create(&path, 44_100).unwrap();
        writer.write_pcm(&pcm[..100]).unwrap();
        writer.write_pcm(&pcm[100..]).unwrap();
        writer.finalize().unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 44 + pcm.len());
        assert_eq!(&written[..44], &wav_header(pcm.len() as u32, 44_100));
        assert_eq!(&written[44..], &pcm[..]);
    }
}
