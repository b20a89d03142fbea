pub mod wav;
pub mod worker;

pub use wav::{wav_header, WavFileWriter};
pub use worker::{ClipJob, ClipWorker};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("clip contains no audio")]
    Empty,
}

/// Output container for finished clips. Only uncompressed WAV is produced
/// today; the enum keeps format selection a configuration concern rather
/// than a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipFormat {
    #[default]
    Wav,
}

impl ClipFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ClipFormat::Wav => "wav",
        }
    }
}

/// `sample_<session>_<UTC timestamp>` with second resolution, the naming
/// the collection service expects.
pub fn clip_file_name(session_id: &str, format: ClipFormat, at: DateTime<Utc>) -> String {
    format!(
        "sample_{}_{}.{}",
        session_id,
        at.format("%Y-%m-%d %H-%M-%S"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 8, 13, 5, 9).unwrap();
        assert_eq!(
            clip_file_name("dev0", ClipFormat::Wav, at),
            "sample_dev0_2026-08-08 13-05-09.wav"
        );
    }
}
