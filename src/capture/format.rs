//! Chunk container/codec selection
//!
//! The recorder asks the host which formats its encoder supports and takes
//! the first match from an ordered preference list, opus-in-webm first.

use serde::{Deserialize, Serialize};

use crate::audio;
use crate::Result;

/// Audio chunk container/codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkFormat {
    /// Opus in WebM
    OpusWebm,
    /// Opus in Ogg
    OpusOgg,
    /// Generic WebM
    Webm,
    /// Generic Ogg
    Ogg,
    /// Uncompressed WAV
    Wav,
}

/// Ordered preference list for chunk encoding
pub const FORMAT_PREFERENCE: [ChunkFormat; 5] = [
    ChunkFormat::OpusWebm,
    ChunkFormat::OpusOgg,
    ChunkFormat::Webm,
    ChunkFormat::Ogg,
    ChunkFormat::Wav,
];

impl ChunkFormat {
    /// Pick the most preferred format the host encoder supports
    #[must_use]
    pub fn select(supported: &[Self]) -> Option<Self> {
        FORMAT_PREFERENCE
            .into_iter()
            .find(|f| supported.contains(f))
    }

    /// MIME type for uploads
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::OpusWebm => "audio/webm;codecs=opus",
            Self::OpusOgg => "audio/ogg;codecs=opus",
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/wav",
        }
    }

    /// File name used for multipart uploads
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::OpusWebm | Self::Webm => "audio.webm",
            Self::OpusOgg | Self::Ogg => "audio.ogg",
            Self::Wav => "audio.wav",
        }
    }

    /// Assemble consecutive chunks of this format into one payload
    ///
    /// Streamable containers concatenate; WAV chunks are re-joined at the
    /// sample level so the result stays a single well-formed file.
    ///
    /// # Errors
    ///
    /// Returns error if WAV chunks fail to decode or the list is empty
    pub fn assemble(self, chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
        match self {
            Self::Wav => audio::concat_wav(chunks),
            _ => Ok(chunks.concat()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_opus_webm_when_available() {
        let supported = vec![ChunkFormat::Wav, ChunkFormat::OpusWebm, ChunkFormat::Ogg];
        assert_eq!(
            ChunkFormat::select(&supported),
            Some(ChunkFormat::OpusWebm)
        );
    }

    #[test]
    fn falls_back_in_preference_order() {
        let supported = vec![ChunkFormat::Wav, ChunkFormat::Ogg];
        assert_eq!(ChunkFormat::select(&supported), Some(ChunkFormat::Ogg));

        let wav_only = vec![ChunkFormat::Wav];
        assert_eq!(ChunkFormat::select(&wav_only), Some(ChunkFormat::Wav));
    }

    #[test]
    fn no_supported_format_selects_nothing() {
        assert_eq!(ChunkFormat::select(&[]), None);
    }

    #[test]
    fn streamable_assembly_concatenates() {
        let chunks = vec![vec![1u8, 2], vec![3u8, 4]];
        let joined = ChunkFormat::OpusWebm.assemble(&chunks).unwrap();
        assert_eq!(joined, vec![1, 2, 3, 4]);
    }
}
