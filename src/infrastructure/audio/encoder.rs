//! Capture container encoders
//!
//! The native recorder produces FLAC (lossless, roughly half of WAV) or plain
//! 16-bit PCM WAV. Other containers are reported unsupported during format
//! negotiation.

use std::io::Cursor;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::domain::audio::RecordingFormat;

/// Bits per sample (16-bit audio)
const BITS_PER_SAMPLE: usize = 16;

/// Containers the native recorder can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Flac,
    Wav,
}

impl Container {
    /// Match a MIME type, rejecting codec parameters the container cannot carry
    pub fn for_mime(mime_type: &str) -> Option<Self> {
        let format: RecordingFormat = mime_type.parse().ok()?;
        let codecs = format.codecs();
        match format.essence() {
            "audio/flac" | "audio/x-flac" if matches!(codecs, None | Some("flac")) => {
                Some(Self::Flac)
            }
            "audio/wav" | "audio/wave" | "audio/x-wav" if matches!(codecs, None | Some("1")) => {
                Some(Self::Wav)
            }
            _ => None,
        }
    }
}

/// Encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Unsupported container: {0}")]
    Unsupported(String),

    #[error("FLAC config error: {0}")]
    Config(String),

    #[error("FLAC encoding failed: {0}")]
    Encode(String),

    #[error("Write failed: {0}")]
    Write(String),
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Encode interleaved f32 samples into the container named by `mime_type`
pub fn encode(
    mime_type: &str,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, EncodingError> {
    match Container::for_mime(mime_type) {
        Some(Container::Flac) => encode_flac(samples, channels, sample_rate),
        Some(Container::Wav) => encode_wav(samples, channels, sample_rate),
        None => Err(EncodingError::Unsupported(mime_type.to_string())),
    }
}

/// Encode interleaved samples to FLAC
pub fn encode_flac(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>, EncodingError> {
    // flacenc works on i32 holding 16-bit values
    let samples_i32: Vec<i32> = samples.iter().map(|&s| i32::from(to_i16(s))).collect();

    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{:?}", e)))?;

    let source = MemSource::from_samples(
        &samples_i32,
        usize::from(channels.max(1)),
        BITS_PER_SAMPLE,
        sample_rate as usize,
    );

    let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{:?}", e)))?;

    let mut sink = ByteSink::new();
    flac_stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(e.to_string()))?;

    Ok(sink.into_inner())
}

/// Encode interleaved samples to 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>, EncodingError> {
    let spec = WavSpec {
        channels: channels.max(1),
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| EncodingError::Write(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| EncodingError::Write(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| EncodingError::Write(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
