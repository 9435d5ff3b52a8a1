//! WAV file loading
//!
//! Decodes PCM (8/16/24/32-bit integer) and 32-bit float WAV files into an
//! interleaved [`MemorySource`] with samples scaled to `-1.0..=1.0`.

use std::path::Path;

use thiserror::Error;

use crate::model::MemorySource;

/// Audio file errors
#[derive(Debug, Error)]
pub enum AudioFileError {
    /// File missing, unreadable or not a WAV file
    #[error("Failed to read WAV file: {0}")]
    Decode(#[from] hound::Error),

    /// Integer PCM wider than 32 bits or float other than 32 bits
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// Header declares no channels
    #[error("WAV file has no channels")]
    NoChannels,
}

/// Result type for audio file operations
pub type AudioFileResult<T> = Result<T, AudioFileError>;

/// Decode a whole WAV file into memory
pub fn load_wav(path: &Path) -> AudioFileResult<MemorySource> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioFileError::NoChannels);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(AudioFileError::UnsupportedBitDepth(spec.bits_per_sample));
            }
            reader.samples::<f32>().collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioFileError::UnsupportedBitDepth(spec.bits_per_sample));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    log::info!(
        "load_wav: {:?} ({} channels, {} Hz, {} bit, {} frames)",
        path,
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        samples.len() / spec.channels as usize
    );

    Ok(MemorySource::new(
        spec.channels as usize,
        spec.sample_rate,
        samples,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleSource;

    #[test]
    fn test_loads_int16_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(-32768i16).unwrap();
        }
        writer.finalize().unwrap();

        let source = load_wav(&path).unwrap();
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 22050);
        assert_eq!(source.frame_count(), 100);
        assert_eq!(source.interleaved_frames(0, 1), vec![0.5, -1.0]);
    }

    #[test]
    fn test_loads_float() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();

        let source = load_wav(&path).unwrap();
        assert_eq!(source.interleaved_frames(0, 1), vec![0.25]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_wav(Path::new("/nonexistent/nothing.wav")).unwrap_err();
        assert!(matches!(err, AudioFileError::Decode(_)));
    }
}
